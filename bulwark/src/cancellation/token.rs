//! Caller-owned cancellation signal.

use crate::errors::Cancelled;
use std::sync::OnceLock;
use tokio::sync::Notify;
use tracing::debug;

const DEFAULT_REASON: &str = "cancelled";

/// Signals that the caller no longer wants the result of a dispatch.
///
/// The first reason given wins; later calls to [`CancellationToken::cancel`]
/// are ignored. Async code races [`CancellationToken::cancelled`] against
/// its own work.
#[derive(Default)]
pub struct CancellationToken {
    reason: OnceLock<String>,
    waiters: Notify,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes every waiter.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self.reason.set(reason.into()).is_ok() {
            debug!(reason = self.reason.get().map_or(DEFAULT_REASON, String::as_str), "Cancellation requested");
            self.waiters.notify_waiters();
        }
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The reason given to the first [`CancellationToken::cancel`] call.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.waiters.notified();
            tokio::pin!(notified);
            // Registered before the re-check, so a cancel in between still wakes us.
            notified.as_mut().enable();
            if self.is_cancelled() {
                break;
            }
            notified.await;
        }
    }

    /// Describes this token's cancellation as an error.
    #[must_use]
    pub fn to_error(&self) -> Cancelled {
        Cancelled::new(self.reason().unwrap_or(DEFAULT_REASON))
    }

    /// Returns `Err` if cancellation has been requested.
    ///
    /// ```rust,ignore
    /// ctx.cancellation.error_if_cancelled()?;
    /// ```
    pub fn error_if_cancelled(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(self.to_error())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish_non_exhaustive()
    }
}
