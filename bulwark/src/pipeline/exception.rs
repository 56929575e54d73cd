//! Translation of handler faults into failed outcomes.

use super::{Behavior, DispatchContext, Next, Request};
use crate::errors::Cancelled;
use crate::events::{timestamped, types, EventSink};
use crate::outcome::{Error, Response};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

/// Error code carried by absorbed faults.
pub const UNHANDLED_ERROR_CODE: &str = "Unhandled";

/// Innermost behavior: catches whatever the handler raises.
///
/// Errors and panics become `Error::unexpected("Unhandled", ..)` failures
/// when the response type has an error channel, and are re-raised
/// otherwise. Cancellation is always re-raised.
pub struct ExceptionHandlingBehavior {
    events: Arc<dyn EventSink>,
}

impl ExceptionHandlingBehavior {
    /// Creates an exception handling behavior.
    #[must_use]
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }
}

impl std::fmt::Debug for ExceptionHandlingBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHandlingBehavior").finish_non_exhaustive()
    }
}

#[async_trait]
impl<Q: Request> Behavior<Q> for ExceptionHandlingBehavior {
    fn name(&self) -> &'static str {
        "exception_handling"
    }

    async fn handle(
        &self,
        request: &Q,
        ctx: &DispatchContext,
        next: Next<'_, Q>,
    ) -> anyhow::Result<Q::Response> {
        let err = match AssertUnwindSafe(next.run(request, ctx)).catch_unwind().await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(err)) => err,
            Err(payload) => anyhow::anyhow!("handler panicked: {}", panic_message(payload.as_ref())),
        };

        if err.is::<Cancelled>() {
            return Err(err);
        }
        if ctx.is_cancelled() {
            return Err(err.context(ctx.cancellation.to_error()));
        }

        let name = Q::name();
        error!(
            request = name,
            request_id = %ctx.request_id,
            error = ?err,
            "[UNHANDLED EXCEPTION] Request {}: {}",
            name,
            err
        );
        self.events.try_emit(
            types::REQUEST_UNHANDLED,
            Some(timestamped(serde_json::json!({
                "request": name,
                "request_id": ctx.request_id.to_string(),
                "error": err.to_string(),
                "absorbed": <Q::Response as Response>::CARRIES_ERRORS,
            }))),
        );

        match Q::Response::from_error(Error::unexpected(UNHANDLED_ERROR_CODE, err.to_string())) {
            Some(response) => Ok(response),
            None => Err(err),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
