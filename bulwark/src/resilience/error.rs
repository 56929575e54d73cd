//! Errors produced by resilience pipelines.

use crate::errors::Cancelled;
use std::time::Duration;
use thiserror::Error;

/// Why a protected call did not produce a value.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The last attempt exceeded the per-attempt timeout.
    #[error("Attempt timed out after {timeout:?} in pipeline '{pipeline}'")]
    AttemptTimeout {
        /// The pipeline name.
        pipeline: String,
        /// The per-attempt timeout.
        timeout: Duration,
    },

    /// The whole execution exceeded the total timeout.
    #[error("Pipeline '{pipeline}' timed out after {timeout:?}")]
    TotalTimeout {
        /// The pipeline name.
        pipeline: String,
        /// The total timeout.
        timeout: Duration,
    },

    /// The circuit rejected the last attempt without running it.
    #[error("Circuit for pipeline '{pipeline}' is open; retry after {retry_after:?}")]
    CircuitOpen {
        /// The pipeline name.
        pipeline: String,
        /// Time left until the circuit admits a trial call.
        retry_after: Duration,
    },

    /// The caller cancelled the execution.
    #[error("Pipeline '{pipeline}' cancelled: {reason}")]
    Cancelled {
        /// The pipeline name.
        pipeline: String,
        /// The cancellation reason.
        reason: String,
    },

    /// The last attempt failed with the operation's own error.
    #[error(transparent)]
    Inner(E),
}

impl<E> ResilienceError<E> {
    /// Returns true if the execution was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true if the circuit rejected the call.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns true for either timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::AttemptTimeout { .. } | Self::TotalTimeout { .. })
    }

    /// Returns the operation's error, if that is what ended the execution.
    #[must_use]
    pub const fn inner(&self) -> Option<&E> {
        match self {
            Self::Inner(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the operation's error, if that is what ended the execution.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(err) => Some(err),
            _ => None,
        }
    }

    /// Converts a cancellation into the crate's [`Cancelled`] marker.
    #[must_use]
    pub fn as_cancelled(&self) -> Option<Cancelled> {
        match self {
            Self::Cancelled { reason, .. } => Some(Cancelled::new(reason.clone())),
            _ => None,
        }
    }
}
