//! Error types for the bulwark crate.
//!
//! Business failures travel as [`Outcome`](crate::outcome::Outcome) values.
//! The types here cover misuse of the crate itself, faults that escape a
//! request pipeline, and cancellation.

use thiserror::Error;

/// Errors raised while configuring pipelines and registries.
#[derive(Debug, Error)]
pub enum BulwarkError {
    /// Resilience options failed validation.
    #[error("Invalid resilience options for '{pipeline}': {reason}")]
    InvalidOptions {
        /// The pipeline being configured.
        pipeline: String,
        /// Why the options were rejected.
        reason: String,
    },

    /// A pipeline with the same name already exists.
    #[error("Resilience pipeline '{0}' is already registered")]
    DuplicatePipeline(String),

    /// No pipeline is registered under the name.
    #[error("Resilience pipeline '{0}' is not registered")]
    PipelineNotFound(String),

    /// A handler for the request type already exists.
    #[error("A handler for request '{0}' is already registered")]
    DuplicateHandler(&'static str),

    /// Configuration was well-formed but unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BulwarkError {
    /// Creates an invalid options error.
    #[must_use]
    pub fn invalid_options(pipeline: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            pipeline: pipeline.into(),
            reason: reason.into(),
        }
    }
}

/// Marker error for work abandoned because the caller cancelled it.
///
/// Handlers return it (usually through `anyhow`) to signal that a failure was
/// caused by cancellation rather than by an unhealthy dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation cancelled: {reason}")]
pub struct Cancelled {
    /// Why the work was cancelled.
    pub reason: String,
}

impl Cancelled {
    /// Creates a new cancellation marker.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by [`Mediator::send`](crate::pipeline::Mediator::send).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing handles the request type.
    #[error("No handler registered for request '{request}'")]
    NoHandler {
        /// The request name.
        request: &'static str,
    },

    /// The caller cancelled the request.
    #[error("Request '{request}' was cancelled: {reason}")]
    Cancelled {
        /// The request name.
        request: &'static str,
        /// The cancellation reason.
        reason: String,
    },

    /// The handler faulted and its response type has no error channel.
    #[error("Request '{request}' failed: {source}")]
    Unhandled {
        /// The request name.
        request: &'static str,
        /// The fault raised by the handler.
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Returns the name of the request that failed.
    #[must_use]
    pub const fn request(&self) -> &'static str {
        match self {
            Self::NoHandler { request }
            | Self::Cancelled { request, .. }
            | Self::Unhandled { request, .. } => *request,
        }
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
