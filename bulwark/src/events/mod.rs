//! Structured event emission.
//!
//! Every event carries a type (see [`types`]) and a JSON payload stamped with
//! an RFC 3339 timestamp.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

use std::sync::Arc;

/// Event type names emitted by this crate.
pub mod types {
    /// A request entered the pipeline.
    pub const REQUEST_STARTED: &str = "request.started";
    /// A request left the pipeline.
    pub const REQUEST_COMPLETED: &str = "request.completed";
    /// A request exceeded the slow threshold.
    pub const REQUEST_SLOW: &str = "request.slow";
    /// A request was rejected by validation.
    pub const REQUEST_INVALID: &str = "request.invalid";
    /// A handler fault was caught.
    pub const REQUEST_UNHANDLED: &str = "request.unhandled";
    /// A resilience pipeline scheduled a retry.
    pub const RESILIENCE_RETRY: &str = "resilience.retry";
    /// A resilience pipeline hit its total timeout.
    pub const RESILIENCE_TOTAL_TIMEOUT: &str = "resilience.total_timeout";
    /// A circuit opened.
    pub const CIRCUIT_OPENED: &str = "circuit.opened";
    /// A circuit admitted a trial call.
    pub const CIRCUIT_HALF_OPENED: &str = "circuit.half_opened";
    /// A circuit closed again.
    pub const CIRCUIT_CLOSED: &str = "circuit.closed";
}

/// Returns the default sink used when none is injected.
#[must_use]
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpEventSink)
}

/// Adds a `timestamp` field to an event payload.
#[must_use]
pub fn timestamped(mut payload: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(ref mut map) = payload {
        map.insert(
            "timestamp".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    payload
}
