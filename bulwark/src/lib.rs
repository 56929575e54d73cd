//! # Bulwark
//!
//! Request pipelines and resilience policies for services.
//!
//! Bulwark provides:
//!
//! - **Outcomes**: a success-or-failure result with structured, kinded errors
//! - **Request pipelines**: logging, validation, and fault translation around
//!   every handler, dispatched by request type through a [`Mediator`](pipeline::Mediator)
//! - **Resilience**: total timeout, retry with backoff, circuit breaking, and
//!   per-attempt timeouts for outbound calls, registered by name
//! - **Cancellation**: caller cancellation that is never retried and never
//!   counted against a dependency
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bulwark::prelude::*;
//!
//! let mediator = Mediator::new();
//! mediator.register(GetBasketHandler::new(store))?;
//!
//! let basket = mediator.send(GetBasket { user_name: "alice".into() }).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod outcome;
pub mod pipeline;
pub mod resilience;
pub mod store;
pub mod testing;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::BulwarkConfig;
    pub use crate::errors::{BulwarkError, Cancelled, DispatchError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::outcome::{Error, ErrorKind, Outcome, Response};
    pub use crate::pipeline::{
        Behavior, DispatchContext, FnHandler, Handler, Mediator, Next, PipelineBuilder, Request,
        RequestPipeline,
    };
    pub use crate::resilience::{
        CircuitState, ResilienceError, ResilienceOptions, ResiliencePipeline,
        ResiliencePipelineRegistry,
    };
    pub use crate::store::{CachedStore, InMemoryStore, KeyValueStore, ResilientStore, StoreError};
    pub use crate::validation::{RuleSet, Validator, ValidatorRegistry};
}
