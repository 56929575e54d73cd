//! Resilience policies for outbound calls.
//!
//! A [`ResiliencePipeline`] wraps calls to one unreliable dependency in a
//! total timeout, retries with exponential backoff, a circuit breaker, and a
//! per-attempt timeout. Pipelines are built once per dependency and resolved
//! by name from a [`ResiliencePipelineRegistry`].
//!
//! ```rust,ignore
//! let registry = ResiliencePipelineRegistry::new();
//! registry.add("redis-pipeline", ResilienceOptions::default())?;
//!
//! let pipeline = registry.get("redis-pipeline")?;
//! let basket = pipeline
//!     .execute(&token, || cache.get_string(&key))
//!     .await?;
//! ```

mod backoff;
mod circuit_breaker;
mod error;
mod options;
mod pipeline;
mod registry;

pub use backoff::{Backoff, Jitter};
pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState, Permit};
pub use error::ResilienceError;
pub use options::ResilienceOptions;
pub use pipeline::ResiliencePipeline;
pub use registry::ResiliencePipelineRegistry;
