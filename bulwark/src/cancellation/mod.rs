//! Cooperative cancellation.
//!
//! A [`CancellationToken`] travels with every dispatched request and into the
//! resilience pipeline. Cancellation expresses caller intent: it is never
//! retried and never counted against a dependency's health.

mod token;

pub use token::CancellationToken;
