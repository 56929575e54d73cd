//! Request validation.
//!
//! Validators are registered per request type. The validation behavior asks
//! the [`ValidatorRegistry`] for the validators of the request it is wrapping
//! and runs them as one concurrent batch.

mod registry;
mod rules;

pub use registry::ValidatorRegistry;
pub use rules::RuleSet;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Checks a request and reports every violated constraint.
#[async_trait]
pub trait Validator<Q>: Send + Sync
where
    Q: Send + Sync,
{
    /// Returns one message per violation; an empty list means valid.
    async fn validate(&self, request: &Q) -> Vec<String>;
}

/// Runs all validators concurrently and collects their violations.
///
/// Every validator runs to completion; violations are concatenated in
/// registration order.
pub async fn validate_all<Q>(validators: &[Arc<dyn Validator<Q>>], request: &Q) -> Vec<String>
where
    Q: Send + Sync,
{
    join_all(validators.iter().map(|v| v.validate(request)))
        .await
        .into_iter()
        .flatten()
        .collect()
}
