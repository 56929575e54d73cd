//! Key/value dependency seam.
//!
//! [`KeyValueStore`] stands for any remote key/value dependency (a cache
//! server, a document store). The decorators compose by ownership:
//!
//! ```rust,ignore
//! let redis = ResilientStore::new(RedisStore::connect(url)?, registry.get("redis-pipeline")?);
//! let baskets = CachedStore::new(redis, Duration::from_secs(60));
//! ```

mod cached;
mod memory;
mod resilient;

pub use cached::CachedStore;
pub use memory::InMemoryStore;
pub use resilient::ResilientStore;

use crate::cancellation::CancellationToken;
use crate::errors::Cancelled;
use crate::resilience::ResilienceError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing dependency failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The resilience pipeline gave up without a dependency error.
    #[error("Resilience policy rejected the call: {0}")]
    Rejected(String),

    /// The caller cancelled the call.
    #[error("Store call cancelled: {0}")]
    Cancelled(String),
}

impl StoreError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Returns true if the call was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<Cancelled> for StoreError {
    fn from(cancelled: Cancelled) -> Self {
        Self::Cancelled(cancelled.reason)
    }
}

impl From<ResilienceError<Self>> for StoreError {
    fn from(err: ResilienceError<Self>) -> Self {
        match err {
            ResilienceError::Inner(inner) => inner,
            ResilienceError::Cancelled { reason, .. } => Self::Cancelled(reason),
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// An async key/value dependency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str, cancellation: &CancellationToken) -> Result<Option<String>, StoreError>;

    /// Writes a value, optionally expiring after `ttl`.
    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        cancellation: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Removes a value. Returns true if the call completed.
    async fn remove(&self, key: &str, cancellation: &CancellationToken) -> Result<bool, StoreError>;
}

/// Reads and decodes a JSON value.
///
/// Missing and blank values both read as `None`.
///
/// # Errors
///
/// Returns the store's error, or [`StoreError::Serialization`] if the value
/// is not valid JSON for `T`.
pub async fn get_json<T, S>(store: &S, key: &str, cancellation: &CancellationToken) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.get(key, cancellation).await? {
        Some(json) if !json.trim().is_empty() => Ok(Some(serde_json::from_str(&json)?)),
        _ => Ok(None),
    }
}

/// Encodes and writes a JSON value.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if `value` cannot be encoded, or the
/// store's error.
pub async fn set_json<T, S>(
    store: &S,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
    cancellation: &CancellationToken,
) -> Result<(), StoreError>
where
    T: Serialize + Sync,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string(value)?;
    store.set(key, json, ttl, cancellation).await
}
