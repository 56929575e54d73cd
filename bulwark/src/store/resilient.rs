//! Store decorator that routes every call through a resilience pipeline.

use super::{KeyValueStore, StoreError};
use crate::cancellation::CancellationToken;
use crate::resilience::ResiliencePipeline;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a [`KeyValueStore`] in a shared [`ResiliencePipeline`].
///
/// Policy failures that carry no dependency error (timeouts, an open
/// circuit) surface as [`StoreError::Rejected`].
pub struct ResilientStore<S> {
    inner: S,
    pipeline: Arc<ResiliencePipeline>,
}

impl<S: KeyValueStore> ResilientStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, pipeline: Arc<ResiliencePipeline>) -> Self {
        Self { inner, pipeline }
    }

    /// The pipeline guarding this store.
    pub fn pipeline(&self) -> &Arc<ResiliencePipeline> {
        &self.pipeline
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for ResilientStore<S> {
    async fn get(&self, key: &str, cancellation: &CancellationToken) -> Result<Option<String>, StoreError> {
        self.pipeline
            .execute(cancellation, || self.inner.get(key, cancellation))
            .await
            .map_err(StoreError::from)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        cancellation: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.pipeline
            .execute(cancellation, || self.inner.set(key, value.clone(), ttl, cancellation))
            .await
            .map_err(StoreError::from)
    }

    async fn remove(&self, key: &str, cancellation: &CancellationToken) -> Result<bool, StoreError> {
        self.pipeline
            .execute(cancellation, || self.inner.remove(key, cancellation))
            .await
            .map_err(StoreError::from)
    }
}

impl<S> std::fmt::Debug for ResilientStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientStore")
            .field("pipeline", &self.pipeline.name())
            .finish_non_exhaustive()
    }
}
