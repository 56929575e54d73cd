//! Read-through cache in front of a slower store.

use super::{KeyValueStore, StoreError};
use crate::cancellation::CancellationToken;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Caches reads from `inner` in process for `ttl`.
///
/// Writes go to `inner` first and refresh the cache only once they land;
/// removals invalidate the cached copy. Absent values are not cached.
pub struct CachedStore<S> {
    inner: S,
    cache: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl<S: KeyValueStore> CachedStore<S> {
    /// Wraps `inner` with a cache whose entries live for `ttl`.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Number of cached entries, including expired ones not yet evicted.
    ///
    /// Expired entries are evicted on the next write to the cache.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn cached(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = self
            .cache
            .get(key)
            .and_then(|entry| (now < entry.1).then(|| entry.0.clone()));
        if hit.is_none() {
            self.cache.remove_if(key, |_, entry| now >= entry.1);
        }
        hit
    }

    fn remember(&self, key: &str, value: String) {
        let now = Instant::now();
        self.cache.retain(|_, entry| now < entry.1);
        self.cache.insert(key.to_string(), (value, now + self.ttl));
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for CachedStore<S> {
    async fn get(&self, key: &str, cancellation: &CancellationToken) -> Result<Option<String>, StoreError> {
        if let Some(value) = self.cached(key) {
            debug!(key, "Cache hit");
            return Ok(Some(value));
        }

        info!(key, "Cache miss for '{}', fetching from store", key);
        let value = self.inner.get(key, cancellation).await?;
        if let Some(value) = &value {
            self.remember(key, value.clone());
        }
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        cancellation: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.inner.set(key, value.clone(), ttl, cancellation).await?;
        self.remember(key, value);
        info!(key, "'{}' stored and cache updated", key);
        Ok(())
    }

    async fn remove(&self, key: &str, cancellation: &CancellationToken) -> Result<bool, StoreError> {
        let removed = self.inner.remove(key, cancellation).await?;
        self.cache.remove(key);
        info!(key, "'{}' removed and cache invalidated", key);
        Ok(removed)
    }
}

impl<S> std::fmt::Debug for CachedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedStore")
            .field("cached", &self.cache.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
