//! In-process key/value store.

use super::{KeyValueStore, StoreError};
use crate::cancellation::CancellationToken;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A [`KeyValueStore`] held in memory, with per-entry expiry.
///
/// Stands in for a remote dependency in development and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    /// Returns true if no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str, cancellation: &CancellationToken) -> Result<Option<String>, StoreError> {
        cancellation.error_if_cancelled()?;

        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        cancellation: &CancellationToken,
    ) -> Result<(), StoreError> {
        cancellation.error_if_cancelled()?;

        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str, cancellation: &CancellationToken) -> Result<bool, StoreError> {
        cancellation.error_if_cancelled()?;

        self.entries.remove(key);
        Ok(true)
    }
}
