//! Named resilience pipelines.

use super::{ResilienceOptions, ResiliencePipeline};
use crate::config::BulwarkConfig;
use crate::errors::BulwarkError;
use crate::events::{default_sink, EventSink};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Pipelines constructed once by name and resolved by name afterwards.
///
/// Every caller resolving the same name shares one circuit.
pub struct ResiliencePipelineRegistry {
    pipelines: DashMap<String, Arc<ResiliencePipeline>>,
    events: Arc<dyn EventSink>,
}

impl ResiliencePipelineRegistry {
    /// Creates an empty registry reporting to the default event sink.
    #[must_use]
    pub fn new() -> Self {
        Self::with_events(default_sink())
    }

    /// Creates an empty registry whose pipelines report to `events`.
    #[must_use]
    pub fn with_events(events: Arc<dyn EventSink>) -> Self {
        Self {
            pipelines: DashMap::new(),
            events,
        }
    }

    /// Creates a registry with every pipeline declared in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] for the first invalid entry.
    pub fn from_config(config: &BulwarkConfig, events: Arc<dyn EventSink>) -> Result<Self, BulwarkError> {
        let registry = Self::with_events(events);
        for (name, options) in &config.pipelines {
            registry.add(name.clone(), options.clone())?;
        }
        Ok(registry)
    }

    /// Builds and registers a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] if the options are invalid and
    /// [`BulwarkError::DuplicatePipeline`] if the name is taken.
    pub fn add(
        &self,
        name: impl Into<String>,
        options: ResilienceOptions,
    ) -> Result<Arc<ResiliencePipeline>, BulwarkError> {
        let name = name.into();
        match self.pipelines.entry(name.clone()) {
            Entry::Occupied(_) => Err(BulwarkError::DuplicatePipeline(name)),
            Entry::Vacant(slot) => {
                let pipeline = Arc::new(ResiliencePipeline::with_events(
                    name.clone(),
                    options,
                    self.events.clone(),
                )?);
                info!(
                    pipeline = %name,
                    max_retry_attempts = pipeline.options().max_retry_attempts,
                    "Registered resilience pipeline"
                );
                slot.insert(pipeline.clone());
                Ok(pipeline)
            }
        }
    }

    /// Registers a pipeline whose options start from the defaults.
    ///
    /// ```rust,ignore
    /// registry.add_with("redis-pipeline", |o| {
    ///     o.max_retry_attempts = 5;
    ///     o.total_timeout = Duration::from_secs(10);
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`ResiliencePipelineRegistry::add`].
    pub fn add_with<F>(&self, name: impl Into<String>, configure: F) -> Result<Arc<ResiliencePipeline>, BulwarkError>
    where
        F: FnOnce(&mut ResilienceOptions),
    {
        let mut options = ResilienceOptions::default();
        configure(&mut options);
        self.add(name, options)
    }

    /// Resolves a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::PipelineNotFound`] if nothing is registered
    /// under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<ResiliencePipeline>, BulwarkError> {
        self.pipelines
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BulwarkError::PipelineNotFound(name.to_string()))
    }

    /// Resolves a pipeline, registering it with `options` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] if the pipeline is new and
    /// the options are invalid.
    pub fn get_or_add(
        &self,
        name: &str,
        options: ResilienceOptions,
    ) -> Result<Arc<ResiliencePipeline>, BulwarkError> {
        match self.pipelines.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                let pipeline = Arc::new(ResiliencePipeline::with_events(name, options, self.events.clone())?);
                slot.insert(pipeline.clone());
                Ok(pipeline)
            }
        }
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if no pipeline is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl Default for ResiliencePipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResiliencePipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePipelineRegistry")
            .field("pipelines", &self.names())
            .finish_non_exhaustive()
    }
}
