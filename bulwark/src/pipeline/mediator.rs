//! Type-keyed request dispatcher.

use super::logging::DEFAULT_SLOW_THRESHOLD;
use super::{DispatchContext, Handler, Request, RequestPipeline};
use crate::cancellation::CancellationToken;
use crate::config::BulwarkConfig;
use crate::errors::{BulwarkError, Cancelled, DispatchError};
use crate::events::{default_sink, EventSink};
use crate::validation::{Validator, ValidatorRegistry};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Routes each request to the pipeline registered for its type.
///
/// Handlers registered through [`Mediator::register`] are wrapped in the
/// standard pipeline and share the mediator's validators and event sink.
pub struct Mediator {
    pipelines: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
    validators: Arc<ValidatorRegistry>,
    events: Arc<dyn EventSink>,
    slow_threshold: Duration,
}

impl Mediator {
    /// Creates a mediator with no handlers and a no-op event sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipelines: DashMap::new(),
            validators: Arc::new(ValidatorRegistry::new()),
            events: default_sink(),
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }

    /// Creates a mediator using the slow request threshold from `config`.
    #[must_use]
    pub fn from_config(config: &BulwarkConfig) -> Self {
        Self::new().with_slow_threshold(config.slow_request_threshold())
    }

    /// Sets the event sink used by pipelines registered afterwards.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares an existing validator registry.
    #[must_use]
    pub fn with_validators(mut self, validators: Arc<ValidatorRegistry>) -> Self {
        self.validators = validators;
        self
    }

    /// Sets the slow request threshold used by pipelines registered afterwards.
    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Registers `handler` for request type `Q` behind the standard pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::DuplicateHandler`] if `Q` already has a handler.
    pub fn register<Q, H>(&self, handler: H) -> Result<(), BulwarkError>
    where
        Q: Request,
        H: Handler<Q> + 'static,
    {
        let pipeline = RequestPipeline::standard(
            Arc::new(handler),
            self.validators.clone(),
            self.events.clone(),
            self.slow_threshold,
        );
        self.register_pipeline(pipeline)
    }

    /// Registers an explicitly composed pipeline for request type `Q`.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::DuplicateHandler`] if `Q` already has a handler.
    pub fn register_pipeline<Q: Request>(&self, pipeline: RequestPipeline<Q>) -> Result<(), BulwarkError> {
        match self.pipelines.entry(TypeId::of::<Q>()) {
            Entry::Occupied(_) => Err(BulwarkError::DuplicateHandler(Q::name())),
            Entry::Vacant(slot) => {
                debug!(request = Q::name(), behaviors = ?pipeline.behavior_names(), "Registered handler");
                slot.insert(Box::new(Arc::new(pipeline)));
                Ok(())
            }
        }
    }

    /// Registers a validator for request type `Q`.
    pub fn add_validator<Q, V>(&self, validator: V)
    where
        Q: Request,
        V: Validator<Q> + 'static,
    {
        self.validators.register::<Q, V>(validator);
    }

    /// Returns the validator registry.
    #[must_use]
    pub fn validators(&self) -> &Arc<ValidatorRegistry> {
        &self.validators
    }

    /// Returns true if a handler is registered for `Q`.
    #[must_use]
    pub fn has_handler<Q: Request>(&self) -> bool {
        self.pipelines.contains_key(&TypeId::of::<Q>())
    }

    /// Returns the number of registered request types.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Dispatches a request that cannot be cancelled.
    ///
    /// # Errors
    ///
    /// See [`Mediator::send_with`].
    pub async fn send<Q: Request>(&self, request: Q) -> Result<Q::Response, DispatchError> {
        self.send_with(request, Arc::new(CancellationToken::new())).await
    }

    /// Dispatches a request under a caller-owned cancellation token.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::NoHandler`] if nothing handles `Q`.
    /// * [`DispatchError::Cancelled`] if the token was cancelled before or
    ///   during handling. A handler still running when the token fires is
    ///   dropped at its next suspension point.
    /// * [`DispatchError::Unhandled`] if the handler faulted and `Q`'s
    ///   response type cannot carry the error.
    pub async fn send_with<Q: Request>(
        &self,
        request: Q,
        cancellation: Arc<CancellationToken>,
    ) -> Result<Q::Response, DispatchError> {
        let name = Q::name();
        let pipeline = self
            .pipeline::<Q>()
            .ok_or(DispatchError::NoHandler { request: name })?;

        if cancellation.is_cancelled() {
            return Err(Self::cancelled(name, &cancellation));
        }

        let ctx = DispatchContext::new(cancellation);
        let executed = tokio::select! {
            biased;
            () = ctx.cancellation.cancelled() => {
                debug!(request = name, "Dispatch abandoned on cancellation");
                return Err(Self::cancelled(name, &ctx.cancellation));
            }
            executed = pipeline.execute(&request, &ctx) => executed,
        };

        match executed {
            Ok(response) => Ok(response),
            Err(err) => {
                if let Some(cancelled) = err.downcast_ref::<Cancelled>() {
                    return Err(DispatchError::Cancelled {
                        request: name,
                        reason: cancelled.reason.clone(),
                    });
                }
                if ctx.is_cancelled() {
                    return Err(Self::cancelled(name, &ctx.cancellation));
                }
                Err(DispatchError::Unhandled {
                    request: name,
                    source: err,
                })
            }
        }
    }

    fn cancelled(request: &'static str, cancellation: &CancellationToken) -> DispatchError {
        DispatchError::Cancelled {
            request,
            reason: cancellation.to_error().reason,
        }
    }

    fn pipeline<Q: Request>(&self) -> Option<Arc<RequestPipeline<Q>>> {
        self.pipelines
            .get(&TypeId::of::<Q>())
            .and_then(|entry| entry.value().downcast_ref::<Arc<RequestPipeline<Q>>>().cloned())
    }
}

impl Default for Mediator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("handlers", &self.pipelines.len())
            .field("validators", &self.validators)
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}
