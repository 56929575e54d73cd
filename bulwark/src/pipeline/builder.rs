//! Request pipeline composition.

use super::{
    Behavior, DispatchContext, ExceptionHandlingBehavior, Handler, LoggingBehavior, Next, Request,
    ValidationBehavior,
};
use crate::events::EventSink;
use crate::validation::ValidatorRegistry;
use std::sync::Arc;
use std::time::Duration;

/// A handler wrapped by an ordered list of behaviors.
///
/// The first behavior is outermost; the handler runs innermost.
pub struct RequestPipeline<Q: Request> {
    behaviors: Vec<Arc<dyn Behavior<Q>>>,
    handler: Arc<dyn Handler<Q>>,
}

impl<Q: Request> RequestPipeline<Q> {
    /// Starts building a pipeline around `handler`.
    #[must_use]
    pub fn builder(handler: Arc<dyn Handler<Q>>) -> PipelineBuilder<Q> {
        PipelineBuilder::new(handler)
    }

    /// Builds the standard pipeline:
    /// logging, then validation, then exception handling, then the handler.
    #[must_use]
    pub fn standard(
        handler: Arc<dyn Handler<Q>>,
        validators: Arc<ValidatorRegistry>,
        events: Arc<dyn EventSink>,
        slow_threshold: Duration,
    ) -> Self {
        Self::builder(handler)
            .behavior(LoggingBehavior::new(events.clone()).with_slow_threshold(slow_threshold))
            .behavior(ValidationBehavior::new(validators, events.clone()))
            .behavior(ExceptionHandlingBehavior::new(events))
            .build()
    }

    /// Runs the request through every behavior and the handler.
    pub async fn execute(&self, request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        Next::new(&self.behaviors, self.handler.as_ref())
            .run(request, ctx)
            .await
    }

    /// Returns the behavior names, outermost first.
    #[must_use]
    pub fn behavior_names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|b| b.name()).collect()
    }

    /// Returns the number of behaviors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Returns true if the handler runs unwrapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

impl<Q: Request> std::fmt::Debug for RequestPipeline<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("request", &Q::name())
            .field("behaviors", &self.behavior_names())
            .finish_non_exhaustive()
    }
}

/// Builder for explicitly composed request pipelines.
pub struct PipelineBuilder<Q: Request> {
    behaviors: Vec<Arc<dyn Behavior<Q>>>,
    handler: Arc<dyn Handler<Q>>,
}

impl<Q: Request> PipelineBuilder<Q> {
    /// Creates a builder around `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn Handler<Q>>) -> Self {
        Self {
            behaviors: Vec::new(),
            handler,
        }
    }

    /// Appends a behavior inside the ones already added.
    #[must_use]
    pub fn behavior<B: Behavior<Q> + 'static>(self, behavior: B) -> Self {
        self.shared_behavior(Arc::new(behavior))
    }

    /// Appends a shared behavior inside the ones already added.
    #[must_use]
    pub fn shared_behavior(mut self, behavior: Arc<dyn Behavior<Q>>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Returns the number of behaviors added so far.
    #[must_use]
    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> RequestPipeline<Q> {
        RequestPipeline {
            behaviors: self.behaviors,
            handler: self.handler,
        }
    }
}
