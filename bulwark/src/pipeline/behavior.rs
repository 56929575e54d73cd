//! Behavior chain for ordered middleware execution.

use super::{DispatchContext, Handler, Request};
use async_trait::async_trait;
use std::sync::Arc;

/// A cross-cutting wrapper around request handling.
///
/// A behavior decides whether and how to call the rest of the chain through
/// [`Next::run`]. Behaviors hold no per-invocation state, so one instance can
/// serve concurrent requests.
#[async_trait]
pub trait Behavior<Q: Request>: Send + Sync {
    /// Returns the behavior's name, used for introspection.
    fn name(&self) -> &'static str;

    /// Handles the request, optionally delegating to `next`.
    async fn handle(
        &self,
        request: &Q,
        ctx: &DispatchContext,
        next: Next<'_, Q>,
    ) -> anyhow::Result<Q::Response>;
}

/// The remainder of a behavior chain.
///
/// Running it invokes the next behavior, or the handler once every behavior
/// has been passed.
pub struct Next<'a, Q: Request> {
    behaviors: &'a [Arc<dyn Behavior<Q>>],
    handler: &'a dyn Handler<Q>,
}

impl<'a, Q: Request> Next<'a, Q> {
    pub(crate) fn new(behaviors: &'a [Arc<dyn Behavior<Q>>], handler: &'a dyn Handler<Q>) -> Self {
        Self { behaviors, handler }
    }

    /// Returns the number of behaviors left before the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.behaviors.len()
    }

    /// Runs the rest of the chain.
    pub async fn run(self, request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        match self.behaviors.split_first() {
            Some((current, rest)) => {
                current
                    .handle(request, ctx, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.handle(request, ctx).await,
        }
    }
}

impl<Q: Request> std::fmt::Debug for Next<'_, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.behaviors.len())
            .finish_non_exhaustive()
    }
}
