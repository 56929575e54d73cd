//! Mock handlers, validators, and dependencies.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::pipeline::{DispatchContext, Handler, Request};
use crate::validation::Validator;

/// A handler that returns a fixed response and records how often it ran.
pub struct StaticHandler<Q: Request> {
    response: Mutex<Q::Response>,
    calls: AtomicUsize,
}

impl<Q: Request> StaticHandler<Q>
where
    Q::Response: Clone,
{
    /// Creates a handler returning `response`.
    #[must_use]
    pub fn new(response: Q::Response) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the response.
    pub fn set_response(&self, response: Q::Response) {
        *self.response.lock() = response;
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<Q: Request> Handler<Q> for StaticHandler<Q>
where
    Q::Response: Clone + Sync,
{
    async fn handle(&self, _request: &Q, _ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.lock().clone())
    }
}

/// A handler that always raises an error.
pub struct FailingHandler<Q> {
    message: String,
    calls: AtomicUsize,
    _request: PhantomData<fn(Q)>,
}

impl<Q> FailingHandler<Q> {
    /// Creates a handler that fails with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
            _request: PhantomData,
        }
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<Q: Request> Handler<Q> for FailingHandler<Q> {
    async fn handle(&self, _request: &Q, _ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// A handler that panics.
pub struct PanickingHandler<Q> {
    message: &'static str,
    _request: PhantomData<fn(Q)>,
}

impl<Q> PanickingHandler<Q> {
    /// Creates a handler that panics with `message`.
    #[must_use]
    pub const fn new(message: &'static str) -> Self {
        Self {
            message,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<Q: Request> Handler<Q> for PanickingHandler<Q> {
    async fn handle(&self, _request: &Q, _ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        panic!("{}", self.message);
    }
}

/// A handler that sleeps before returning a fixed response.
///
/// The sleep observes the dispatch's cancellation token.
pub struct SlowHandler<Q: Request> {
    delay: Duration,
    response: Q::Response,
}

impl<Q: Request> SlowHandler<Q> {
    /// Creates a handler that waits `delay` before answering.
    #[must_use]
    pub const fn new(delay: Duration, response: Q::Response) -> Self {
        Self { delay, response }
    }
}

#[async_trait]
impl<Q: Request> Handler<Q> for SlowHandler<Q>
where
    Q::Response: Clone + Sync,
{
    async fn handle(&self, _request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => Ok(self.response.clone()),
            () = ctx.cancellation.cancelled() => Err(ctx.cancellation.to_error().into()),
        }
    }
}

/// A validator that reports the same messages for every request.
#[derive(Debug, Clone, Default)]
pub struct StaticValidator {
    messages: Vec<String>,
}

impl StaticValidator {
    /// Creates a validator reporting `messages`. An empty list accepts
    /// everything.
    #[must_use]
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// A validator that accepts everything.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<Q: Send + Sync> Validator<Q> for StaticValidator {
    async fn validate(&self, _request: &Q) -> Vec<String> {
        self.messages.clone()
    }
}

/// Error returned by [`FlakyOperation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transient failure on call {call}")]
pub struct TransientError {
    /// The 1-based call that failed.
    pub call: u32,
}

/// A dependency call that fails a set number of times before succeeding.
#[derive(Debug, Default)]
pub struct FlakyOperation {
    failures: u32,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl FlakyOperation {
    /// Fails the first `failures` calls.
    #[must_use]
    pub const fn new(failures: u32) -> Self {
        Self {
            failures,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Fails every call.
    #[must_use]
    pub const fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    /// Makes every call take `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Performs one call, returning the 1-based call number on success.
    pub async fn call(&self) -> Result<u32, TransientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call <= self.failures {
            Err(TransientError { call })
        } else {
            Ok(call)
        }
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
