//! Timeout, retry, and circuit breaking around one outbound call.

use super::{Backoff, CircuitBreaker, CircuitState, Jitter, ResilienceError, ResilienceOptions};
use crate::cancellation::CancellationToken;
use crate::errors::BulwarkError;
use crate::events::{default_sink, timestamped, types, EventSink};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named policy stack guarding calls to one dependency.
///
/// Layers, outermost first:
///
/// 1. total timeout over the whole execution, backoff sleeps included
/// 2. retry with exponential backoff and jitter
/// 3. circuit breaker, consulted per attempt
/// 4. per-attempt timeout
///
/// Cancellation through the caller's token aborts at any await point. It is
/// never retried and never reaches the circuit breaker.
pub struct ResiliencePipeline {
    name: String,
    options: ResilienceOptions,
    backoff: Backoff,
    breaker: CircuitBreaker,
    events: Arc<dyn EventSink>,
}

impl ResiliencePipeline {
    /// Builds a pipeline that reports to the default event sink.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] if `options` fail validation.
    pub fn new(name: impl Into<String>, options: ResilienceOptions) -> Result<Self, BulwarkError> {
        Self::with_events(name, options, default_sink())
    }

    /// Builds a pipeline that reports to `events`.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] if `options` fail validation.
    pub fn with_events(
        name: impl Into<String>,
        options: ResilienceOptions,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, BulwarkError> {
        let name = name.into();
        options.validate(&name)?;

        Ok(Self {
            backoff: Backoff::new(options.retry_base_delay, options.retry_max_delay),
            breaker: CircuitBreaker::new(name.clone(), &options, events.clone()),
            name,
            options,
            events,
        })
    }

    /// Replaces the backoff jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.backoff = self.backoff.with_jitter(jitter);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the options the pipeline was built with.
    #[must_use]
    pub const fn options(&self) -> &ResilienceOptions {
        &self.options
    }

    /// Returns the circuit breaker.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Returns the current circuit state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Runs `operation` under every policy of this pipeline.
    ///
    /// `operation` is called once per attempt.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's failure once retries are exhausted, or
    /// [`ResilienceError::TotalTimeout`] / [`ResilienceError::Cancelled`]
    /// when the whole execution is cut short.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancellation: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if cancellation.is_cancelled() {
            return Err(self.cancelled(cancellation));
        }

        tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(self.cancelled(cancellation)),
            outcome = tokio::time::timeout(
                self.options.total_timeout,
                self.retry(cancellation, &mut operation),
            ) => outcome.unwrap_or_else(|_| Err(self.total_timeout())),
        }
    }

    async fn retry<T, E, F, Fut>(
        &self,
        cancellation: &CancellationToken,
        operation: &mut F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);

            let failure = match self.breaker.acquire() {
                Err(retry_after) => ResilienceError::CircuitOpen {
                    pipeline: self.name.clone(),
                    retry_after,
                },
                Ok(permit) => {
                    match tokio::time::timeout(self.options.per_attempt_timeout, operation()).await {
                        Ok(Ok(value)) => {
                            permit.success();
                            return Ok(value);
                        }
                        Ok(Err(_)) if cancellation.is_cancelled() => {
                            drop(permit);
                            return Err(self.cancelled(cancellation));
                        }
                        Ok(Err(err)) => {
                            permit.failure();
                            ResilienceError::Inner(err)
                        }
                        Err(_) => {
                            permit.failure();
                            ResilienceError::AttemptTimeout {
                                pipeline: self.name.clone(),
                                timeout: self.options.per_attempt_timeout,
                            }
                        }
                    }
                }
            };

            if attempt > self.options.max_retry_attempts {
                debug!(pipeline = %self.name, attempts = attempt, "Retries exhausted");
                return Err(failure);
            }

            let delay = self.backoff.delay(attempt);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(
                pipeline = %self.name,
                attempt,
                max = self.options.max_retry_attempts,
                delay_ms,
                error = %failure,
                "[RESILIENCE] Retry {}/{} for pipeline '{}' in {}ms: {}",
                attempt,
                self.options.max_retry_attempts,
                self.name,
                delay_ms,
                failure
            );
            self.events.try_emit(
                types::RESILIENCE_RETRY,
                Some(timestamped(serde_json::json!({
                    "pipeline": self.name,
                    "attempt": attempt,
                    "max": self.options.max_retry_attempts,
                    "delay_ms": delay_ms,
                    "error": failure.to_string(),
                }))),
            );

            tokio::time::sleep(delay).await;
        }
    }

    fn cancelled<E>(&self, cancellation: &CancellationToken) -> ResilienceError<E> {
        let reason = cancellation.to_error().reason;
        debug!(pipeline = %self.name, reason = %reason, "Execution cancelled");
        ResilienceError::Cancelled {
            pipeline: self.name.clone(),
            reason,
        }
    }

    fn total_timeout<E>(&self) -> ResilienceError<E> {
        let timeout = self.options.total_timeout;
        warn!(
            pipeline = %self.name,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "[RESILIENCE] Total timeout exceeded for pipeline '{}' after {:?}",
            self.name,
            timeout
        );
        self.events.try_emit(
            types::RESILIENCE_TOTAL_TIMEOUT,
            Some(timestamped(serde_json::json!({
                "pipeline": self.name,
                "timeout_ms": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }))),
        );
        ResilienceError::TotalTimeout {
            pipeline: self.name.clone(),
            timeout,
        }
    }
}

impl std::fmt::Debug for ResiliencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePipeline")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("circuit", &self.breaker.state())
            .finish_non_exhaustive()
    }
}
