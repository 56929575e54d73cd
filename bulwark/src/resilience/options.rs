//! Resilience pipeline options.

use crate::errors::BulwarkError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for one named resilience pipeline.
///
/// Durations serialize as whole milliseconds (`retry_base_delay_ms`, ...).
/// Options are consumed when the pipeline is built; later changes to a copy
/// do not affect a running pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceOptions {
    /// Retries after the first attempt.
    pub max_retry_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    #[serde(rename = "retry_base_delay_ms", with = "duration_ms")]
    pub retry_base_delay: Duration,
    /// Upper bound for a single backoff step, before jitter.
    #[serde(rename = "retry_max_delay_ms", with = "duration_ms")]
    pub retry_max_delay: Duration,
    /// Bound on a single attempt.
    #[serde(rename = "per_attempt_timeout_ms", with = "duration_ms")]
    pub per_attempt_timeout: Duration,
    /// Bound on the whole execution, retries and backoff included.
    #[serde(rename = "total_timeout_ms", with = "duration_ms")]
    pub total_timeout: Duration,
    /// Failure ratio at or above which the circuit opens.
    pub circuit_breaker_failure_ratio: f64,
    /// Length of the rolling window of attempt outcomes.
    #[serde(rename = "circuit_breaker_sampling_window_ms", with = "duration_ms")]
    pub circuit_breaker_sampling_window: Duration,
    /// Samples required in the window before the circuit may open.
    pub circuit_breaker_min_throughput: u32,
    /// How long the circuit stays open.
    #[serde(rename = "circuit_breaker_break_duration_ms", with = "duration_ms")]
    pub circuit_breaker_break_duration: Duration,
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            per_attempt_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_secs(30),
            circuit_breaker_failure_ratio: 0.5,
            circuit_breaker_sampling_window: Duration::from_secs(30),
            circuit_breaker_min_throughput: 5,
            circuit_breaker_break_duration: Duration::from_secs(30),
        }
    }
}

impl ResilienceOptions {
    /// Creates options with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retries.
    #[must_use]
    pub const fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Sets the backoff cap.
    #[must_use]
    pub const fn with_retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    /// Sets the total timeout.
    #[must_use]
    pub const fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }

    /// Sets the failure ratio that opens the circuit.
    #[must_use]
    pub const fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.circuit_breaker_failure_ratio = ratio;
        self
    }

    /// Sets the sampling window.
    #[must_use]
    pub const fn with_sampling_window(mut self, window: Duration) -> Self {
        self.circuit_breaker_sampling_window = window;
        self
    }

    /// Sets the minimum throughput.
    #[must_use]
    pub const fn with_min_throughput(mut self, calls: u32) -> Self {
        self.circuit_breaker_min_throughput = calls;
        self
    }

    /// Sets the break duration.
    #[must_use]
    pub const fn with_break_duration(mut self, duration: Duration) -> Self {
        self.circuit_breaker_break_duration = duration;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::InvalidOptions`] naming the first bad value.
    pub fn validate(&self, pipeline: &str) -> Result<(), BulwarkError> {
        let ratio = self.circuit_breaker_failure_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(BulwarkError::invalid_options(
                pipeline,
                format!("circuit_breaker_failure_ratio must be within [0, 1], got {ratio}"),
            ));
        }
        if self.circuit_breaker_min_throughput == 0 {
            return Err(BulwarkError::invalid_options(
                pipeline,
                "circuit_breaker_min_throughput must be at least 1",
            ));
        }

        let positive = [
            ("per_attempt_timeout", self.per_attempt_timeout),
            ("total_timeout", self.total_timeout),
            ("circuit_breaker_sampling_window", self.circuit_breaker_sampling_window),
            ("circuit_breaker_break_duration", self.circuit_breaker_break_duration),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| value.is_zero()) {
            return Err(BulwarkError::invalid_options(
                pipeline,
                format!("{field} must be greater than zero"),
            ));
        }

        if self.retry_max_delay < self.retry_base_delay {
            return Err(BulwarkError::invalid_options(
                pipeline,
                "retry_max_delay must not be shorter than retry_base_delay",
            ));
        }

        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
