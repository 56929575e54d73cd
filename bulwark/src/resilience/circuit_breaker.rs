//! Rolling-window circuit breaker.

use super::ResilienceOptions;
use crate::events::{timestamped, types, EventSink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through and are sampled.
    Closed,
    /// Calls are rejected without running.
    Open,
    /// One trial call decides whether to close or re-open.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Samples in the rolling window.
    pub samples: usize,
    /// Failed samples in the rolling window.
    pub failures: usize,
}

#[derive(Debug)]
enum Phase {
    Closed,
    /// `until` is `None` when the break outlasts the clock.
    Open { until: Option<Instant> },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Circuit {
    phase: Phase,
    /// (completed at, failed)
    window: VecDeque<(Instant, bool)>,
}

enum Transition {
    Opened { samples: usize, failures: usize },
    HalfOpened,
    Closed,
}

/// Circuit breaker shared by every caller of one named pipeline.
///
/// Attempt outcomes land in a time-based rolling window. Once the window
/// holds at least `min_throughput` samples and a failure pushes the failure
/// ratio to the threshold, the circuit opens for the break duration. The
/// first call after that is a trial: success closes the circuit, failure
/// re-opens it. State and window live under one mutex so concurrent
/// completions update them together.
pub struct CircuitBreaker {
    pipeline: String,
    failure_ratio: f64,
    sampling_window: Duration,
    min_throughput: usize,
    break_duration: Duration,
    circuit: Mutex<Circuit>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreaker {
    /// Creates a closed breaker from pipeline options.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, options: &ResilienceOptions, events: Arc<dyn EventSink>) -> Self {
        Self {
            pipeline: pipeline.into(),
            failure_ratio: options.circuit_breaker_failure_ratio,
            sampling_window: options.circuit_breaker_sampling_window,
            min_throughput: usize::try_from(options.circuit_breaker_min_throughput).unwrap_or(usize::MAX),
            break_duration: options.circuit_breaker_break_duration,
            circuit: Mutex::new(Circuit {
                phase: Phase::Closed,
                window: VecDeque::new(),
            }),
            events,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    /// Returns the state and window counts.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = Instant::now();
        let mut circuit = self.circuit.lock();
        self.prune(&mut circuit.window, now);
        let state = match circuit.phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        };
        CircuitSnapshot {
            state,
            samples: circuit.window.len(),
            failures: circuit.window.iter().filter(|(_, failed)| *failed).count(),
        }
    }

    /// Asks to run one attempt.
    ///
    /// # Errors
    ///
    /// Returns the time left until a trial call is possible when the circuit
    /// rejects the attempt.
    pub fn acquire(&self) -> Result<Permit<'_>, Duration> {
        let now = Instant::now();
        let (result, transition) = {
            let mut circuit = self.circuit.lock();
            match circuit.phase {
                Phase::Closed => (Ok(false), None),
                Phase::Open { until: Some(until) } if now >= until => {
                    circuit.phase = Phase::HalfOpen { trial_in_flight: true };
                    (Ok(true), Some(Transition::HalfOpened))
                }
                Phase::Open { until: Some(until) } => (Err(until - now), None),
                Phase::Open { until: None } => (Err(Duration::MAX), None),
                Phase::HalfOpen { trial_in_flight: true } => (Err(Duration::ZERO), None),
                Phase::HalfOpen { trial_in_flight: false } => {
                    circuit.phase = Phase::HalfOpen { trial_in_flight: true };
                    (Ok(true), None)
                }
            }
        };

        if let Some(transition) = transition {
            self.announce(&transition);
        }
        result.map(|trial| Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn record(&self, trial: bool, failed: bool) {
        let now = Instant::now();
        let transition = {
            let mut circuit = self.circuit.lock();
            if trial {
                match circuit.phase {
                    Phase::HalfOpen { .. } if failed => Some(self.open(&mut circuit, now)),
                    Phase::HalfOpen { .. } => {
                        circuit.phase = Phase::Closed;
                        circuit.window.clear();
                        Some(Transition::Closed)
                    }
                    _ => None,
                }
            } else if matches!(circuit.phase, Phase::Closed) {
                self.prune(&mut circuit.window, now);
                circuit.window.push_back((now, failed));
                if failed && self.should_open(&circuit.window) {
                    Some(self.open(&mut circuit, now))
                } else {
                    None
                }
            } else {
                // Attempts admitted before the circuit opened finish here.
                None
            }
        };

        if let Some(transition) = transition {
            self.announce(&transition);
        }
    }

    fn release_trial(&self) {
        let mut circuit = self.circuit.lock();
        if matches!(circuit.phase, Phase::HalfOpen { .. }) {
            circuit.phase = Phase::HalfOpen { trial_in_flight: false };
        }
    }

    fn should_open(&self, window: &VecDeque<(Instant, bool)>) -> bool {
        if window.len() < self.min_throughput {
            return false;
        }
        let failures = window.iter().filter(|(_, failed)| *failed).count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = failures as f64 / window.len() as f64;
        ratio >= self.failure_ratio
    }

    fn open(&self, circuit: &mut Circuit, now: Instant) -> Transition {
        let samples = circuit.window.len();
        let failures = circuit.window.iter().filter(|(_, failed)| *failed).count();
        circuit.phase = Phase::Open {
            until: now.checked_add(self.break_duration),
        };
        circuit.window.clear();
        Transition::Opened { samples, failures }
    }

    fn prune(&self, window: &mut VecDeque<(Instant, bool)>, now: Instant) {
        while window
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) >= self.sampling_window)
        {
            window.pop_front();
        }
    }

    fn announce(&self, transition: &Transition) {
        match transition {
            Transition::Opened { samples, failures } => {
                error!(
                    pipeline = %self.pipeline,
                    state = %CircuitState::Open,
                    break_ms = u64::try_from(self.break_duration.as_millis()).unwrap_or(u64::MAX),
                    samples,
                    failures,
                    "[RESILIENCE] Circuit OPENED for pipeline '{}' for {:?}",
                    self.pipeline,
                    self.break_duration
                );
                self.events.try_emit(
                    types::CIRCUIT_OPENED,
                    Some(timestamped(serde_json::json!({
                        "pipeline": self.pipeline,
                        "break_ms": u64::try_from(self.break_duration.as_millis()).unwrap_or(u64::MAX),
                        "samples": samples,
                        "failures": failures,
                    }))),
                );
            }
            Transition::HalfOpened => {
                info!(
                    pipeline = %self.pipeline,
                    state = %CircuitState::HalfOpen,
                    "[RESILIENCE] Circuit HALF-OPEN for pipeline '{}', admitting a trial call",
                    self.pipeline
                );
                self.events.try_emit(
                    types::CIRCUIT_HALF_OPENED,
                    Some(timestamped(serde_json::json!({ "pipeline": self.pipeline }))),
                );
            }
            Transition::Closed => {
                info!(
                    pipeline = %self.pipeline,
                    state = %CircuitState::Closed,
                    "[RESILIENCE] Circuit CLOSED for pipeline '{}', recovered",
                    self.pipeline
                );
                self.events.try_emit(
                    types::CIRCUIT_CLOSED,
                    Some(timestamped(serde_json::json!({ "pipeline": self.pipeline }))),
                );
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("pipeline", &self.pipeline)
            .field("failure_ratio", &self.failure_ratio)
            .field("min_throughput", &self.min_throughput)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Admission for one attempt.
///
/// Settle it with [`Permit::success`] or [`Permit::failure`]. Dropping it
/// unsettled (cancellation) records nothing and frees a held trial slot.
#[must_use = "an unsettled permit records nothing"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Returns true if this is the half-open trial call.
    #[must_use]
    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records a successful attempt.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, false);
    }

    /// Records a failed attempt.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, true);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

impl std::fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("pipeline", &self.breaker.pipeline)
            .field("trial", &self.trial)
            .finish()
    }
}
