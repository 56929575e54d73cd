//! Exponential backoff with jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jitter {
    /// Exact delays.
    None,
    /// Adds a random amount in `[0, delay / 4]`.
    ///
    /// The un-jittered delay stays a lower bound.
    #[default]
    Additive,
}

/// Computes the delay before each retry.
///
/// Retry `n` (1-based) waits `base * 2^(n-1)`, capped at `max`, plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: Jitter,
}

impl Backoff {
    /// Creates an exponential backoff.
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: Jitter::Additive,
        }
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the jitter strategy.
    #[must_use]
    pub const fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Returns the delay before retry `retry` without jitter.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(1u64 << exponent).min(max_ms))
    }

    /// Returns the delay before retry `retry`, jitter included.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = self.base_delay(retry);
        match self.jitter {
            Jitter::None => delay,
            Jitter::Additive => {
                let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
                if spread == 0 {
                    delay
                } else {
                    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_without_jitter() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30)).with_jitter(Jitter::None);

        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_millis(1000));
        assert_eq!(backoff.delay(3), Duration::from_millis(2000));
        assert_eq!(backoff.jitter(), Jitter::None);
    }

    #[test]
    fn test_cap_applies() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5)).with_jitter(Jitter::None);
        assert_eq!(backoff.delay(4), Duration::from_secs(5));
        assert_eq!(backoff.delay(60), Duration::from_secs(5));
    }

    #[test]
    fn test_additive_jitter_keeps_floor() {
        let backoff = Backoff::new(Duration::from_millis(400), Duration::from_secs(30));
        for retry in 1..=4 {
            let floor = backoff.base_delay(retry);
            for _ in 0..50 {
                let delay = backoff.delay(retry);
                assert!(delay >= floor);
                assert!(delay <= floor + floor / 4);
            }
        }
    }

    #[test]
    fn test_zero_base_delay() {
        let backoff = Backoff::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(backoff.delay(3), Duration::ZERO);
    }
}
