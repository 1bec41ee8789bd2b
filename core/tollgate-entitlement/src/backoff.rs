//! Exponential backoff for the watch loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff parameters. There is no attempt limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay (ms).
    pub initial_ms: u64,
    /// Growth factor applied after every failure.
    pub multiplier: f64,
    /// Upper bound on any single delay (ms).
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            multiplier: 1.5,
            max_ms: 60_000,
        }
    }
}

/// Infinite exponential backoff.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_ms: u64,
}

impl ExponentialBackoff {
    /// Creates a backoff starting at `config.initial_ms`.
    pub fn new(config: BackoffConfig) -> Self {
        let current_ms = config.initial_ms.min(config.max_ms);
        Self { config, current_ms }
    }

    /// Returns the delay to wait now and grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_ms;
        let grown = (self.current_ms as f64 * self.config.multiplier.max(1.0)).ceil();
        self.current_ms = if grown >= self.config.max_ms as f64 {
            self.config.max_ms
        } else {
            (grown as u64).max(1)
        };
        Duration::from_millis(delay)
    }

    /// Starts over from the initial delay.
    pub fn reset(&mut self) {
        self.current_ms = self.config.initial_ms.min(self.config.max_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial_ms: u64, multiplier: f64, max_ms: u64) -> BackoffConfig {
        BackoffConfig {
            initial_ms,
            multiplier,
            max_ms,
        }
    }

    #[test]
    fn grows_geometrically_until_capped() {
        let mut backoff = ExponentialBackoff::new(config(100, 2.0, 500));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500, 500]);
    }

    #[test]
    fn never_gives_up() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig::default());
        for _ in 0..10_000 {
            assert!(backoff.next_delay() <= Duration::from_secs(60));
        }
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = ExponentialBackoff::new(config(10, 3.0, 1_000));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn multiplier_below_one_does_not_shrink() {
        let mut backoff = ExponentialBackoff::new(config(50, 0.5, 1_000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
    }

    #[test]
    fn zero_initial_delay_still_progresses() {
        let mut backoff = ExponentialBackoff::new(config(0, 2.0, 100));
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
    }
}
