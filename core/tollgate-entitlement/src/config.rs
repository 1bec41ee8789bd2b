//! Service configuration.

use crate::backoff::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the entitlement service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// Store key prefix holding the entitlement record.
    pub key_prefix: String,
    /// How often a writer re-checks the cache while waiting for its write (ms).
    pub poll_interval_ms: u64,
    /// Upper bound on that wait (ms). `None` waits forever.
    pub convergence_timeout_ms: Option<u64>,
    /// Pause after local convergence so other replicas can catch up (ms).
    pub grace_period_ms: u64,
    /// Retry schedule for the watch loop.
    pub watch_backoff: BackoffConfig,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            key_prefix: "/enterprise".to_string(),
            poll_interval_ms: 1_000,
            convergence_timeout_ms: Some(60_000),
            grace_period_ms: 1_000,
            watch_backoff: BackoffConfig::default(),
        }
    }
}

impl EntitlementConfig {
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub(crate) fn convergence_timeout(&self) -> Option<Duration> {
        self.convergence_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EntitlementConfig =
            serde_json::from_str(r#"{"grace_period_ms": 0, "watch_backoff": {"max_ms": 5000}}"#)
                .unwrap();
        assert_eq!(config.grace_period_ms, 0);
        assert_eq!(config.key_prefix, "/enterprise");
        assert_eq!(config.watch_backoff.max_ms, 5_000);
        assert_eq!(config.watch_backoff.initial_ms, 500);
    }

    #[test]
    fn null_timeout_means_unbounded() {
        let config: EntitlementConfig =
            serde_json::from_str(r#"{"convergence_timeout_ms": null}"#).unwrap();
        assert_eq!(config.convergence_timeout(), None);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = EntitlementConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
