//! Sync layer configuration.

use std::time::Duration;

use serde::Deserialize;

pub use gallerysync_core::cache::{DEFAULT_CACHE_TTL, DEFAULT_SWEEP_INTERVAL};

/// Delay before the first reconnect attempt.
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Consecutive failed attempts after which reconnecting stops.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt; doubled after every failure.
    #[serde(rename = "initialDelayMs", with = "duration_ms")]
    pub initial_delay: Duration,

    /// Failures tolerated before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy.
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(INITIAL_RECONNECT_DELAY, MAX_RECONNECT_ATTEMPTS)
    }
}

/// Listener manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// TTL for cached snapshots written without an explicit one.
    #[serde(rename = "defaultCacheTtlMs", with = "duration_ms")]
    pub default_cache_ttl: Duration,

    /// Interval between expired-entry sweeps. None disables the sweeper.
    #[serde(rename = "sweepIntervalMs", with = "option_duration_ms")]
    pub sweep_interval: Option<Duration>,

    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
}

impl SyncConfig {
    /// Configuration with the default TTL, sweep interval, and backoff.
    pub fn new() -> Self {
        Self {
            default_cache_ttl: DEFAULT_CACHE_TTL,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Parse a configuration from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the default cache TTL.
    pub fn with_default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_cache_ttl = ttl;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Disable the background sweeper.
    pub fn without_sweeper(mut self) -> Self {
        self.sweep_interval = None;
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.default_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::new()
            .with_default_cache_ttl(Duration::from_secs(30))
            .without_sweeper()
            .with_reconnect_policy(ReconnectPolicy::new(Duration::from_millis(250), 3));

        assert_eq!(config.default_cache_ttl, Duration::from_secs(30));
        assert!(config.sweep_interval.is_none());
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 3);
    }

    #[test]
    fn test_config_from_json() {
        let config = SyncConfig::from_json(
            r#"{"defaultCacheTtlMs": 1000, "reconnect": {"maxAttempts": 8}}"#,
        )
        .unwrap();

        assert_eq!(config.default_cache_ttl, Duration::from_secs(1));
        assert_eq!(config.sweep_interval, Some(DEFAULT_SWEEP_INTERVAL));
        assert_eq!(config.reconnect.initial_delay, INITIAL_RECONNECT_DELAY);
        assert_eq!(config.reconnect.max_attempts, 8);
    }

    #[test]
    fn test_config_from_json_disables_sweeper() {
        let config = SyncConfig::from_json(r#"{"sweepIntervalMs": null}"#).unwrap();
        assert!(config.sweep_interval.is_none());
    }
}
