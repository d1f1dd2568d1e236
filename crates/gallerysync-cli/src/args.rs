//! Command-line arguments.

use std::time::Duration;

use clap::Parser;

use gallerysync_client::config::{ReconnectPolicy, SyncConfig, MAX_RECONNECT_ATTEMPTS};

/// Command-line arguments for the demo driver.
#[derive(Parser, Debug)]
#[command(name = "gallerysync")]
#[command(version, about = "Drive the gallerysync listener manager against an in-memory store", long_about = None)]
pub struct Args {
    /// Default cache TTL in seconds.
    #[arg(long, default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Cache sweep interval in seconds. Set to 0 to disable the sweeper.
    #[arg(long, default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub reconnect_delay_ms: u64,

    /// Consecutive failed reconnects before giving up.
    #[arg(long, default_value_t = MAX_RECONNECT_ATTEMPTS)]
    pub max_reconnect_attempts: u32,

    /// How long the host stays offline during the demo, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub offline_ms: u64,

    /// How long the store stays unavailable during the demo, in milliseconds.
    #[arg(long, default_value_t = 1500)]
    pub outage_ms: u64,

    /// Print counters as JSON instead of Prometheus text.
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Convert command-line arguments to the manager configuration.
    pub fn into_config(self) -> SyncConfig {
        let config = SyncConfig::new()
            .with_default_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_reconnect_policy(ReconnectPolicy::new(
                Duration::from_millis(self.reconnect_delay_ms),
                self.max_reconnect_attempts,
            ));

        if self.sweep_interval_secs == 0 {
            config.without_sweeper()
        } else {
            config.with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
        }
    }

    /// Durations of the simulated host and store outages.
    pub fn outages(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.offline_ms),
            Duration::from_millis(self.outage_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["gallerysync"]);
        assert_eq!(
            args.outages(),
            (Duration::from_millis(500), Duration::from_millis(1500))
        );
        assert!(!args.json);

        let config = args.into_config();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "gallerysync",
            "--cache-ttl-secs",
            "30",
            "--sweep-interval-secs",
            "0",
            "--reconnect-delay-ms",
            "250",
            "--max-reconnect-attempts",
            "3",
        ]);
        let config = args.into_config();

        assert_eq!(config.default_cache_ttl, Duration::from_secs(30));
        assert!(config.sweep_interval.is_none());
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::new(Duration::from_millis(250), 3)
        );
    }
}
