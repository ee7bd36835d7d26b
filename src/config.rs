//! Broker configuration.
//!
//! ```rust
//! use samsa::config::BrokerConfig;
//!
//! let config = BrokerConfig::default()
//!     .with_default_partition_count(8)
//!     .with_max_partition_bytes(16 * 1024 * 1024);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::constants::{
    DEFAULT_FETCH_MAX_WAIT_MS, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_FETCH_RECORDS,
    DEFAULT_MAX_PARTITION_BYTES, DEFAULT_NUM_PARTITIONS,
};
use crate::error::{BrokerError, Result};

/// Tunables for the broker core and its sessions.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Partition count for lazily created topics.
    pub default_partition_count: i32,

    /// Per-partition byte budget; appends past it fail with
    /// `ResourceExhausted`.
    pub max_partition_bytes: usize,

    /// Default bound for a fetch's long-poll wait.
    pub fetch_max_wait: Duration,

    /// Maximum records returned by a single fetch.
    pub max_fetch_records: usize,

    /// Interval between committed-offset flushes to the persistence adapter.
    /// Larger values trade durability for throughput.
    pub flush_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_partition_count: DEFAULT_NUM_PARTITIONS,
            max_partition_bytes: DEFAULT_MAX_PARTITION_BYTES,
            fetch_max_wait: Duration::from_millis(DEFAULT_FETCH_MAX_WAIT_MS),
            max_fetch_records: DEFAULT_MAX_FETCH_RECORDS,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}

impl BrokerConfig {
    /// Override the partition count for lazily created topics.
    pub fn with_default_partition_count(mut self, count: i32) -> Self {
        self.default_partition_count = count;
        self
    }

    /// Override the per-partition byte budget.
    pub fn with_max_partition_bytes(mut self, bytes: usize) -> Self {
        self.max_partition_bytes = bytes;
        self
    }

    /// Override the default fetch long-poll bound.
    pub fn with_fetch_max_wait(mut self, wait: Duration) -> Self {
        self.fetch_max_wait = wait;
        self
    }

    /// Override the per-fetch record cap.
    pub fn with_max_fetch_records(mut self, max: usize) -> Self {
        self.max_fetch_records = max;
        self
    }

    /// Override the committed-offset flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Read overrides from environment variables, falling back to defaults:
    ///
    /// - `SAMSA_DEFAULT_PARTITIONS`
    /// - `SAMSA_MAX_PARTITION_BYTES`
    /// - `SAMSA_FETCH_MAX_WAIT_MS`
    /// - `SAMSA_MAX_FETCH_RECORDS`
    /// - `SAMSA_FLUSH_INTERVAL_MS`
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        let defaults = Self::default();
        Self {
            default_partition_count: parsed("SAMSA_DEFAULT_PARTITIONS")
                .unwrap_or(defaults.default_partition_count),
            max_partition_bytes: parsed("SAMSA_MAX_PARTITION_BYTES")
                .unwrap_or(defaults.max_partition_bytes),
            fetch_max_wait: parsed("SAMSA_FETCH_MAX_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_max_wait),
            max_fetch_records: parsed("SAMSA_MAX_FETCH_RECORDS")
                .unwrap_or(defaults.max_fetch_records),
            flush_interval: parsed("SAMSA_FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
        }
    }

    /// Reject configurations the core cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.default_partition_count < 1 {
            return Err(BrokerError::Config(format!(
                "default_partition_count must be >= 1, got {}",
                self.default_partition_count
            )));
        }
        if self.max_partition_bytes == 0 {
            return Err(BrokerError::Config(
                "max_partition_bytes must be non-zero".to_string(),
            ));
        }
        if self.max_fetch_records == 0 {
            return Err(BrokerError::Config(
                "max_fetch_records must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BrokerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builders_override_fields() {
        let config = BrokerConfig::default()
            .with_default_partition_count(2)
            .with_max_partition_bytes(1024)
            .with_fetch_max_wait(Duration::from_millis(50))
            .with_max_fetch_records(10)
            .with_flush_interval(Duration::from_secs(1));
        assert_eq!(config.default_partition_count, 2);
        assert_eq!(config.max_partition_bytes, 1024);
        assert_eq!(config.fetch_max_wait, Duration::from_millis(50));
        assert_eq!(config.max_fetch_records, 10);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_partitions() {
        let config = BrokerConfig::default().with_default_partition_count(0);
        assert!(matches!(config.validate(), Err(BrokerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = BrokerConfig::default().with_max_partition_bytes(0);
        assert!(config.validate().is_err());
    }
}
