//! Centralized configuration defaults.
//!
//! Consolidating the magic numbers here keeps them documented and makes it
//! obvious which knobs [`crate::config::BrokerConfig`] exposes.

/// Default number of partitions for lazily created topics.
///
/// Topics referenced by a produce (or a group subscription) before any
/// explicit declaration get this many partitions. Four gives keyed streams
/// some spread without inflating rebalance work in small deployments.
pub const DEFAULT_NUM_PARTITIONS: i32 = 4;

/// Default per-partition byte budget (64 MB).
///
/// Appends beyond this budget fail with a resource-exhausted error; records
/// are never evicted or silently dropped. The budget is per partition, so
/// one full partition never blocks its siblings.
pub const DEFAULT_MAX_PARTITION_BYTES: usize = 64 * 1024 * 1024;

/// Default bound on a fetch's long-poll wait (500 ms).
///
/// A fetch that finds nothing at or after its offset suspends up to this
/// long before returning an empty batch. Expiry is a normal empty return,
/// never an error.
pub const DEFAULT_FETCH_MAX_WAIT_MS: u64 = 500;

/// Default maximum records returned by a single fetch.
pub const DEFAULT_MAX_FETCH_RECORDS: usize = 1024;

/// Default interval between committed-offset flushes to the persistence
/// adapter (100 ms).
///
/// Larger values trade durability for throughput: commits acknowledged in
/// memory may be lost on crash until the next flush.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

/// Fixed per-record bookkeeping charged against a partition's byte budget:
/// offset (8) + timestamp (8) + key/value length fields (8).
pub const RECORD_OVERHEAD_BYTES: usize = 24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        assert!(DEFAULT_NUM_PARTITIONS >= 1);
        assert!(DEFAULT_MAX_PARTITION_BYTES > RECORD_OVERHEAD_BYTES);
        assert!(DEFAULT_MAX_FETCH_RECORDS >= 1);
    }

    #[test]
    fn test_record_overhead_matches_breakdown() {
        let expected = 8  // offset
            + 8  // timestamp
            + 8; // key/value length fields
        assert_eq!(RECORD_OVERHEAD_BYTES, expected);
    }
}
