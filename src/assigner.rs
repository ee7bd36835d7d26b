//! Key-to-partition routing.
//!
//! Keyed records hash deterministically so a key always lands on the same
//! partition of a topic, which is the property consumer affinity relies on.
//! Keyless records round-robin per topic; that sequence is a load-balancing
//! policy, not a correctness invariant.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::types::PartitionIndex;

/// Routes records to partitions.
pub struct PartitionAssigner {
    /// Per-topic cursor for keyless round-robin.
    round_robin: DashMap<String, AtomicUsize>,
}

impl PartitionAssigner {
    pub fn new() -> Self {
        Self {
            round_robin: DashMap::new(),
        }
    }

    /// Pick a partition in `[0, partition_count)` for a record.
    ///
    /// `partition_count` must be positive (topics always have at least one
    /// partition).
    pub fn assign(
        &self,
        topic: &str,
        partition_count: i32,
        key: Option<&[u8]>,
    ) -> PartitionIndex {
        debug_assert!(partition_count > 0);
        let index = match key {
            Some(key) => (hash_key(key) % partition_count as u64) as i32,
            None => {
                let cursor = self
                    .round_robin
                    .entry(topic.to_string())
                    .or_insert_with(|| AtomicUsize::new(0));
                (cursor.fetch_add(1, Ordering::Relaxed) % partition_count as usize) as i32
            }
        };
        PartitionIndex::new(index)
    }
}

impl Default for PartitionAssigner {
    fn default() -> Self {
        Self::new()
    }
}

// DefaultHasher::new() starts from a fixed state, so a key maps to the same
// partition for the life of the process, which is all keyed affinity needs.
fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
