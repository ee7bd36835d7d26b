//! Type-safe wrappers for queue primitives.
//!
//! These newtypes prevent mixing up integer values that share a
//! representation but carry different meanings (a record offset is not a
//! partition index is not a generation).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a record within a partition's append order.
///
/// Offsets are zero-based, strictly increasing, and contiguous: the offset
/// one past the last appended record is the partition's high-water mark.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Offset(pub i64);

impl Offset {
    /// The first offset of every partition.
    pub const ZERO: Self = Offset(0);

    /// Create a new offset from a raw value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Offset(value)
    }

    /// Get the raw i64 value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Check if this is a valid (non-negative) offset.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// The offset `n` positions later in the append order.
    #[inline]
    pub const fn advance(self, n: i64) -> Self {
        Offset(self.0 + n)
    }
}

impl From<i64> for Offset {
    fn from(value: i64) -> Self {
        Offset(value)
    }
}

impl From<Offset> for i64 {
    fn from(offset: Offset) -> Self {
        offset.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A partition index within a topic.
///
/// Indices run from zero to the topic's fixed partition count, exclusive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PartitionIndex(pub i32);

impl PartitionIndex {
    /// Create a new partition index from a raw value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        PartitionIndex(value)
    }

    /// Get the raw i32 value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Check if this is a valid (non-negative) partition index.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl From<i32> for PartitionIndex {
    fn from(value: i32) -> Self {
        PartitionIndex(value)
    }
}

impl From<PartitionIndex> for i32 {
    fn from(idx: PartitionIndex) -> Self {
        idx.0
    }
}

impl fmt::Display for PartitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A consumer group generation.
///
/// The generation increments on every membership change; a member whose view
/// of the group is from an older generation must re-sync before it may fetch
/// or commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GenerationId(pub i32);

impl GenerationId {
    /// Generation of a group that has never rebalanced.
    pub const INITIAL: Self = GenerationId(0);

    /// Create a new generation ID from a raw value.
    #[inline]
    pub const fn new(value: i32) -> Self {
        GenerationId(value)
    }

    /// Get the raw i32 value.
    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// The next generation, skipping back to 1 instead of overflowing.
    #[inline]
    pub fn next(self) -> Self {
        if self.0 == i32::MAX {
            GenerationId(1)
        } else {
            GenerationId(self.0 + 1)
        }
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ephemeral producer or consumer connection handle.
///
/// Session ids order members within a consumer group: when a partition count
/// does not divide evenly, the remainder goes to the lexicographically
/// lowest ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A topic-partition pair.
///
/// Replaces the `(String, i32)` tuples that otherwise spread through
/// assignment and offset bookkeeping.
///
/// # Usage
///
/// ```
/// use samsa::types::TopicPartition;
///
/// let tp = TopicPartition::new("orders", 0);
/// assert_eq!(tp.to_string(), "orders-0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    topic: String,
    partition: PartitionIndex,
}

impl TopicPartition {
    /// Create a new topic-partition pair.
    #[inline]
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition: PartitionIndex::new(partition),
        }
    }

    /// The topic name.
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The partition index.
    #[inline]
    pub fn partition(&self) -> PartitionIndex {
        self.partition
    }
}

impl From<(String, i32)> for TopicPartition {
    fn from((topic, partition): (String, i32)) -> Self {
        TopicPartition::new(topic, partition)
    }
}

impl From<(&str, i32)> for TopicPartition {
    fn from((topic, partition): (&str, i32)) -> Self {
        TopicPartition::new(topic, partition)
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}
