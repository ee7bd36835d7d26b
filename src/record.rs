//! Records and their offset-addressed form.

use bytes::Bytes;

use crate::constants::RECORD_OVERHEAD_BYTES;
use crate::types::Offset;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// An immutable message payload.
///
/// A record is owned exclusively by the partition log that holds it; the
/// cheap-to-clone [`Bytes`] payloads let fetch hand copies to consumers
/// without duplicating the bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Option<Bytes>,
    value: Bytes,
    timestamp_ms: i64,
}

impl Record {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(key: Option<Bytes>, value: Bytes) -> Self {
        Self {
            key,
            value,
            timestamp_ms: now_ms(),
        }
    }

    /// Create a record with an explicit timestamp.
    pub fn with_timestamp(key: Option<Bytes>, value: Bytes, timestamp_ms: i64) -> Self {
        Self {
            key,
            value,
            timestamp_ms,
        }
    }

    /// The partitioning key, if any.
    #[inline]
    pub fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    /// The payload.
    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Milliseconds since the Unix epoch at append time.
    #[inline]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Bytes this record charges against a partition's budget: payload plus
    /// fixed bookkeeping overhead.
    pub fn approximate_size(&self) -> usize {
        self.key.as_ref().map(|k| k.len()).unwrap_or(0) + self.value.len() + RECORD_OVERHEAD_BYTES
    }
}

/// A record paired with the offset it was assigned at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWithOffset {
    /// Position within the partition's append order.
    pub offset: Offset,
    /// The record itself.
    pub record: Record,
}

impl RecordWithOffset {
    pub fn new(offset: Offset, record: Record) -> Self {
        Self { offset, record }
    }
}
