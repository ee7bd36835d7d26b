//! Append-only per-partition record storage.
//!
//! A [`PartitionLog`] is the single owner of a partition's records. Offsets
//! are assigned at append time, zero-based, contiguous, and never reused;
//! nothing is ever evicted (retention is an explicit non-goal), so the
//! record at offset `n` is always the `n`-th element of the backing vec.
//!
//! Callers serialize access per partition (the broker holds one async mutex
//! per log), which is what makes append atomic: no two producers can be
//! handed the same offset.

use crate::error::{BrokerError, Result};
use crate::record::{Record, RecordWithOffset};
use crate::types::{Offset, TopicPartition};

/// Append-only record log for one partition.
pub struct PartitionLog {
    tp: TopicPartition,
    records: Vec<Record>,
    size_bytes: usize,
    max_bytes: usize,
}

impl PartitionLog {
    /// Create an empty log with a byte budget.
    pub fn new(tp: TopicPartition, max_bytes: usize) -> Self {
        Self {
            tp,
            records: Vec::new(),
            size_bytes: 0,
            max_bytes,
        }
    }

    /// Append a record, returning its assigned offset.
    ///
    /// Fails with [`BrokerError::ResourceExhausted`] once the byte budget is
    /// spent; the record is not stored and the high-water mark is unchanged.
    pub fn append(&mut self, record: Record) -> Result<Offset> {
        let size = record.approximate_size();
        if self.size_bytes + size > self.max_bytes {
            return Err(BrokerError::ResourceExhausted {
                topic: self.tp.topic().to_string(),
                partition: self.tp.partition().value(),
                limit_bytes: self.max_bytes,
            });
        }
        let offset = Offset::new(self.records.len() as i64);
        self.records.push(record);
        self.size_bytes += size;
        Ok(offset)
    }

    /// Read up to `max_records` starting at `from`, in ascending offset
    /// order. Reading at or past the high-water mark returns an empty vec,
    /// never an error. Callers validate `from >= 0`.
    pub fn read(&self, from: Offset, max_records: usize) -> Vec<RecordWithOffset> {
        let start = from.value().max(0) as usize;
        if start >= self.records.len() {
            return Vec::new();
        }
        self.records[start..]
            .iter()
            .take(max_records)
            .enumerate()
            .map(|(i, record)| {
                RecordWithOffset::new(Offset::new((start + i) as i64), record.clone())
            })
            .collect()
    }

    /// The offset one past the last appended record.
    #[inline]
    pub fn high_water_mark(&self) -> Offset {
        Offset::new(self.records.len() as i64)
    }

    /// The first available offset. Always zero while retention is a
    /// non-goal; kept so callers don't bake that in.
    #[inline]
    pub fn earliest_offset(&self) -> Offset {
        Offset::ZERO
    }

    /// Number of stored records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes currently charged against the budget.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
