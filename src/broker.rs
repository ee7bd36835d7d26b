//! The broker core: topics, produce, and long-poll fetch.
//!
//! All topic and partition state lives here. Appends to one partition are
//! serialized behind that partition's mutex (offset uniqueness); different
//! partitions never share a lock, so cross-partition traffic runs fully in
//! parallel. Each partition publishes its high-water mark on a watch
//! channel, which is what lets fetch suspend until data arrives instead of
//! busy-polling.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::assigner::PartitionAssigner;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::record::{Record, RecordWithOffset};
use crate::storage::PartitionLog;
use crate::types::{Offset, PartitionIndex, TopicPartition};

/// One partition: its log plus the high-water-mark watch used by fetch.
struct Partition {
    log: Mutex<PartitionLog>,
    hwm: watch::Sender<i64>,
}

impl Partition {
    fn new(tp: TopicPartition, max_bytes: usize) -> Self {
        let (hwm, _) = watch::channel(0);
        Self {
            log: Mutex::new(PartitionLog::new(tp, max_bytes)),
            hwm,
        }
    }
}

/// A topic with its fixed set of partitions.
///
/// The partition count is immutable after creation.
struct Topic {
    partitions: Vec<Partition>,
}

impl Topic {
    fn new(name: &str, partition_count: i32, max_partition_bytes: usize) -> Self {
        let partitions = (0..partition_count)
            .map(|i| Partition::new(TopicPartition::new(name, i), max_partition_bytes))
            .collect();
        Self { partitions }
    }

    fn partition_count(&self) -> i32 {
        self.partitions.len() as i32
    }
}

/// Owns all topics and partitions; accepts produce and serves fetch.
pub struct BrokerCore {
    config: BrokerConfig,
    topics: DashMap<String, Arc<Topic>>,
    assigner: PartitionAssigner,
}

impl BrokerCore {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            topics: DashMap::new(),
            assigner: PartitionAssigner::new(),
        }
    }

    /// The configuration this broker was built with.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Declare a topic with an explicit partition count.
    ///
    /// Idempotent when the count matches an existing declaration; a
    /// conflicting count is a configuration error because partition counts
    /// are immutable once a topic exists.
    pub fn create_topic(&self, name: &str, partition_count: i32) -> Result<()> {
        if partition_count < 1 {
            return Err(BrokerError::Config(format!(
                "topic {name}: partition count must be >= 1, got {partition_count}"
            )));
        }
        match self.topics.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let current = existing.get().partition_count();
                if current == partition_count {
                    Ok(())
                } else {
                    Err(BrokerError::Config(format!(
                        "topic {name} already exists with {current} partitions"
                    )))
                }
            }
            Entry::Vacant(slot) => {
                info!(topic = name, partitions = partition_count, "created topic");
                slot.insert(Arc::new(Topic::new(
                    name,
                    partition_count,
                    self.config.max_partition_bytes,
                )));
                Ok(())
            }
        }
    }

    /// Resolve a topic, creating it with the default partition count on
    /// first reference. Shared with the coordinator, which resolves
    /// subscriptions the same way produce does.
    pub(crate) fn ensure_topic(&self, name: &str) -> i32 {
        let entry = self.topics.entry(name.to_string()).or_insert_with(|| {
            info!(
                topic = name,
                partitions = self.config.default_partition_count,
                "lazily created topic"
            );
            Arc::new(Topic::new(
                name,
                self.config.default_partition_count,
                self.config.max_partition_bytes,
            ))
        });
        entry.value().partition_count()
    }

    /// Append a record, returning the partition and offset it landed on.
    ///
    /// Resolves (or lazily creates) the topic, routes through the assigner,
    /// and appends under the partition's lock. Safe under any number of
    /// concurrent producers.
    pub async fn produce(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> Result<(PartitionIndex, Offset)> {
        self.ensure_topic(topic);
        let handle = {
            let entry = self.topics.get(topic).expect("topic ensured above");
            Arc::clone(entry.value())
        };

        let index = self
            .assigner
            .assign(topic, handle.partition_count(), key.as_deref());
        let partition = &handle.partitions[index.value() as usize];

        let record = Record::new(key, value);
        let mut log = partition.log.lock().await;
        let offset = log.append(record)?;
        // Publish the new high-water mark while still holding the log lock
        // so waiters observe marks in append order.
        partition.hwm.send_replace(log.high_water_mark().value());
        drop(log);

        debug!(topic, partition = %index, offset = %offset, "produced record");
        Ok((index, offset))
    }

    /// Fetch records at or after `from`, waiting up to `max_wait` for data.
    ///
    /// The long-poll contract: if nothing is available the call suspends on
    /// the partition's high-water-mark watch until either a record lands or
    /// `max_wait` elapses. Expiry returns an empty vec, never an error,
    /// and dropping the returned future cancels the wait. Records come back
    /// in ascending offset order.
    ///
    /// A non-existent topic or out-of-range partition index yields an empty
    /// vec (only produce creates topics). A negative `from`, or one beyond
    /// the high-water mark, is an [`BrokerError::OffsetOutOfRange`]; a
    /// fetch exactly at the mark waits like any other caught-up consumer.
    pub async fn fetch(
        &self,
        topic: &str,
        partition: PartitionIndex,
        from: Offset,
        max_wait: Duration,
        max_records: usize,
    ) -> Result<Vec<RecordWithOffset>> {
        let Some(handle) = self.topics.get(topic).map(|t| Arc::clone(t.value())) else {
            return Ok(Vec::new());
        };
        let Some(part) = handle
            .partitions
            .get(usize::try_from(partition.value()).unwrap_or(usize::MAX))
        else {
            return Ok(Vec::new());
        };

        let mut hwm_rx = part.hwm.subscribe();
        {
            let log = part.log.lock().await;
            let hwm = log.high_water_mark();
            if !from.is_valid() || from > hwm {
                return Err(BrokerError::OffsetOutOfRange {
                    topic: topic.to_string(),
                    partition: partition.value(),
                    offset: from.value(),
                    latest: hwm.value(),
                });
            }
            let records = log.read(from, max_records);
            if !records.is_empty() {
                return Ok(records);
            }
        }

        // Nothing at or after `from` yet: wait for the high-water mark to
        // pass it. `wait_for` checks the current value first, so a record
        // appended between the read above and this await is not missed.
        let wake = tokio::time::timeout(max_wait, hwm_rx.wait_for(|hwm| *hwm > from.value())).await;
        match wake {
            Ok(Ok(_)) => {
                let log = part.log.lock().await;
                Ok(log.read(from, max_records))
            }
            // Channel closed (partition dropped) or deadline passed: an
            // empty result, not an error.
            Ok(Err(_)) | Err(_) => Ok(Vec::new()),
        }
    }

    /// The high-water mark of a partition, if the topic and partition exist.
    pub fn high_water_mark(&self, topic: &str, partition: PartitionIndex) -> Option<Offset> {
        let handle = self.topics.get(topic)?;
        let part = handle
            .partitions
            .get(usize::try_from(partition.value()).ok()?)?;
        Some(Offset::new(*part.hwm.borrow()))
    }

    /// The earliest available offset of a partition. Zero for every
    /// existing partition while retention is a non-goal.
    pub fn earliest_offset(&self, topic: &str, partition: PartitionIndex) -> Option<Offset> {
        let handle = self.topics.get(topic)?;
        handle
            .partitions
            .get(usize::try_from(partition.value()).ok()?)?;
        Some(Offset::ZERO)
    }

    /// The partition count of an existing topic.
    pub fn partition_count(&self, topic: &str) -> Option<i32> {
        self.topics.get(topic).map(|t| t.partition_count())
    }

    /// Names of all topics, in no particular order.
    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }
}
