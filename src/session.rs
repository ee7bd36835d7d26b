//! Producer and consumer session facades.
//!
//! Sessions are the thin request/response layer clients use to talk to the
//! broker core and the group coordinator. They are explicit objects (no
//! process-wide producer or consumer), and a consumer leaves its group when
//! dropped, so an abandoned session never pins a partition assignment.
//!
//! Delivery semantics are at-least-once and deliberately so: a producer
//! that never saw its `(partition, offset)` confirmation may retry and the
//! core will NOT deduplicate; a consumer that dies between fetch and commit
//! is redelivered from its last committed offset after rejoin.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::broker::BrokerCore;
use crate::coordinator::GroupCoordinator;
use crate::error::{BrokerError, Result};
use crate::record::{Record, RecordWithOffset};
use crate::retry;
use crate::types::{GenerationId, Offset, PartitionIndex, SessionId, TopicPartition};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

// Zero-padded so lexicographic session-id order matches creation order,
// which keeps "remainder to lowest ids" assignments predictable.
fn next_session_id(kind: &str) -> SessionId {
    let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    SessionId::new(format!("{kind}-{n:06}"))
}

/// Where a fresh consumer starts on a partition with no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    /// Start from the first available record.
    #[default]
    Earliest,
    /// Start from the high-water mark; only records produced after the
    /// join are delivered.
    Latest,
}

/// Confirmation of a successful produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: PartitionIndex,
    pub offset: Offset,
}

/// A record delivered to a consumer.
#[derive(Debug, Clone)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: PartitionIndex,
    pub offset: Offset,
    pub record: Record,
}

/// A producer connection handle.
pub struct ProducerSession {
    id: SessionId,
    broker: Arc<BrokerCore>,
}

impl ProducerSession {
    pub fn new(broker: Arc<BrokerCore>) -> Self {
        Self {
            id: next_session_id("producer"),
            broker,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Send one record.
    ///
    /// At-least-once: if this call errors or the caller never observes the
    /// returned metadata, the record may or may not have landed; a retry
    /// can duplicate it, and duplicates are NOT suppressed.
    pub async fn send(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> Result<RecordMetadata> {
        let (partition, offset) = self.broker.produce(topic, key, value).await?;
        Ok(RecordMetadata {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    /// [`send`](ProducerSession::send) with backoff on retryable errors
    /// (a full partition, chiefly). Non-retryable errors propagate
    /// immediately.
    pub async fn send_retrying(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> Result<RecordMetadata> {
        (|| self.send(topic, key.clone(), value.clone()))
            .retry(retry::producer_policy())
            .when(|e: &BrokerError| e.is_retryable())
            .await
    }
}

/// A consumer-group member.
///
/// The working loop is poll, process, commit:
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use samsa::prelude::*;
/// # async fn run(broker: Arc<BrokerCore>, coordinator: Arc<GroupCoordinator>) -> Result<()> {
/// let mut consumer = ConsumerSession::join(broker, coordinator, "billing", &["orders"])?;
/// loop {
///     let records = consumer.poll(Duration::from_millis(500)).await?;
///     for record in &records {
///         // application processing
///     }
///     consumer.commit()?;
/// }
/// # }
/// ```
///
/// Positions advance in memory as records are polled; only `commit` makes
/// them durable to the group. Dropping the session without committing
/// redelivers everything since the last commit to the next assignee.
pub struct ConsumerSession {
    id: SessionId,
    broker: Arc<BrokerCore>,
    coordinator: Arc<GroupCoordinator>,
    group: String,
    generation: GenerationId,
    assignment: Vec<TopicPartition>,
    /// Next offset to fetch per owned partition; also what `commit` sends.
    positions: HashMap<TopicPartition, Offset>,
    reset: OffsetReset,
    left: bool,
}

impl ConsumerSession {
    /// Join a consumer group subscribed to `topics`.
    pub fn join(
        broker: Arc<BrokerCore>,
        coordinator: Arc<GroupCoordinator>,
        group: &str,
        topics: &[&str],
    ) -> Result<Self> {
        let id = next_session_id("consumer");
        let subscriptions: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        let membership = coordinator.join(group, &id, &subscriptions)?;
        Ok(Self {
            id,
            broker,
            coordinator,
            group: group.to_string(),
            generation: membership.generation,
            assignment: membership.assignment,
            positions: HashMap::new(),
            reset: OffsetReset::default(),
            left: false,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Partitions this member currently owns.
    pub fn assignment(&self) -> &[TopicPartition] {
        &self.assignment
    }

    /// Where to start on partitions with no committed offset.
    pub fn set_offset_reset(&mut self, reset: OffsetReset) {
        self.reset = reset;
    }

    /// Fetch the next batch of records, waiting up to `max_wait`.
    ///
    /// Returns an empty vec, not an error, when nothing arrives in time.
    /// If another member changed the group, the session re-syncs its
    /// assignment first; a rebalance racing the poll itself surfaces as a
    /// retryable [`BrokerError::RebalanceInProgress`].
    pub async fn poll(&mut self, max_wait: Duration) -> Result<Vec<ConsumedRecord>> {
        if self.coordinator.generation(&self.group) != self.generation {
            self.resync()?;
        }
        if self.assignment.is_empty() {
            // Nothing owned (more members than partitions). Honor the poll
            // bound instead of spinning.
            tokio::time::sleep(max_wait).await;
            return Ok(Vec::new());
        }

        self.ensure_positions();
        for tp in &self.assignment {
            self.coordinator
                .check_fetch_authorized(&self.group, &self.id, tp)?;
        }

        let max_records = self.broker.config().max_fetch_records;

        // First a non-blocking sweep over owned partitions.
        let mut out = Vec::new();
        for tp in self.assignment.clone() {
            let remaining = max_records - out.len();
            if remaining == 0 {
                break;
            }
            let position = self.positions[&tp];
            let fetched = self
                .broker
                .fetch(tp.topic(), tp.partition(), position, Duration::ZERO, remaining)
                .await;
            match fetched {
                Ok(fetched) => self.absorb(&tp, fetched, &mut out),
                Err(BrokerError::OffsetOutOfRange { .. }) => {
                    warn!(tp = %tp, "position fell outside the log; resetting");
                    self.reset_position(&tp);
                }
                Err(e) => return Err(e),
            }
        }
        if !out.is_empty() {
            return Ok(out);
        }

        // Nothing ready: long-poll every owned partition concurrently and
        // take the first batch that shows up. Aborting the losers cancels
        // their waits.
        let mut waiters = JoinSet::new();
        for tp in self.assignment.clone() {
            let broker = self.broker.clone();
            let position = self.positions[&tp];
            waiters.spawn(async move {
                let fetched = broker
                    .fetch(tp.topic(), tp.partition(), position, max_wait, max_records)
                    .await;
                (tp, fetched)
            });
        }

        while let Some(joined) = waiters.join_next().await {
            let Ok((tp, fetched)) = joined else {
                continue; // aborted sibling
            };
            match fetched {
                Ok(fetched) if !fetched.is_empty() => {
                    waiters.abort_all();
                    self.absorb(&tp, fetched, &mut out);
                    return Ok(out);
                }
                Ok(_) => {}
                Err(BrokerError::OffsetOutOfRange { .. }) => {
                    warn!(tp = %tp, "position fell outside the log; resetting");
                    self.reset_position(&tp);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Vec::new())
    }

    /// Commit the session's current positions to the group.
    ///
    /// The committed offset for each partition is the next offset to read,
    /// i.e. one past the last polled record. A position trailing the
    /// group's committed offset (possible after a position reset) is
    /// skipped: the group has already progressed past it and committed
    /// offsets only move forward.
    pub fn commit(&self) -> Result<()> {
        for (tp, &position) in &self.positions {
            match self.coordinator.commit(&self.group, &self.id, tp, position) {
                Ok(()) => {}
                Err(BrokerError::OffsetOutOfRange { latest, .. }) => {
                    debug!(tp = %tp, position = %position, committed = latest, "skipping regressive commit");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// [`commit`](ConsumerSession::commit) that rides out a rebalance:
    /// on `RebalanceInProgress` it re-syncs the assignment, backs off, and
    /// tries again until the policy's budget runs out.
    pub async fn commit_retrying(&mut self) -> Result<()> {
        let mut backoff = retry::commit_policy().build();
        loop {
            let err = match self.commit() {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if !matches!(err, BrokerError::RebalanceInProgress { .. }) {
                return Err(err);
            }
            self.resync()?;
            match backoff.next() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => return Err(err),
            }
        }
    }

    /// Leave the group explicitly. Preferred over drop when the caller
    /// wants the rebalance to have happened before continuing.
    pub fn leave(mut self) -> Result<()> {
        self.left = true;
        self.coordinator.leave(&self.group, &self.id)
    }

    fn resync(&mut self) -> Result<()> {
        let membership = self.coordinator.sync(&self.group, &self.id)?;
        debug!(
            group = %self.group,
            session = %self.id,
            generation = %membership.generation,
            partitions = membership.assignment.len(),
            "re-synced assignment"
        );
        self.generation = membership.generation;
        // Forget positions for revoked partitions; newly acquired ones
        // resolve from the committed offset on next poll.
        self.positions
            .retain(|tp, _| membership.assignment.contains(tp));
        self.assignment = membership.assignment;
        Ok(())
    }

    fn ensure_positions(&mut self) {
        for tp in &self.assignment.clone() {
            if self.positions.contains_key(tp) {
                continue;
            }
            match self.coordinator.fetch_committed(&self.group, tp) {
                Some(committed) => {
                    self.positions.insert(tp.clone(), committed);
                }
                None => self.reset_position(tp),
            }
        }
    }

    /// Point a partition's position at the spot the reset policy names.
    ///
    /// Also the escape hatch for a committed offset that no longer falls
    /// inside the log, possible after a restart, since records themselves
    /// are not persisted. The broker reports that as out-of-range and the
    /// session, being the offset's owner, resets it rather than failing
    /// the poll loop forever.
    fn reset_position(&mut self, tp: &TopicPartition) {
        let start = match self.reset {
            OffsetReset::Earliest => self
                .broker
                .earliest_offset(tp.topic(), tp.partition())
                .unwrap_or(Offset::ZERO),
            OffsetReset::Latest => self
                .broker
                .high_water_mark(tp.topic(), tp.partition())
                .unwrap_or(Offset::ZERO),
        };
        debug!(tp = %tp, position = %start, "position reset per offset-reset policy");
        self.positions.insert(tp.clone(), start);
    }

    fn absorb(
        &mut self,
        tp: &TopicPartition,
        fetched: Vec<RecordWithOffset>,
        out: &mut Vec<ConsumedRecord>,
    ) {
        if let Some(last) = fetched.last() {
            self.positions.insert(tp.clone(), last.offset.advance(1));
        }
        out.extend(fetched.into_iter().map(|r| ConsumedRecord {
            topic: tp.topic().to_string(),
            partition: tp.partition(),
            offset: r.offset,
            record: r.record,
        }));
    }
}

impl Drop for ConsumerSession {
    fn drop(&mut self) {
        if !self.left {
            // A dead session must not pin its partitions; the group
            // rebalances as if it had left cleanly. Uncommitted progress is
            // intentionally lost: that is what at-least-once redelivery is.
            if let Err(e) = self.coordinator.leave(&self.group, &self.id) {
                warn!(group = %self.group, session = %self.id, error = %e, "leave on drop failed");
            }
        }
    }
}
