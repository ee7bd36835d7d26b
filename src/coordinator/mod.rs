//! Consumer group coordination: membership, rebalancing, committed offsets.
//!
//! Each group walks `Empty -> Rebalancing -> Stable`. A join or leave bumps
//! the group's generation, recomputes the range assignment over all current
//! members, and leaves every *other* member marked as needing to re-sync.
//! Until a member acknowledges the new generation via [`GroupCoordinator::sync`]
//! its commits and fetch authorizations fail fast with `RebalanceInProgress`:
//! rebalancing is a barrier that members retry through, never block on.
//!
//! Committed offsets advance monotonically, only at the hand of the session
//! that owns the partition, and survive the group going `Empty`. When a
//! flush channel is attached every accepted commit is also forwarded to the
//! persistence adapter (see [`crate::persistence`]).
//!
//! Group state sits behind a plain `std::sync::Mutex`: every operation is a
//! short critical section with no await points, which also lets consumer
//! sessions leave their group from `Drop`.

mod assignment;
mod group;

pub use group::GroupState;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broker::BrokerCore;
use crate::error::{BrokerError, Result};
use crate::persistence::{OffsetCommit, PersistenceAdapter};
use crate::record::now_ms;
use crate::types::{GenerationId, Offset, SessionId, TopicPartition};

use assignment::assign_ranges;
use group::{Group, Member};

/// What a member gets back from a join or sync: the generation it is now on
/// and the partitions it exclusively owns under that generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub generation: GenerationId,
    pub assignment: Vec<TopicPartition>,
}

/// Tracks group membership, assigns partitions, and persists committed
/// offsets.
pub struct GroupCoordinator {
    broker: Arc<BrokerCore>,
    groups: Mutex<HashMap<String, Group>>,
    flush_tx: Option<mpsc::UnboundedSender<OffsetCommit>>,
}

impl GroupCoordinator {
    pub fn new(broker: Arc<BrokerCore>) -> Self {
        Self {
            broker,
            groups: Mutex::new(HashMap::new()),
            flush_tx: None,
        }
    }

    /// Forward every accepted commit to an offset flusher (see
    /// [`crate::persistence::OffsetFlusher`]).
    pub fn with_flush_channel(mut self, tx: mpsc::UnboundedSender<OffsetCommit>) -> Self {
        self.flush_tx = Some(tx);
        self
    }

    /// Add a member and rebalance.
    ///
    /// Recomputes the range assignment over all current members, bumps the
    /// generation, and returns the caller's new assignment. The caller
    /// comes back already acknowledged; every other member must
    /// [`sync`](GroupCoordinator::sync) before it may fetch or commit again.
    pub fn join(&self, group_id: &str, session: &SessionId, topics: &[String]) -> Result<Membership> {
        let mut groups = self.groups.lock().expect("coordinator lock poisoned");
        let group = groups.entry(group_id.to_string()).or_default();

        group.members.insert(
            session.clone(),
            Member {
                topics: topics.to_vec(),
                synced_generation: GenerationId::INITIAL,
                joined_at_ms: now_ms(),
            },
        );
        Self::rebalance(&self.broker, group);

        // The joiner has seen the assignment it is about to receive.
        let generation = group.generation;
        if let Some(member) = group.members.get_mut(session) {
            member.synced_generation = generation;
        }
        Self::maybe_stabilize(group);

        info!(
            group = group_id,
            session = %session,
            generation = %group.generation,
            members = group.members.len(),
            "member joined group"
        );
        Ok(Membership {
            generation: group.generation,
            assignment: group.assignment_of(session),
        })
    }

    /// Acknowledge the current generation and fetch the member's assignment.
    ///
    /// The last member to acknowledge flips the group back to `Stable`.
    pub fn sync(&self, group_id: &str, session: &SessionId) -> Result<Membership> {
        let mut groups = self.groups.lock().expect("coordinator lock poisoned");
        let group = Self::known_group(&mut groups, group_id, session)?;
        let generation = group.generation;
        let member = group
            .members
            .get_mut(session)
            .expect("membership checked above");
        member.synced_generation = generation;
        Self::maybe_stabilize(group);

        debug!(group = group_id, session = %session, generation = %generation, "member synced");
        Ok(Membership {
            generation,
            assignment: group.assignment_of(session),
        })
    }

    /// Remove a member and rebalance the remainder.
    ///
    /// When the last member leaves the group transitions to `Empty`;
    /// committed offsets persist for the next join.
    pub fn leave(&self, group_id: &str, session: &SessionId) -> Result<()> {
        let mut groups = self.groups.lock().expect("coordinator lock poisoned");
        let group = Self::known_group(&mut groups, group_id, session)?;
        group.members.remove(session);

        Self::rebalance(&self.broker, group);
        Self::maybe_stabilize(group);

        info!(
            group = group_id,
            session = %session,
            remaining = group.members.len(),
            "member left group"
        );
        Ok(())
    }

    /// Advance a group's committed offset for one partition.
    ///
    /// Rejected unless the calling session has acknowledged the current
    /// generation and owns the partition under it; rejected if the offset
    /// would move backward. Equal re-commits are accepted as no-ops.
    pub fn commit(
        &self,
        group_id: &str,
        session: &SessionId,
        tp: &TopicPartition,
        offset: Offset,
    ) -> Result<()> {
        {
            let mut groups = self.groups.lock().expect("coordinator lock poisoned");
            let group = Self::known_group(&mut groups, group_id, session)?;
            Self::check_ownership(group, group_id, session, tp)?;

            if let Some(&committed) = group.committed.get(tp) {
                if offset < committed {
                    return Err(BrokerError::OffsetOutOfRange {
                        topic: tp.topic().to_string(),
                        partition: tp.partition().value(),
                        offset: offset.value(),
                        latest: committed.value(),
                    });
                }
            }
            group.committed.insert(tp.clone(), offset);
        }

        debug!(group = group_id, tp = %tp, offset = %offset, "committed offset");
        if let Some(tx) = &self.flush_tx {
            let entry = OffsetCommit {
                group: group_id.to_string(),
                topic: tp.topic().to_string(),
                partition: tp.partition(),
                offset,
                committed_at_ms: now_ms(),
            };
            if tx.send(entry).is_err() {
                warn!(group = group_id, "offset flusher is gone; commit kept in memory only");
            }
        }
        Ok(())
    }

    /// The last committed offset for a partition, or `None` for a partition
    /// the group has never committed; the caller then picks earliest or
    /// latest per its own reset policy.
    pub fn fetch_committed(&self, group_id: &str, tp: &TopicPartition) -> Option<Offset> {
        let groups = self.groups.lock().expect("coordinator lock poisoned");
        groups.get(group_id)?.committed.get(tp).copied()
    }

    /// Fail-fast gate a consumer session passes before fetching under a
    /// group assignment. Same rejections as [`GroupCoordinator::commit`].
    pub fn check_fetch_authorized(
        &self,
        group_id: &str,
        session: &SessionId,
        tp: &TopicPartition,
    ) -> Result<()> {
        let mut groups = self.groups.lock().expect("coordinator lock poisoned");
        let group = Self::known_group(&mut groups, group_id, session)?;
        Self::check_ownership(group, group_id, session, tp)
    }

    /// Current state of a group; `Empty` for a group never joined.
    pub fn group_state(&self, group_id: &str) -> GroupState {
        let groups = self.groups.lock().expect("coordinator lock poisoned");
        groups.get(group_id).map(|g| g.state).unwrap_or_default()
    }

    /// Current generation of a group.
    pub fn generation(&self, group_id: &str) -> GenerationId {
        let groups = self.groups.lock().expect("coordinator lock poisoned");
        groups
            .get(group_id)
            .map(|g| g.generation)
            .unwrap_or(GenerationId::INITIAL)
    }

    /// Session ids of a group's current members, ascending.
    pub fn members(&self, group_id: &str) -> Vec<SessionId> {
        let groups = self.groups.lock().expect("coordinator lock poisoned");
        groups
            .get(group_id)
            .map(|g| g.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// When a member joined, in milliseconds since the Unix epoch.
    pub fn member_joined_at(&self, group_id: &str, session: &SessionId) -> Option<i64> {
        let groups = self.groups.lock().expect("coordinator lock poisoned");
        groups
            .get(group_id)?
            .members
            .get(session)
            .map(|m| m.joined_at_ms)
    }

    /// Reload committed offsets from a persistence adapter.
    ///
    /// Entries apply in file order, so the last write for a partition wins.
    /// Returns the number of entries applied.
    pub async fn recover(&self, adapter: &dyn PersistenceAdapter) -> Result<usize> {
        let entries = adapter.load_offsets().await?;
        let applied = entries.len();

        let mut groups = self.groups.lock().expect("coordinator lock poisoned");
        for entry in entries {
            let group = groups.entry(entry.group.clone()).or_default();
            group.committed.insert(
                TopicPartition::new(entry.topic, entry.partition.value()),
                entry.offset,
            );
        }
        if applied > 0 {
            info!(entries = applied, "recovered committed offsets");
        }
        Ok(applied)
    }

    // ------------------------------------------------------------------
    // Internals. All run under the groups lock.
    // ------------------------------------------------------------------

    fn known_group<'a>(
        groups: &'a mut HashMap<String, Group>,
        group_id: &str,
        session: &SessionId,
    ) -> Result<&'a mut Group> {
        let group = groups.get_mut(group_id).ok_or_else(|| BrokerError::UnknownSession {
            group: group_id.to_string(),
            session: session.to_string(),
        })?;
        if !group.members.contains_key(session) {
            return Err(BrokerError::UnknownSession {
                group: group_id.to_string(),
                session: session.to_string(),
            });
        }
        Ok(group)
    }

    fn check_ownership(
        group: &Group,
        group_id: &str,
        session: &SessionId,
        tp: &TopicPartition,
    ) -> Result<()> {
        let member = group.members.get(session).expect("membership checked");
        if member.synced_generation != group.generation {
            return Err(BrokerError::RebalanceInProgress {
                group: group_id.to_string(),
                generation: group.generation.value(),
            });
        }
        match group.assignments.get(tp) {
            Some(owner) if owner == session => Ok(()),
            _ => Err(BrokerError::AssignmentConflict {
                group: group_id.to_string(),
                topic: tp.topic().to_string(),
                partition: tp.partition().value(),
                session: session.to_string(),
            }),
        }
    }

    /// Recompute assignments after a membership change. Bumps the
    /// generation, which implicitly revokes every outstanding assignment:
    /// members still on the old generation fail fast until they re-sync.
    fn rebalance(broker: &BrokerCore, group: &mut Group) {
        // Resolve subscriptions the same way produce does: first reference
        // creates the topic with the configured default partition count.
        let counts = Self::subscribed_partition_counts(broker, group);

        group.generation = group.generation.next();
        if group.members.is_empty() {
            group.assignments.clear();
            group.state = GroupState::Empty;
            return;
        }

        let subscriptions: Vec<(SessionId, Vec<String>)> = group
            .members
            .iter()
            .map(|(id, m)| (id.clone(), m.topics.clone()))
            .collect();
        group.assignments = assign_ranges(&subscriptions, &counts);
        group.state = GroupState::Rebalancing;
    }

    fn maybe_stabilize(group: &mut Group) {
        if group.members.is_empty() {
            group.state = GroupState::Empty;
        } else if group.all_synced() {
            group.state = GroupState::Stable;
        }
    }

    fn subscribed_partition_counts(broker: &BrokerCore, group: &Group) -> HashMap<String, i32> {
        group
            .members
            .values()
            .flat_map(|m| m.topics.iter())
            .map(|topic| (topic.clone(), broker.ensure_topic(topic)))
            .collect()
    }
}
