//! Per-group state.

use std::collections::{BTreeMap, HashMap};

use crate::types::{GenerationId, Offset, SessionId, TopicPartition};

/// Lifecycle of a consumer group.
///
/// `Empty -> Rebalancing -> Stable`, looping through `Rebalancing` on every
/// membership change and back to `Empty` when the last member leaves.
/// Committed offsets survive `Empty` so the next joiner resumes where the
/// group left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupState {
    /// No members.
    #[default]
    Empty,
    /// Membership changed; not every member has acknowledged the new
    /// assignment yet.
    Rebalancing,
    /// All members are on the current generation.
    Stable,
}

/// One member of a group.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    /// Topics the member wants partitions of.
    pub(crate) topics: Vec<String>,
    /// The generation this member last acknowledged. A member whose value
    /// trails the group generation is mid-rebalance and must re-sync.
    pub(crate) synced_generation: GenerationId,
    /// Wall-clock join time, for operators.
    pub(crate) joined_at_ms: i64,
}

/// A consumer group: members, current assignment, committed offsets.
#[derive(Debug, Default)]
pub(crate) struct Group {
    pub(crate) state: GroupState,
    pub(crate) generation: GenerationId,
    /// Sorted by session id so assignment order is deterministic.
    pub(crate) members: BTreeMap<SessionId, Member>,
    pub(crate) assignments: HashMap<TopicPartition, SessionId>,
    /// Survives members; only cleared by process restart without a
    /// persistence adapter.
    pub(crate) committed: HashMap<TopicPartition, Offset>,
}

impl Group {
    /// Partitions currently assigned to one member.
    pub(crate) fn assignment_of(&self, session: &SessionId) -> Vec<TopicPartition> {
        let mut owned: Vec<TopicPartition> = self
            .assignments
            .iter()
            .filter(|(_, owner)| *owner == session)
            .map(|(tp, _)| tp.clone())
            .collect();
        owned.sort();
        owned
    }

    /// Whether every current member has acknowledged the current generation.
    pub(crate) fn all_synced(&self) -> bool {
        self.members
            .values()
            .all(|m| m.synced_generation == self.generation)
    }
}
