//! Error taxonomy for the queue core.
//!
//! Every error here is local to one partition or one group; nothing in this
//! module is process-fatal. A fetch that times out with no records is NOT an
//! error; it is a normal empty return.
//!
//! # Retry classification
//!
//! | Variant               | Retryable | Caller action                        |
//! |-----------------------|-----------|--------------------------------------|
//! | `ResourceExhausted`   | yes       | back off, retry the produce          |
//! | `OffsetOutOfRange`    | no        | reset the offset, then retry         |
//! | `AssignmentConflict`  | yes       | rejoin the group                     |
//! | `RebalanceInProgress` | yes       | re-sync the assignment, retry        |
//! | `UnknownSession`      | no        | join before committing               |
//! | `Config`              | no        | fix the configuration                |
//! | `Io` / `Serde`        | varies    | persistence-adapter problem          |
//!
//! Transport adapters map errors to the compact numeric [`ErrorCode`] so wire
//! encodings do not depend on Rust enum layout.

use num_derive::FromPrimitive;
use thiserror::Error;

/// Result type for all queue-core operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the broker core, coordinator, and sessions.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A partition's byte budget is spent. The record was NOT appended and
    /// was not silently dropped; the producer may retry after backoff.
    #[error("partition {topic}-{partition} is full ({limit_bytes} byte limit)")]
    ResourceExhausted {
        topic: String,
        partition: i32,
        limit_bytes: usize,
    },

    /// A negative offset, a fetch beyond the high-water mark, or a commit
    /// that would move a committed offset backward.
    #[error("offset {offset} out of range for {topic}-{partition} (latest {latest})")]
    OffsetOutOfRange {
        topic: String,
        partition: i32,
        offset: i64,
        latest: i64,
    },

    /// The calling session does not currently own the partition within its
    /// group. Ownership may have moved in a rebalance; rejoin and retry.
    #[error("session {session} does not own {topic}-{partition} in group {group}")]
    AssignmentConflict {
        group: String,
        topic: String,
        partition: i32,
        session: String,
    },

    /// The group's membership changed and this member has not yet
    /// acknowledged the new generation. Fail-fast and retryable by design:
    /// members mid-rebalance are never blocked.
    #[error("group {group} is rebalancing (generation {generation})")]
    RebalanceInProgress { group: String, generation: i32 },

    /// The session is not a member of the group it is acting on.
    #[error("session {session} is not a member of group {group}")]
    UnknownSession { group: String, session: String },

    /// Invalid configuration or topic declaration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O failure in the persistence adapter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure in the persistence adapter.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl BrokerError {
    /// Whether the caller may retry the same operation after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::ResourceExhausted { .. }
                | BrokerError::AssignmentConflict { .. }
                | BrokerError::RebalanceInProgress { .. }
        )
    }

    /// Compact numeric code for transport adapters.
    pub fn code(&self) -> ErrorCode {
        match self {
            BrokerError::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            BrokerError::OffsetOutOfRange { .. } => ErrorCode::OffsetOutOfRange,
            BrokerError::AssignmentConflict { .. } => ErrorCode::AssignmentConflict,
            BrokerError::RebalanceInProgress { .. } => ErrorCode::RebalanceInProgress,
            BrokerError::UnknownSession { .. } => ErrorCode::UnknownSession,
            BrokerError::Config(_) => ErrorCode::InvalidConfig,
            BrokerError::Io(_) | BrokerError::Serde(_) => ErrorCode::Storage,
        }
    }
}

/// Numeric error codes carried by transport responses.
///
/// Adapters encode these on the wire instead of the error enum so that the
/// wire format stays stable as error payloads evolve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, Default)]
pub enum ErrorCode {
    /// An unexpected error with no dedicated code.
    Unknown = -1,
    /// No error.
    #[default]
    None = 0,
    /// Partition byte budget exhausted; retryable after backoff.
    ResourceExhausted = 1,
    /// The requested or committed offset is outside the valid range.
    OffsetOutOfRange = 2,
    /// The caller does not hold the partition assignment it acted on.
    AssignmentConflict = 3,
    /// The group is mid-rebalance; re-sync and retry.
    RebalanceInProgress = 4,
    /// The caller is not a member of the group.
    UnknownSession = 5,
    /// Invalid configuration or topic declaration.
    InvalidConfig = 6,
    /// Persistence adapter failure.
    Storage = 7,
}
