//! # Samsa
//! Single-process, in-memory message queue core.
//!
//! Samsa provides the engine room of a partitioned message broker without the
//! network: append-only partition logs with monotonically increasing offsets,
//! deterministic key-based partition assignment, long-poll fetch, consumer
//! groups with cooperative rebalancing, and durable committed offsets through
//! a pluggable persistence adapter.
//!
//! # Goals
//! - Make at-least-once delivery explicit and testable: a consumer that dies
//!   between fetch and commit is redelivered from its last committed offset.
//! - Keep every invariant local: offsets are unique and contiguous per
//!   partition, a partition belongs to at most one group member at a time,
//!   and no failure in one partition or group affects another.
//! - Stay transport-agnostic: wire framing, TLS, and client protocols live in
//!   adapters built on [`transport`], never in the core.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bytes::Bytes;
//! use samsa::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> samsa::error::Result<()> {
//!     let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
//!     let coordinator = Arc::new(GroupCoordinator::new(broker.clone()));
//!
//!     broker.create_topic("orders", 1)?;
//!
//!     let producer = ProducerSession::new(broker.clone());
//!     producer.send("orders", None, Bytes::from("hello")).await?;
//!
//!     let mut consumer =
//!         ConsumerSession::join(broker, coordinator, "billing", &["orders"])?;
//!     let records = consumer.poll(Duration::from_millis(500)).await?;
//!     for record in &records {
//!         println!("{} @ {}", record.partition, record.offset);
//!     }
//!     consumer.commit()?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod assigner;
pub mod broker;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod persistence;
pub mod record;
pub mod retry;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod transport;
pub mod types;

pub mod prelude {
    //! Main exports for embedding the queue core.

    pub use crate::broker::BrokerCore;
    pub use crate::config::BrokerConfig;
    pub use crate::coordinator::{GroupCoordinator, GroupState, Membership};
    pub use crate::error::{BrokerError, ErrorCode, Result};
    pub use crate::persistence::{
        JsonlPersistence, NullPersistence, OffsetFlusher, PersistenceAdapter,
    };
    pub use crate::record::{Record, RecordWithOffset};
    pub use crate::session::{
        ConsumedRecord, ConsumerSession, OffsetReset, ProducerSession, RecordMetadata,
    };
    pub use crate::types::{GenerationId, Offset, PartitionIndex, SessionId, TopicPartition};

    pub use bytes;
}
