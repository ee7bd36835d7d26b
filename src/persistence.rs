//! Durable committed-offset storage behind an adapter seam.
//!
//! The core never touches the filesystem directly. Commits accepted by the
//! coordinator flow over a channel into an [`OffsetFlusher`] background
//! task, which batches them and hands them to a [`PersistenceAdapter`] every
//! flush interval; the interval is the durability/throughput trade-off. On
//! startup, [`crate::coordinator::GroupCoordinator::recover`] reads the
//! adapter back to restore committed offsets.
//!
//! Record retention is an explicit non-goal; the adapter persists offsets
//! only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Offset, PartitionIndex};

/// One accepted commit, as handed to the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetCommit {
    pub group: String,
    pub topic: String,
    pub partition: PartitionIndex,
    pub offset: Offset,
    pub committed_at_ms: i64,
}

/// Durable storage for committed offsets.
///
/// Implementations must tolerate replay: `load_offsets` may return several
/// entries for the same group/partition, and later entries win.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Durably record a batch of commits.
    async fn persist_offsets(&self, batch: &[OffsetCommit]) -> Result<()>;

    /// Read back every recorded commit, oldest first.
    async fn load_offsets(&self) -> Result<Vec<OffsetCommit>>;
}

/// Discards everything. The default when durability is not wanted.
pub struct NullPersistence;

#[async_trait]
impl PersistenceAdapter for NullPersistence {
    async fn persist_offsets(&self, _batch: &[OffsetCommit]) -> Result<()> {
        Ok(())
    }

    async fn load_offsets(&self) -> Result<Vec<OffsetCommit>> {
        Ok(Vec::new())
    }
}

/// Append-only JSON-lines file, one commit per line.
///
/// Dead simple on purpose: recovery replays the whole file and later lines
/// win, so no compaction or index is needed for correctness.
pub struct JsonlPersistence {
    path: PathBuf,
}

impl JsonlPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistenceAdapter for JsonlPersistence {
    async fn persist_offsets(&self, batch: &[OffsetCommit]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(batch.len() * 64);
        for entry in batch {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    async fn load_offsets(&self) -> Result<Vec<OffsetCommit>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}

/// Background task that batches commits toward a persistence adapter.
///
/// Commits buffer in memory and flush every `flush_interval`; a failed
/// flush keeps its batch and retries on the next tick. Shutdown drains the
/// channel and performs a final flush.
pub struct OffsetFlusher {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl OffsetFlusher {
    /// Spawn the flusher. The returned sender is what
    /// [`crate::coordinator::GroupCoordinator::with_flush_channel`] takes.
    pub fn spawn(
        adapter: Arc<dyn PersistenceAdapter>,
        flush_interval: Duration,
    ) -> (mpsc::UnboundedSender<OffsetCommit>, OffsetFlusher) {
        let (tx, mut rx) = mpsc::unbounded_channel::<OffsetCommit>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut pending: Vec<OffsetCommit> = Vec::new();
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::flush(&*adapter, &mut pending).await;
                    }
                    received = rx.recv() => match received {
                        Some(entry) => pending.push(entry),
                        // All senders dropped: final flush and exit.
                        None => {
                            Self::flush(&*adapter, &mut pending).await;
                            return;
                        }
                    },
                    _ = &mut shutdown_rx => {
                        while let Ok(entry) = rx.try_recv() {
                            pending.push(entry);
                        }
                        Self::flush(&*adapter, &mut pending).await;
                        return;
                    }
                }
            }
        });

        (tx, OffsetFlusher { handle, shutdown_tx })
    }

    async fn flush(adapter: &dyn PersistenceAdapter, pending: &mut Vec<OffsetCommit>) {
        if pending.is_empty() {
            return;
        }
        match adapter.persist_offsets(pending).await {
            Ok(()) => {
                debug!(entries = pending.len(), "flushed committed offsets");
                pending.clear();
            }
            Err(e) => {
                // Keep the batch; it retries on the next tick.
                warn!(error = %e, entries = pending.len(), "offset flush failed");
            }
        }
    }

    /// Drain outstanding commits, flush them, and stop the task.
    pub async fn shutdown(self) {
        // A send error means the task already exited; join either way.
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
