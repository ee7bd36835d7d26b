//! An in-process producer/consumer pipeline.
//!
//! One producer pushes a handful of messages into a topic while a consumer
//! task in the same process polls them, "processes" them by logging, and
//! commits its offsets through a JSON-lines persistence adapter. The
//! offsets file survives the process; records do not. On a re-run the
//! consumer's recovered position falls outside the fresh log, so it resets
//! to earliest and the run redelivers. At-least-once, visibly.
//!
//! Run with: cargo run --example pipeline

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use samsa::prelude::*;
use samsa::telemetry::{LogFormat, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LogFormat::from_env())?;

    let adapter = Arc::new(JsonlPersistence::new("pipeline-offsets.jsonl"));
    let (flush_tx, flusher) = OffsetFlusher::spawn(adapter.clone(), Duration::from_millis(100));

    let broker = Arc::new(BrokerCore::new(BrokerConfig::from_env()));
    broker.create_topic("app-logs", 1)?;
    let coordinator = Arc::new(GroupCoordinator::new(broker.clone()).with_flush_channel(flush_tx));
    coordinator.recover(&*adapter).await?;

    let consumer_task = {
        let broker = broker.clone();
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let mut consumer =
                ConsumerSession::join(broker, coordinator, "log-writer", &["app-logs"])?;
            let mut seen = 0usize;
            while seen < 5 {
                let records = consumer.poll(Duration::from_millis(500)).await?;
                for record in &records {
                    info!(
                        offset = %record.offset,
                        payload = %String::from_utf8_lossy(record.record.value()),
                        "consumed message"
                    );
                }
                seen += records.len();
                consumer.commit()?;
            }
            consumer.leave()
        })
    };

    let producer = ProducerSession::new(broker);
    for i in 0..5 {
        let meta = producer
            .send("app-logs", None, Bytes::from(format!("log line {i}")))
            .await?;
        info!(partition = %meta.partition, offset = %meta.offset, "sent message");
    }

    consumer_task.await.expect("consumer task panicked")?;
    flusher.shutdown().await;
    info!("pipeline complete; committed offsets are in pipeline-offsets.jsonl");
    Ok(())
}
