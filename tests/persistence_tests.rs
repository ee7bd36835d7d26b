//! Committed offsets surviving a process restart through the persistence
//! adapter.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use samsa::broker::BrokerCore;
use samsa::config::BrokerConfig;
use samsa::coordinator::GroupCoordinator;
use samsa::persistence::{JsonlPersistence, NullPersistence, OffsetFlusher};
use samsa::session::{ConsumerSession, ProducerSession};
use samsa::types::{Offset, TopicPartition};

#[tokio::test]
async fn test_commits_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.jsonl");

    // First process lifetime: consume and commit, then shut down cleanly.
    {
        let adapter = Arc::new(JsonlPersistence::new(&path));
        let (flush_tx, flusher) = OffsetFlusher::spawn(adapter, Duration::from_millis(10));

        let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
        broker.create_topic("orders", 1).unwrap();
        let coordinator =
            Arc::new(GroupCoordinator::new(broker.clone()).with_flush_channel(flush_tx));

        let producer = ProducerSession::new(broker.clone());
        for i in 0..3 {
            producer
                .send("orders", None, Bytes::from(format!("order-{i}")))
                .await
                .unwrap();
        }

        let mut consumer =
            ConsumerSession::join(broker, coordinator, "billing", &["orders"]).unwrap();
        let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
        assert_eq!(records.len(), 3);
        consumer.commit().unwrap();
        consumer.leave().unwrap();

        flusher.shutdown().await;
    }

    // Second lifetime: a fresh broker and coordinator recover the offsets.
    {
        let adapter = JsonlPersistence::new(&path);
        let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
        broker.create_topic("orders", 1).unwrap();
        let coordinator = Arc::new(GroupCoordinator::new(broker.clone()));

        let applied = coordinator.recover(&adapter).await.unwrap();
        assert!(applied >= 1);
        assert_eq!(
            coordinator.fetch_committed("billing", &TopicPartition::new("orders", 0)),
            Some(Offset::new(3))
        );

        // Records themselves are not persisted (retention is out of scope);
        // but the committed position is honored: a re-populated topic only
        // redelivers from offset 3 onward.
        let producer = ProducerSession::new(broker.clone());
        for i in 0..4 {
            producer
                .send("orders", None, Bytes::from(format!("order-{i}")))
                .await
                .unwrap();
        }
        let mut consumer =
            ConsumerSession::join(broker, coordinator, "billing", &["orders"]).unwrap();
        let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset.value(), 3);
    }
}

#[tokio::test]
async fn test_later_commits_win_on_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.jsonl");

    let adapter = Arc::new(JsonlPersistence::new(&path));
    let (flush_tx, flusher) = OffsetFlusher::spawn(adapter.clone(), Duration::from_millis(5));

    let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
    broker.create_topic("orders", 1).unwrap();
    let coordinator =
        Arc::new(GroupCoordinator::new(broker.clone()).with_flush_channel(flush_tx));

    let producer = ProducerSession::new(broker.clone());
    for i in 0..5 {
        producer
            .send("orders", None, Bytes::from(format!("m{i}")))
            .await
            .unwrap();
    }

    // Commit twice at increasing offsets; the file holds both entries.
    let mut consumer =
        ConsumerSession::join(broker.clone(), coordinator, "g", &["orders"]).unwrap();
    consumer.poll(Duration::from_millis(200)).await.unwrap();
    consumer.commit().unwrap();
    consumer.commit().unwrap();
    consumer.leave().unwrap();
    flusher.shutdown().await;

    let entries = adapter.load_offsets().await.unwrap();
    assert!(entries.len() >= 2);

    // Replay applies in order: the final committed offset wins.
    let fresh = GroupCoordinator::new(Arc::new(BrokerCore::new(BrokerConfig::default())));
    fresh.recover(&*adapter).await.unwrap();
    assert_eq!(
        fresh.fetch_committed("g", &TopicPartition::new("orders", 0)),
        Some(Offset::new(5))
    );
}

#[tokio::test]
async fn test_flusher_batches_on_the_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.jsonl");
    let adapter = Arc::new(JsonlPersistence::new(&path));

    let (flush_tx, flusher) = OffsetFlusher::spawn(adapter.clone(), Duration::from_millis(20));
    for offset in 1..=3 {
        flush_tx
            .send(samsa::persistence::OffsetCommit {
                group: "g".to_string(),
                topic: "t".to_string(),
                partition: samsa::types::PartitionIndex::new(0),
                offset: Offset::new(offset),
                committed_at_ms: 0,
            })
            .unwrap();
    }

    // Well past one interval the batch must be on disk, no shutdown needed.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let entries = adapter.load_offsets().await.unwrap();
    assert_eq!(entries.len(), 3);

    flusher.shutdown().await;
}

#[tokio::test]
async fn test_recover_from_null_adapter_is_a_clean_slate() {
    let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
    let coordinator = GroupCoordinator::new(broker);
    let applied = coordinator.recover(&NullPersistence).await.unwrap();
    assert_eq!(applied, 0);
}
