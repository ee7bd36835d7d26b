//! Broker core behavior: offset invariants, long-poll fetch, capacity.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use samsa::broker::BrokerCore;
use samsa::config::BrokerConfig;
use samsa::error::BrokerError;
use samsa::types::{Offset, PartitionIndex};

fn broker_with(config: BrokerConfig) -> Arc<BrokerCore> {
    Arc::new(BrokerCore::new(config))
}

fn broker() -> Arc<BrokerCore> {
    broker_with(BrokerConfig::default())
}

const P0: PartitionIndex = PartitionIndex(0);

#[tokio::test]
async fn test_offsets_are_strictly_increasing_without_gaps() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();

    let mut offsets = Vec::new();
    for i in 0..50 {
        let (partition, offset) = broker
            .produce("orders", None, Bytes::from(format!("m{i}")))
            .await
            .unwrap();
        assert_eq!(partition, P0);
        offsets.push(offset.value());
    }

    let expected: Vec<i64> = (0..50).collect();
    assert_eq!(offsets, expected);
    assert_eq!(broker.high_water_mark("orders", P0), Some(Offset::new(50)));
}

#[tokio::test]
async fn test_concurrent_producers_never_share_an_offset() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for producer in 0..8 {
        let broker = broker.clone();
        tasks.spawn(async move {
            let mut mine = Vec::new();
            for i in 0..25 {
                let (_, offset) = broker
                    .produce("orders", None, Bytes::from(format!("p{producer}-{i}")))
                    .await
                    .unwrap();
                mine.push(offset.value());
            }
            mine
        });
    }

    let mut all = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let mine = result.unwrap();
        // Each producer's own confirmations arrive in increasing order.
        assert!(mine.windows(2).all(|w| w[0] < w[1]));
        all.extend(mine);
    }

    all.sort_unstable();
    let expected: Vec<i64> = (0..200).collect();
    assert_eq!(all, expected, "offsets must be unique and contiguous");
}

#[tokio::test]
async fn test_fetch_returns_exactly_the_records_at_and_after_offset() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();
    for i in 0..10 {
        broker
            .produce("orders", None, Bytes::from(format!("m{i}")))
            .await
            .unwrap();
    }

    let records = broker
        .fetch("orders", P0, Offset::new(4), Duration::ZERO, 100)
        .await
        .unwrap();

    assert_eq!(records.len(), 6);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.offset.value(), 4 + i as i64);
        assert_eq!(
            record.record.value(),
            &Bytes::from(format!("m{}", 4 + i))
        );
    }
}

#[tokio::test]
async fn test_fetch_honors_max_records() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();
    for i in 0..10 {
        broker
            .produce("orders", None, Bytes::from(format!("m{i}")))
            .await
            .unwrap();
    }

    let records = broker
        .fetch("orders", P0, Offset::ZERO, Duration::ZERO, 3)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records.last().unwrap().offset.value(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_fetch_returns_after_max_wait_not_an_error() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();

    let started = tokio::time::Instant::now();
    let records = broker
        .fetch("orders", P0, Offset::ZERO, Duration::from_millis(500), 10)
        .await
        .unwrap();

    assert!(records.is_empty());
    let waited = started.elapsed();
    assert!(
        waited >= Duration::from_millis(500),
        "returned after {waited:?}, before the poll bound"
    );
    assert!(waited < Duration::from_millis(600));
}

#[tokio::test]
async fn test_long_poll_wakes_as_soon_as_a_record_lands() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();

    let fetcher = {
        let broker = broker.clone();
        tokio::spawn(async move {
            broker
                .fetch("orders", P0, Offset::ZERO, Duration::from_secs(30), 10)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    broker
        .produce("orders", None, Bytes::from("wake up"))
        .await
        .unwrap();

    let records = tokio::time::timeout(Duration::from_secs(5), fetcher)
        .await
        .expect("fetch must wake well before its 30s bound")
        .unwrap()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.value(), &Bytes::from("wake up"));
}

#[tokio::test]
async fn test_fetch_on_missing_topic_is_empty_and_does_not_create_it() {
    let broker = broker();
    let records = broker
        .fetch("never-produced", P0, Offset::ZERO, Duration::ZERO, 10)
        .await
        .unwrap();
    assert!(records.is_empty());
    assert!(broker.partition_count("never-produced").is_none());

    // Same for a partition index outside an existing topic's range.
    broker.create_topic("orders", 1).unwrap();
    let records = broker
        .fetch("orders", PartitionIndex::new(7), Offset::ZERO, Duration::ZERO, 10)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_fetch_with_invalid_offset_is_out_of_range() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();
    broker
        .produce("orders", None, Bytes::from("m"))
        .await
        .unwrap();

    for bad in [-1i64, 2, 100] {
        let err = broker
            .fetch("orders", P0, Offset::new(bad), Duration::ZERO, 10)
            .await
            .unwrap_err();
        assert!(
            matches!(err, BrokerError::OffsetOutOfRange { .. }),
            "offset {bad} must be rejected, got {err:?}"
        );
    }

    // Exactly at the high-water mark is a caught-up consumer, not an error.
    let records = broker
        .fetch("orders", P0, Offset::new(1), Duration::ZERO, 10)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_keyed_records_stick_to_one_partition() {
    let broker = broker();
    broker.create_topic("orders", 4).unwrap();

    let mut partitions = std::collections::HashSet::new();
    for _ in 0..10 {
        let (partition, _) = broker
            .produce("orders", Some(Bytes::from("customer-7")), Bytes::from("m"))
            .await
            .unwrap();
        partitions.insert(partition.value());
    }
    assert_eq!(partitions.len(), 1);
}

#[tokio::test]
async fn test_full_partition_does_not_affect_siblings() {
    // Budget fits one small record per partition.
    let config = BrokerConfig::default().with_max_partition_bytes(40);
    let broker = broker_with(config);
    broker.create_topic("orders", 2).unwrap();

    // Keyless round-robin alternates 0, 1, 0, 1, ... so one of the two
    // partitions hits its budget first.
    let mut full_seen = false;
    for i in 0..20 {
        let result = broker
            .produce("orders", None, Bytes::from(format!("{i:04}"))) // 4 bytes + overhead
            .await;
        if let Err(e) = result {
            assert!(matches!(e, BrokerError::ResourceExhausted { .. }));
            assert!(e.is_retryable());
            full_seen = true;
            break;
        }
    }
    assert!(full_seen, "budget of 40 bytes must fill up");

    // Both partitions already hold a record; the error named one partition
    // and the other still serves fetches.
    let p0 = broker
        .fetch("orders", P0, Offset::ZERO, Duration::ZERO, 10)
        .await
        .unwrap();
    let p1 = broker
        .fetch("orders", PartitionIndex::new(1), Offset::ZERO, Duration::ZERO, 10)
        .await
        .unwrap();
    assert!(!p0.is_empty());
    assert!(!p1.is_empty());
}

#[tokio::test]
async fn test_dropping_a_fetch_cancels_its_wait() {
    let broker = broker();
    broker.create_topic("orders", 1).unwrap();

    let fetch = broker.fetch("orders", P0, Offset::ZERO, Duration::from_secs(3600), 10);
    // Poll the future once, then drop it; the waiter must be released
    // without blocking anything else.
    tokio::select! {
        _ = fetch => panic!("nothing was produced"),
        _ = tokio::time::sleep(Duration::from_millis(20)) => {}
    }

    // The partition is still fully usable.
    broker
        .produce("orders", None, Bytes::from("m"))
        .await
        .unwrap();
    let records = broker
        .fetch("orders", P0, Offset::ZERO, Duration::ZERO, 10)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}
