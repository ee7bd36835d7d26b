//! Driving the core through the transport adapter seam.

use std::sync::Arc;

use bytes::Bytes;

use samsa::broker::BrokerCore;
use samsa::config::BrokerConfig;
use samsa::coordinator::GroupCoordinator;
use samsa::error::ErrorCode;
use samsa::transport::{ChannelTransport, Dispatcher, Request, Response};

fn dispatcher() -> Dispatcher {
    let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
    let coordinator = Arc::new(GroupCoordinator::new(broker.clone()));
    Dispatcher::new(broker, coordinator)
}

#[tokio::test]
async fn test_produce_fetch_commit_round_trip() {
    let dispatcher = dispatcher();

    let response = dispatcher
        .dispatch(Request::CreateTopic {
            topic: "orders".to_string(),
            partitions: 1,
        })
        .await;
    assert!(matches!(response, Response::TopicCreated));

    for i in 0..2 {
        let response = dispatcher
            .dispatch(Request::Produce {
                topic: "orders".to_string(),
                key: None,
                value: Bytes::from(format!("m{i}")),
            })
            .await;
        let Response::Produced { partition, offset } = response else {
            panic!("expected Produced, got {response:?}");
        };
        assert_eq!(partition, 0);
        assert_eq!(offset, i);
    }

    let response = dispatcher
        .dispatch(Request::Join {
            group: "g".to_string(),
            session: "client-1".to_string(),
            topics: vec!["orders".to_string()],
        })
        .await;
    let Response::Joined { generation, assignment } = response else {
        panic!("expected Joined, got {response:?}");
    };
    assert_eq!(generation, 1);
    assert_eq!(assignment, vec![("orders".to_string(), 0)]);

    let response = dispatcher
        .dispatch(Request::Fetch {
            topic: "orders".to_string(),
            partition: 0,
            from: 0,
            max_wait_ms: 0,
            max_records: 100,
        })
        .await;
    let Response::Records(records) = response else {
        panic!("expected Records, got {response:?}");
    };
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].offset, 0);
    assert_eq!(records[1].value, Bytes::from("m1"));

    let response = dispatcher
        .dispatch(Request::Commit {
            group: "g".to_string(),
            session: "client-1".to_string(),
            topic: "orders".to_string(),
            partition: 0,
            offset: 2,
        })
        .await;
    assert!(matches!(response, Response::Committed));

    let response = dispatcher
        .dispatch(Request::FetchCommitted {
            group: "g".to_string(),
            topic: "orders".to_string(),
            partition: 0,
        })
        .await;
    assert!(matches!(response, Response::CommittedOffset(Some(2))));

    let response = dispatcher
        .dispatch(Request::HighWaterMark {
            topic: "orders".to_string(),
            partition: 0,
        })
        .await;
    assert!(matches!(response, Response::HighWaterMark(Some(2))));

    let response = dispatcher.dispatch(Request::ListTopics).await;
    let Response::Topics(topics) = response else {
        panic!("expected Topics, got {response:?}");
    };
    assert_eq!(topics, vec![("orders".to_string(), 1)]);
}

#[tokio::test]
async fn test_errors_become_coded_responses_not_failures() {
    let dispatcher = dispatcher();
    dispatcher
        .dispatch(Request::CreateTopic {
            topic: "orders".to_string(),
            partitions: 1,
        })
        .await;

    // Fetch past the high-water mark.
    let response = dispatcher
        .dispatch(Request::Fetch {
            topic: "orders".to_string(),
            partition: 0,
            from: 99,
            max_wait_ms: 0,
            max_records: 10,
        })
        .await;
    let Response::Error { code, message } = response else {
        panic!("expected Error, got {response:?}");
    };
    assert_eq!(code, ErrorCode::OffsetOutOfRange as i16);
    assert!(message.contains("orders-0"));

    // Commit from a session that never joined.
    let response = dispatcher
        .dispatch(Request::Commit {
            group: "g".to_string(),
            session: "stranger".to_string(),
            topic: "orders".to_string(),
            partition: 0,
            offset: 1,
        })
        .await;
    let Response::Error { code, .. } = response else {
        panic!("expected Error, got {response:?}");
    };
    assert_eq!(code, ErrorCode::UnknownSession as i16);
}

#[tokio::test]
async fn test_sentinel_for_uncommitted_partition() {
    let dispatcher = dispatcher();
    let response = dispatcher
        .dispatch(Request::FetchCommitted {
            group: "nobody".to_string(),
            topic: "orders".to_string(),
            partition: 0,
        })
        .await;
    assert!(matches!(response, Response::CommittedOffset(None)));
}

#[tokio::test]
async fn test_serve_drives_a_channel_transport() {
    let broker = Arc::new(BrokerCore::new(BrokerConfig::default()));
    let coordinator = Arc::new(GroupCoordinator::new(broker.clone()));
    let dispatcher = Dispatcher::new(broker, coordinator);

    let (mut client, transport) = ChannelTransport::pair(8);
    let server = tokio::spawn(async move { dispatcher.serve(transport).await });

    let response = client
        .call(Request::Produce {
            topic: "logs".to_string(),
            key: Some(Bytes::from("host-a")),
            value: Bytes::from("line 1"),
        })
        .await
        .unwrap();
    assert!(matches!(response, Response::Produced { offset: 0, .. }));

    let Response::Produced { partition, .. } = response else {
        unreachable!()
    };
    let response = client
        .call(Request::Fetch {
            topic: "logs".to_string(),
            partition,
            from: 0,
            max_wait_ms: 0,
            max_records: 10,
        })
        .await
        .unwrap();
    let Response::Records(records) = response else {
        panic!("expected Records, got {response:?}");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, Some(Bytes::from("host-a")));

    // Dropping the client ends the serve loop cleanly.
    drop(client);
    server.await.unwrap().unwrap();
}
