//! Transport adapter seam.
//!
//! The core is agnostic to wire encoding: adapters deliver typed requests
//! and carry typed responses back, owning framing, sockets, and TLS
//! themselves. [`Dispatcher`] is the single entry point. It never fails,
//! mapping every core error onto [`Response::Error`] with the compact
//! numeric [`ErrorCode`](crate::error::ErrorCode) so adapters can encode it
//! however their wire format likes.
//!
//! [`ChannelTransport`] is the in-process adapter used by tests and
//! embedders; a TCP adapter would implement [`Transport`] the same way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::BrokerCore;
use crate::coordinator::GroupCoordinator;
use crate::error::Result;
use crate::types::{Offset, PartitionIndex, SessionId, TopicPartition};

/// A request delivered by a transport adapter.
#[derive(Debug, Clone)]
pub enum Request {
    Produce {
        topic: String,
        key: Option<Bytes>,
        value: Bytes,
    },
    Fetch {
        topic: String,
        partition: i32,
        from: i64,
        max_wait_ms: u64,
        max_records: usize,
    },
    CreateTopic {
        topic: String,
        partitions: i32,
    },
    ListTopics,
    HighWaterMark {
        topic: String,
        partition: i32,
    },
    Join {
        group: String,
        session: String,
        topics: Vec<String>,
    },
    Sync {
        group: String,
        session: String,
    },
    Leave {
        group: String,
        session: String,
    },
    Commit {
        group: String,
        session: String,
        topic: String,
        partition: i32,
        offset: i64,
    },
    FetchCommitted {
        group: String,
        topic: String,
        partition: i32,
    },
}

/// One record as carried over a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPayload {
    pub offset: i64,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub timestamp_ms: i64,
}

/// A response handed back to a transport adapter.
#[derive(Debug, Clone)]
pub enum Response {
    Produced {
        partition: i32,
        offset: i64,
    },
    Records(Vec<RecordPayload>),
    TopicCreated,
    /// Topic names with their partition counts.
    Topics(Vec<(String, i32)>),
    HighWaterMark(Option<i64>),
    Joined {
        generation: i32,
        assignment: Vec<(String, i32)>,
    },
    Synced {
        generation: i32,
        assignment: Vec<(String, i32)>,
    },
    Left,
    Committed,
    CommittedOffset(Option<i64>),
    Error {
        code: i16,
        message: String,
    },
}

/// Carries requests into the core and responses back out.
#[async_trait]
pub trait Transport: Send {
    /// Next request, or `None` when the peer is done.
    async fn recv(&mut self) -> Option<Request>;

    /// Deliver a response to the peer.
    async fn send(&mut self, response: Response) -> Result<()>;
}

/// Routes requests to the broker core and group coordinator.
pub struct Dispatcher {
    broker: Arc<BrokerCore>,
    coordinator: Arc<GroupCoordinator>,
}

impl Dispatcher {
    pub fn new(broker: Arc<BrokerCore>, coordinator: Arc<GroupCoordinator>) -> Self {
        Self {
            broker,
            coordinator,
        }
    }

    /// Handle one request. Core errors come back as [`Response::Error`],
    /// never as an `Err`: a bad request must not tear down the adapter.
    pub async fn dispatch(&self, request: Request) -> Response {
        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(e) => Response::Error {
                code: e.code() as i16,
                message: e.to_string(),
            },
        }
    }

    /// Drive a transport until its peer disconnects.
    pub async fn serve<T: Transport>(&self, mut transport: T) -> Result<()> {
        while let Some(request) = transport.recv().await {
            debug!(?request, "dispatching request");
            let response = self.dispatch(request).await;
            transport.send(response).await?;
        }
        Ok(())
    }

    async fn try_dispatch(&self, request: Request) -> Result<Response> {
        let membership_response =
            |synced: bool, m: crate::coordinator::Membership| {
                let assignment = m
                    .assignment
                    .into_iter()
                    .map(|tp| (tp.topic().to_string(), tp.partition().value()))
                    .collect();
                if synced {
                    Response::Synced {
                        generation: m.generation.value(),
                        assignment,
                    }
                } else {
                    Response::Joined {
                        generation: m.generation.value(),
                        assignment,
                    }
                }
            };

        Ok(match request {
            Request::Produce { topic, key, value } => {
                let (partition, offset) = self.broker.produce(&topic, key, value).await?;
                Response::Produced {
                    partition: partition.value(),
                    offset: offset.value(),
                }
            }
            Request::Fetch {
                topic,
                partition,
                from,
                max_wait_ms,
                max_records,
            } => {
                let records = self
                    .broker
                    .fetch(
                        &topic,
                        PartitionIndex::new(partition),
                        Offset::new(from),
                        Duration::from_millis(max_wait_ms),
                        max_records,
                    )
                    .await?;
                Response::Records(
                    records
                        .into_iter()
                        .map(|r| RecordPayload {
                            offset: r.offset.value(),
                            key: r.record.key().cloned(),
                            value: r.record.value().clone(),
                            timestamp_ms: r.record.timestamp_ms(),
                        })
                        .collect(),
                )
            }
            Request::CreateTopic { topic, partitions } => {
                self.broker.create_topic(&topic, partitions)?;
                Response::TopicCreated
            }
            Request::ListTopics => {
                let mut topics: Vec<(String, i32)> = self
                    .broker
                    .topic_names()
                    .into_iter()
                    .map(|name| {
                        let partitions = self.broker.partition_count(&name).unwrap_or(0);
                        (name, partitions)
                    })
                    .collect();
                topics.sort();
                Response::Topics(topics)
            }
            Request::HighWaterMark { topic, partition } => Response::HighWaterMark(
                self.broker
                    .high_water_mark(&topic, PartitionIndex::new(partition))
                    .map(Offset::value),
            ),
            Request::Join {
                group,
                session,
                topics,
            } => {
                let membership =
                    self.coordinator
                        .join(&group, &SessionId::new(session), &topics)?;
                membership_response(false, membership)
            }
            Request::Sync { group, session } => {
                let membership = self.coordinator.sync(&group, &SessionId::new(session))?;
                membership_response(true, membership)
            }
            Request::Leave { group, session } => {
                self.coordinator.leave(&group, &SessionId::new(session))?;
                Response::Left
            }
            Request::Commit {
                group,
                session,
                topic,
                partition,
                offset,
            } => {
                self.coordinator.commit(
                    &group,
                    &SessionId::new(session),
                    &TopicPartition::new(topic, partition),
                    Offset::new(offset),
                )?;
                Response::Committed
            }
            Request::FetchCommitted {
                group,
                topic,
                partition,
            } => Response::CommittedOffset(
                self.coordinator
                    .fetch_committed(&group, &TopicPartition::new(topic, partition))
                    .map(Offset::value),
            ),
        })
    }
}

/// In-process transport over a pair of bounded channels.
pub struct ChannelTransport {
    requests: mpsc::Receiver<Request>,
    responses: mpsc::Sender<Response>,
}

/// Client half of a [`ChannelTransport`] pair.
pub struct ChannelClient {
    requests: mpsc::Sender<Request>,
    responses: mpsc::Receiver<Response>,
}

impl ChannelTransport {
    /// Build a connected client/transport pair.
    pub fn pair(capacity: usize) -> (ChannelClient, ChannelTransport) {
        let (req_tx, req_rx) = mpsc::channel(capacity);
        let (resp_tx, resp_rx) = mpsc::channel(capacity);
        (
            ChannelClient {
                requests: req_tx,
                responses: resp_rx,
            },
            ChannelTransport {
                requests: req_rx,
                responses: resp_tx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Option<Request> {
        self.requests.recv().await
    }

    async fn send(&mut self, response: Response) -> Result<()> {
        self.responses
            .send(response)
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
    }
}

impl ChannelClient {
    /// Send one request and wait for its response. `None` once the serving
    /// side has shut down.
    pub async fn call(&mut self, request: Request) -> Option<Response> {
        self.requests.send(request).await.ok()?;
        self.responses.recv().await
    }
}
