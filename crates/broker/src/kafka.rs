//! rdkafka-backed broker client.
//!
//! One `KafkaBroker` holds a metadata consumer for partition and offset
//! queries and builds dedicated `StreamConsumer`s for partition cursors and
//! group sessions. Partition cursors use generated anonymous group ids and
//! never commit; group sessions use the caller's group id with auto-commit
//! disabled and commit explicitly per message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use clap::Parser;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers as _, Message as _};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tracing::debug;

use crate::client::{BrokerClient, GroupSession, PartitionCursor};
use crate::error::{Error, Result};
use crate::message::{Header, IsolationLevel, Message, OffsetAnchor, StartPosition};

/// Timeout for metadata, watermark, and offset-for-time queries.
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker connection configuration.
#[derive(Debug, Clone, Parser)]
pub struct BrokerConfig {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[clap(long, value_delimiter = ',', required = true, env = "KAFTAIL_BROKERS")]
    pub brokers: Vec<String>,

    /// Consumer session timeout in milliseconds
    #[clap(long, default_value = "30000")]
    pub session_timeout_ms: String,
}

/// Broker client backed by rdkafka.
pub struct KafkaBroker {
    config: BrokerConfig,
    isolation: IsolationLevel,
    meta: Arc<StreamConsumer>,
}

impl KafkaBroker {
    /// Connect to the cluster described by `config`.
    pub fn connect(config: BrokerConfig, isolation: IsolationLevel) -> Result<Self> {
        if config.brokers.is_empty() {
            return Err(Error::Config("no brokers configured".to_string()));
        }
        let meta = base_config(&config, isolation)
            .set("group.id", anonymous_group_id())
            .create()?;
        Ok(Self {
            config,
            isolation,
            meta: Arc::new(meta),
        })
    }
}

fn base_config(config: &BrokerConfig, isolation: IsolationLevel) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.brokers.join(","))
        .set("session.timeout.ms", &config.session_timeout_ms)
        .set("isolation.level", isolation.as_client_config())
        .set("enable.auto.commit", "false");
    client_config
}

/// Group id for consumers that read outside any real consumer group.
fn anonymous_group_id() -> String {
    format!("kaftail-{:08x}", rand::random::<u32>())
}

#[async_trait]
impl BrokerClient for KafkaBroker {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>> {
        let metadata = self.meta.fetch_metadata(Some(topic), METADATA_TIMEOUT)?;
        let topic_metadata = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))?;
        if let Some(err) = topic_metadata.error() {
            return Err(Error::Metadata {
                topic: topic.to_string(),
                message: format!("{err:?}"),
            });
        }
        let mut partitions: Vec<i32> = topic_metadata
            .partitions()
            .iter()
            .map(|p| p.id())
            .collect();
        if partitions.is_empty() {
            return Err(Error::UnknownTopic(topic.to_string()));
        }
        partitions.sort_unstable();
        Ok(partitions)
    }

    async fn offset(&self, topic: &str, partition: i32, anchor: OffsetAnchor) -> Result<i64> {
        let (oldest, newest) = self
            .meta
            .fetch_watermarks(topic, partition, METADATA_TIMEOUT)?;
        match anchor {
            OffsetAnchor::Oldest => Ok(oldest),
            OffsetAnchor::Newest => Ok(newest),
            OffsetAnchor::At(instant) => {
                let mut query = TopicPartitionList::new();
                query.add_partition_offset(
                    topic,
                    partition,
                    Offset::Offset(instant.timestamp_millis()),
                )?;
                let resolved = self.meta.offsets_for_times(query, METADATA_TIMEOUT)?;
                let elem = resolved.find_partition(topic, partition).ok_or_else(|| {
                    Error::UnknownPartition {
                        topic: topic.to_string(),
                        partition,
                    }
                })?;
                match elem.offset() {
                    Offset::Offset(offset) => Ok(offset),
                    // No message at or after the timestamp: anchor past the end.
                    _ => Ok(newest),
                }
            }
        }
    }

    async fn open_cursor(
        &self,
        topic: &str,
        partition: i32,
        start: StartPosition,
    ) -> Result<Box<dyn PartitionCursor>> {
        let consumer: StreamConsumer = base_config(&self.config, self.isolation)
            .set("group.id", anonymous_group_id())
            .create()?;
        let offset = match start {
            StartPosition::Offset(offset) => Offset::Offset(offset),
            StartPosition::Newest => Offset::End,
        };
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(topic, partition, offset)?;
        consumer.assign(&assignment)?;
        debug!("opened cursor on {topic}/{partition} at {start:?}");
        Ok(Box::new(KafkaCursor { consumer }))
    }

    async fn join_group(
        &self,
        topic: &str,
        group: &str,
        from_beginning: bool,
    ) -> Result<Box<dyn GroupSession>> {
        let consumer: StreamConsumer = base_config(&self.config, self.isolation)
            .set("group.id", group)
            .set(
                "auto.offset.reset",
                if from_beginning { "earliest" } else { "latest" },
            )
            .create()?;
        consumer.subscribe(&[topic])?;
        debug!("joined group {group} on topic {topic}");
        Ok(Box::new(KafkaGroupSession {
            topic: topic.to_string(),
            consumer,
        }))
    }
}

struct KafkaCursor {
    consumer: StreamConsumer,
}

#[async_trait]
impl PartitionCursor for KafkaCursor {
    async fn recv(&mut self) -> Result<Message> {
        let borrowed = self.consumer.recv().await?;
        Ok(to_message(&borrowed))
    }

    async fn close(&mut self) -> Result<()> {
        self.consumer.unassign()?;
        Ok(())
    }
}

struct KafkaGroupSession {
    topic: String,
    consumer: StreamConsumer,
}

#[async_trait]
impl GroupSession for KafkaGroupSession {
    async fn recv(&mut self) -> Result<Message> {
        let borrowed = self.consumer.recv().await?;
        Ok(to_message(&borrowed))
    }

    fn commit(&self, partition: i32, offset: i64) -> Result<()> {
        let mut committed = TopicPartitionList::new();
        committed.add_partition_offset(&self.topic, partition, Offset::Offset(offset + 1))?;
        self.consumer
            .commit(&committed, rdkafka::consumer::CommitMode::Async)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.consumer.unsubscribe();
        Ok(())
    }
}

fn to_message(borrowed: &rdkafka::message::BorrowedMessage<'_>) -> Message {
    let headers = borrowed
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| Header {
                    key: h.key.to_string(),
                    value: h.value.map(|v| v.to_vec()),
                })
                .collect()
        })
        .unwrap_or_default();
    let timestamp = borrowed
        .timestamp()
        .to_millis()
        .and_then(DateTime::from_timestamp_millis);
    Message {
        topic: borrowed.topic().to_string(),
        partition: borrowed.partition(),
        offset: borrowed.offset(),
        key: borrowed.key().map(<[u8]>::to_vec),
        value: borrowed.payload().map(<[u8]>::to_vec),
        headers,
        timestamp,
    }
}
