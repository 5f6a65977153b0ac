//! Error types for the broker crate.

use thiserror::Error;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug)]
pub enum Error {
    #[error("kafka client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: i32 },

    #[error("metadata error for topic {topic}: {message}")]
    Metadata { topic: String, message: String },

    #[error("invalid broker configuration: {0}")]
    Config(String),
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
