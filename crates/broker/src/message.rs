//! Message and offset value types.
//!
//! These are the raw wire-level types produced by the broker layer. Decoding
//! happens downstream; a `Message` is never mutated after creation.

use chrono::{DateTime, Utc};
use clap::ValueEnum;

/// A raw message read from a topic partition.
#[derive(Debug, Clone)]
pub struct Message {
    /// Topic the message was read from
    pub topic: String,
    /// Partition number
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Message value (if any; tombstones have none)
    pub value: Option<Vec<u8>>,
    /// Message headers in wire order
    pub headers: Vec<Header>,
    /// Broker- or producer-assigned timestamp (if available)
    pub timestamp: Option<DateTime<Utc>>,
}

/// A single message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Anchors for offset queries against a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAnchor {
    /// The oldest offset still available (low watermark)
    Oldest,
    /// The next offset that will be written (high watermark)
    Newest,
    /// The first offset with a timestamp at or after the given instant;
    /// resolves to the high watermark when no such message exists
    At(DateTime<Utc>),
}

/// Where a partition cursor starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// A concrete offset
    Offset(i64),
    /// Only messages produced after the cursor was opened
    Newest,
}

/// Visibility of transactional writes, passed through to the broker client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IsolationLevel {
    ReadCommitted,
    ReadUncommitted,
}

impl IsolationLevel {
    /// The librdkafka configuration value for this level.
    pub fn as_client_config(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::ReadUncommitted => "read_uncommitted",
        }
    }
}
