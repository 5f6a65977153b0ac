//! Broker client abstraction for kaftail.
//!
//! This crate provides:
//! - The `Message` type and offset/position value types shared across kaftail
//! - The `BrokerClient` capability trait (partition listing, offset queries,
//!   partition cursors, consumer-group sessions)
//! - `KafkaBroker`, the rdkafka-backed implementation
//!
//! The consumption pipeline only ever talks to the traits defined here, so it
//! can be driven by in-memory implementations in tests without a live broker.

pub mod client;
pub mod error;
pub mod kafka;
pub mod message;

pub use client::{BrokerClient, GroupSession, PartitionCursor};
pub use error::{Error, Result};
pub use kafka::{BrokerConfig, KafkaBroker};
pub use message::{Header, IsolationLevel, Message, OffsetAnchor, StartPosition};
