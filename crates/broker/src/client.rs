//! Broker capability traits.
//!
//! The consumption pipeline depends only on these traits. `KafkaBroker`
//! implements them over rdkafka; tests implement them over in-memory data.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, OffsetAnchor, StartPosition};

/// Read-side client for a single cluster.
///
/// Implementations must be safe for concurrent use: one `BrokerClient` is
/// shared across all partition tasks of an invocation.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// List the partition ids of a topic.
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>>;

    /// Resolve an offset anchor for one partition.
    async fn offset(&self, topic: &str, partition: i32, anchor: OffsetAnchor) -> Result<i64>;

    /// Open a read cursor on one partition at the given start position.
    async fn open_cursor(
        &self,
        topic: &str,
        partition: i32,
        start: StartPosition,
    ) -> Result<Box<dyn PartitionCursor>>;

    /// Join a consumer group for a topic. The broker owns partition
    /// assignment and committed offsets for the group; `from_beginning`
    /// only applies when the group has no committed offsets yet.
    async fn join_group(
        &self,
        topic: &str,
        group: &str,
        from_beginning: bool,
    ) -> Result<Box<dyn GroupSession>>;
}

/// A read cursor over a single partition.
///
/// `recv` has no internal timeout; callers that need an idle heuristic wrap
/// it in their own. Cancellation is the caller's concern: dropping a pending
/// `recv` future is always safe.
#[async_trait]
pub trait PartitionCursor: Send {
    /// Receive the next message. Pends until one is available.
    async fn recv(&mut self) -> Result<Message>;

    /// Release the cursor's underlying resources.
    async fn close(&mut self) -> Result<()>;
}

/// A consumer-group session.
///
/// The session transparently survives group rebalances; `recv` yields
/// messages from whatever partitions are currently assigned.
#[async_trait]
pub trait GroupSession: Send {
    /// Receive the next message from any assigned partition.
    async fn recv(&mut self) -> Result<Message>;

    /// Mark a message as consumed. Callers invoke this immediately after
    /// handing the message off, so the group's committed offset can advance
    /// past messages that later fail downstream (at-most-once hand-off).
    fn commit(&self, partition: i32, offset: i64) -> Result<()>;

    /// Leave the group and release the session.
    async fn close(&mut self) -> Result<()>;
}
