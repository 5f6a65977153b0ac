//! Consumption pipeline for kaftail.
//!
//! This crate turns "consume topic T under these flags" into a correctly
//! bounded, ordered, decoded, and terminated stream of messages:
//!
//! - `flags`: the immutable per-invocation configuration snapshot
//! - `offsets`: pure flag+metadata → per-partition offset window resolution
//! - `partition`: direct per-partition fan-out consumption
//! - `group`: consumer-group-coordinated consumption
//! - `filter`: glob predicates over key/value/headers
//! - `tail`: the bounded most-recent-N reordering buffer
//! - `pipeline`: the orchestrator wiring consumer → chain → filter → sink
//!
//! Two cancellation signals exist throughout (see `pipeline`): a root
//! *shutdown* token that aborts everything, and a narrower *stop* token that
//! tells producers to quit accepting new messages while the pipeline drains.

pub mod error;
pub mod filter;
pub mod flags;
pub mod group;
pub mod offsets;
pub mod partition;
pub mod pipeline;
pub mod sink;
pub mod tail;

pub use error::{Error, Result};
pub use filter::MessageFilter;
pub use flags::ConsumeFlags;
pub use offsets::{resolve, OffsetSpec, OffsetWindow, PartitionMeta, Resolution};
pub use pipeline::{run, Consumer};
pub use sink::{OutputFormat, RenderedMessage, Sink};
pub use tail::TailBuffer;
