//! The rendering seam.
//!
//! The pipeline calls a `Sink` once per surviving message, in the order the
//! orchestrator finalizes them (arrival order, or chronological order in tail
//! mode). Rendering itself lives outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use kaftail_broker::Header;
use kaftail_codec::DeserializedPayload;

/// A fully decoded message ready for rendering.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<DeserializedPayload>,
    pub value: Option<DeserializedPayload>,
    pub headers: Vec<Header>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Output mode for sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One row per message
    #[default]
    Text,
    /// One JSON object per message
    Json,
}

/// Receives decoded messages. Errors propagate and stop the pipeline the
/// same way deserialization errors do.
#[async_trait]
pub trait Sink: Send {
    async fn emit(&mut self, message: &RenderedMessage) -> anyhow::Result<()>;
}
