//! Error types for the consumption pipeline.

use thiserror::Error;

/// Errors that can occur while setting up or running a consumption pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected flag combinations and malformed flag values; always detected
    /// before any consumer starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("broker error: {0}")]
    Broker(#[from] kaftail_broker::Error),

    #[error("failed to deserialize message at {partition}/{offset}: {source}")]
    Deserialize {
        partition: i32,
        offset: i64,
        #[source]
        source: kaftail_codec::Error,
    },

    #[error("codec setup error: {0}")]
    Codec(#[from] kaftail_codec::Error),

    #[error("sink error: {0}")]
    Sink(#[source] anyhow::Error),

    #[error("consumer task panicked: {0}")]
    Task(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
