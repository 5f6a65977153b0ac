//! Error types for the codec crate.

use thiserror::Error;

/// Errors that can occur during deserialization or registry lookups.
#[derive(Error, Debug)]
pub enum Error {
    #[error("schema registry request failed: {0}")]
    Registry(#[from] reqwest::Error),

    #[error("schema registry returned {status} for {path}: {message}")]
    RegistryStatus {
        status: u16,
        path: String,
        message: String,
    },

    #[error("no schema registry configured")]
    NoRegistry,

    #[error("invalid schema-registry wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Avro decoding error: {0}")]
    Avro(String),

    #[error("JSON decoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protobuf parse error: {0}")]
    ProtobufParse(String),

    #[error("Protobuf decoding error: {0}")]
    ProtobufDecode(String),

    #[error("message type not found in schema: {0}")]
    MessageTypeNotFound(String),

    #[error("no deserializer accepted the payload")]
    Exhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
