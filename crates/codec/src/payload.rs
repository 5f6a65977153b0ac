//! Deserialized payload types.

use clap::ValueEnum;

/// The output of exactly one deserializer in a chain. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializedPayload {
    /// Rendered payload bytes (decoded JSON text for schema-backed formats,
    /// plain/hex/base64 text for raw bytes)
    pub data: Vec<u8>,
    /// Short schema descriptor (message type or format name), when known
    pub schema: Option<String>,
    /// Schema-registry id the payload was decoded with, when applicable
    pub schema_id: Option<u32>,
}

impl DeserializedPayload {
    /// A payload with no schema information attached.
    pub fn plain(data: Vec<u8>) -> Self {
        Self {
            data,
            schema: None,
            schema_id: None,
        }
    }

    /// The rendered data as text, when it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Output encoding for raw (schema-less) payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Encoding {
    /// UTF-8 text passes through; binary data is hex encoded
    #[default]
    Auto,
    /// Pass bytes through unmodified
    Plain,
    /// Hex encode
    Hex,
    /// Base64 encode (standard alphabet, padded)
    Base64,
}
