//! The probe-then-decode deserializer chain.
//!
//! Candidates are tried in fixed priority order: each is asked
//! `can_deserialize` (a cheap structural probe; registry lookups that fail
//! downgrade to "cannot handle") and the first that accepts performs the
//! actual decode. Decode failures from the selected member are real errors;
//! by then the payload claimed to be in that member's format.
//!
//! `build_chain` appends the default raw-bytes deserializer last, so a built
//! chain always produces some output.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bytes::DefaultDeserializer;
use crate::error::{Error, Result};
use crate::payload::{DeserializedPayload, Encoding};
use crate::proto::parser::ProtoSchema;
use crate::proto::{ProtobufDeserializer, SchemaRegistryProtobufDeserializer};
use crate::registry::SchemaRegistry;
use crate::{SchemaRegistryAvroDeserializer, SchemaRegistryJsonDeserializer};

/// One member of a deserializer chain.
#[async_trait]
pub trait Deserializer: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Cheap structural probe: can this member decode the payload?
    async fn can_deserialize(&self, payload: &[u8]) -> bool;

    /// Decode the payload. Only called after a successful probe.
    async fn deserialize(&self, payload: &[u8]) -> Result<DeserializedPayload>;
}

/// An ordered list of deserializers with first-match dispatch.
pub struct DeserializerChain {
    members: Vec<Box<dyn Deserializer>>,
}

impl DeserializerChain {
    pub fn new(members: Vec<Box<dyn Deserializer>>) -> Self {
        Self { members }
    }

    /// Decode one key or value. `None` payloads stay `None` (tombstones).
    pub async fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<DeserializedPayload>> {
        let Some(payload) = payload else {
            return Ok(None);
        };
        for member in &self.members {
            if member.can_deserialize(payload).await {
                tracing::trace!("payload accepted by {}", member.name());
                return member.deserialize(payload).await.map(Some);
            }
        }
        Err(Error::Exhausted)
    }
}

/// Inputs for building one chain (key and value get separate chains).
pub struct ChainConfig {
    /// Output encoding for the terminal raw-bytes member
    pub encoding: Encoding,
    /// Schema registry, when configured
    pub registry: Option<Arc<dyn SchemaRegistry>>,
    /// Message type name for bare protobuf decoding
    pub proto_type: Option<String>,
    /// `.proto` files backing `proto_type`
    pub proto_files: Vec<PathBuf>,
}

/// Build the chain for one target in priority order:
/// registry Avro → registry Protobuf → registry JSON → bare protobuf → bytes.
pub fn build_chain(config: &ChainConfig) -> Result<DeserializerChain> {
    let mut members: Vec<Box<dyn Deserializer>> = Vec::new();

    if let Some(registry) = &config.registry {
        members.push(Box::new(SchemaRegistryAvroDeserializer::new(Arc::clone(
            registry,
        ))));
        members.push(Box::new(SchemaRegistryProtobufDeserializer::new(
            Arc::clone(registry),
        )));
        members.push(Box::new(SchemaRegistryJsonDeserializer::new(Arc::clone(
            registry,
        ))));
    }

    if let Some(proto_type) = &config.proto_type {
        let schema = Arc::new(ProtoSchema::from_files(&config.proto_files)?);
        members.push(Box::new(ProtobufDeserializer::new(schema, proto_type)?));
    }

    members.push(Box::new(DefaultDeserializer::new(config.encoding)));
    Ok(DeserializerChain::new(members))
}
