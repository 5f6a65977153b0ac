//! Protobuf parsing and decoding.
//!
//! This module provides:
//! - Schema parsing from .proto files (`parser`)
//! - Runtime decoding of protobuf messages (`decoder`)
//! - The bare-descriptor and schema-registry protobuf deserializers

pub mod decoder;
pub mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chain::Deserializer;
use crate::error::{Error, Result};
use crate::payload::DeserializedPayload;
use crate::registry::{SchemaRegistry, SchemaType};
use crate::wire;
use decoder::ProtoDecoder;
use parser::{ProtoMessageDescriptor, ProtoSchema};

/// Decodes payloads with a user-supplied `.proto` schema and message type.
///
/// Used when no schema registry is configured: the operator names the message
/// type on the command line and supplies the descriptor files. The probe
/// always succeeds because the deserializer only exists when the type flag
/// was given; a payload that does not match the named type is a decode error.
pub struct ProtobufDeserializer {
    decoder: ProtoDecoder,
    message_type: String,
}

impl ProtobufDeserializer {
    pub fn new(schema: Arc<ProtoSchema>, message_type: &str) -> Result<Self> {
        // Fail fast on unknown types, before any message arrives
        schema.get_message(message_type)?;
        Ok(Self {
            decoder: ProtoDecoder::new(schema),
            message_type: message_type.to_string(),
        })
    }
}

#[async_trait]
impl Deserializer for ProtobufDeserializer {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    async fn can_deserialize(&self, _payload: &[u8]) -> bool {
        true
    }

    async fn deserialize(&self, payload: &[u8]) -> Result<DeserializedPayload> {
        let message = self.decoder.decode(&self.message_type, payload)?;
        Ok(DeserializedPayload {
            data: serde_json::to_vec(&message.to_json())?,
            schema: Some(message.message_type),
            schema_id: None,
        })
    }
}

/// Decodes schema-registry framed protobuf payloads.
///
/// The registry serves the `.proto` source for the schema id carried in the
/// wire-format prefix; parsed schemas are cached per id. After the prefix,
/// registry protobuf payloads carry a varint-encoded message-index path
/// selecting the message type within the schema file.
pub struct SchemaRegistryProtobufDeserializer {
    registry: Arc<dyn SchemaRegistry>,
    parsed: Mutex<HashMap<u32, Arc<ProtoSchema>>>,
}

impl SchemaRegistryProtobufDeserializer {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            parsed: Mutex::new(HashMap::new()),
        }
    }

    async fn schema_for(&self, id: u32) -> Result<Arc<ProtoSchema>> {
        if let Some(schema) = self.parsed.lock().await.get(&id) {
            return Ok(Arc::clone(schema));
        }
        let registered = self.registry.schema_by_id(id).await?;
        let schema = Arc::new(ProtoSchema::from_string(&registered.schema)?);
        self.parsed.lock().await.insert(id, Arc::clone(&schema));
        Ok(schema)
    }
}

#[async_trait]
impl Deserializer for SchemaRegistryProtobufDeserializer {
    fn name(&self) -> &'static str {
        "schema-registry-protobuf"
    }

    async fn can_deserialize(&self, payload: &[u8]) -> bool {
        let Some((id, _)) = wire::schema_id(payload) else {
            return false;
        };
        match self.registry.schema_by_id(id).await {
            Ok(schema) => schema.schema_type == SchemaType::Protobuf,
            Err(e) => {
                // Lookup failures mean "not ours", not "abort the stream"
                debug!("schema lookup for id {id} failed during probe: {e}");
                false
            }
        }
    }

    async fn deserialize(&self, payload: &[u8]) -> Result<DeserializedPayload> {
        let (id, body) = wire::schema_id(payload).ok_or_else(|| {
            Error::InvalidWireFormat("payload lost its prefix after probing".to_string())
        })?;
        let schema = self.schema_for(id).await?;
        let (descriptor, body) = resolve_message_index(&schema, body)?;
        let message = ProtoDecoder::new(Arc::clone(&schema)).decode_message(&descriptor, body)?;
        Ok(DeserializedPayload {
            data: serde_json::to_vec(&message.to_json())?,
            schema: Some(message.message_type),
            schema_id: Some(id),
        })
    }
}

/// Resolve the message-index prefix of a registry protobuf body.
///
/// The prefix is a varint count followed by that many varint indexes; the
/// count 0 is shorthand for the first top-level message. Only top-level
/// indexes are supported here.
fn resolve_message_index<'a>(
    schema: &ProtoSchema,
    body: &'a [u8],
) -> Result<(ProtoMessageDescriptor, &'a [u8])> {
    let (count, mut rest) = read_varint(body)?;
    if count == 0 {
        return Ok((schema.message_at(0)?.clone(), rest));
    }
    let mut indexes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (index, after) = read_varint(rest)?;
        indexes.push(index as usize);
        rest = after;
    }
    if indexes.len() > 1 {
        return Err(Error::ProtobufDecode(format!(
            "nested message indexes are not supported: {indexes:?}"
        )));
    }
    Ok((schema.message_at(indexes[0])?.clone(), rest))
}

fn read_varint(data: &[u8]) -> Result<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, byte) in data.iter().enumerate() {
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &data[i + 1..]));
        }
        shift += 7;
        if shift >= 64 {
            break;
        }
    }
    Err(Error::ProtobufDecode(
        "truncated message-index prefix".to_string(),
    ))
}
