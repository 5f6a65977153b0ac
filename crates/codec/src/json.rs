//! Schema-registry JSON-schema deserialization.
//!
//! JSON-schema payloads carry the wire-format prefix followed by plain JSON
//! text. The schema itself only matters for the probe (is this id a JSON
//! schema); the body decodes with serde alone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chain::Deserializer;
use crate::error::{Error, Result};
use crate::payload::DeserializedPayload;
use crate::registry::{SchemaRegistry, SchemaType};
use crate::wire;

pub struct SchemaRegistryJsonDeserializer {
    registry: Arc<dyn SchemaRegistry>,
}

impl SchemaRegistryJsonDeserializer {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Deserializer for SchemaRegistryJsonDeserializer {
    fn name(&self) -> &'static str {
        "schema-registry-json"
    }

    async fn can_deserialize(&self, payload: &[u8]) -> bool {
        let Some((id, _)) = wire::schema_id(payload) else {
            return false;
        };
        match self.registry.schema_by_id(id).await {
            Ok(schema) => schema.schema_type == SchemaType::Json,
            Err(e) => {
                debug!("schema lookup for id {id} failed during probe: {e}");
                false
            }
        }
    }

    async fn deserialize(&self, payload: &[u8]) -> Result<DeserializedPayload> {
        let (id, body) = wire::schema_id(payload).ok_or_else(|| {
            Error::InvalidWireFormat("payload lost its prefix after probing".to_string())
        })?;
        // Parse to validate, then re-serialize compactly
        let value: serde_json::Value = serde_json::from_slice(body)?;
        Ok(DeserializedPayload {
            data: serde_json::to_vec(&value)?,
            schema: Some("json".to_string()),
            schema_id: Some(id),
        })
    }
}
