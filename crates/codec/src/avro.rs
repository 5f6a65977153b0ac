//! Schema-registry Avro deserialization.

use std::sync::Arc;

use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, Schema};
use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::chain::Deserializer;
use crate::error::{Error, Result};
use crate::payload::DeserializedPayload;
use crate::registry::{SchemaRegistry, SchemaType};
use crate::wire;

/// Decodes wire-format framed Avro payloads using registry schemas.
pub struct SchemaRegistryAvroDeserializer {
    registry: Arc<dyn SchemaRegistry>,
}

impl SchemaRegistryAvroDeserializer {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Deserializer for SchemaRegistryAvroDeserializer {
    fn name(&self) -> &'static str {
        "schema-registry-avro"
    }

    async fn can_deserialize(&self, payload: &[u8]) -> bool {
        let Some((id, _)) = wire::schema_id(payload) else {
            return false;
        };
        match self.registry.schema_by_id(id).await {
            Ok(schema) => schema.schema_type == SchemaType::Avro,
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
        let registered = self.registry.schema_by_id(id).await?;
        let schema = Schema::parse_str(&registered.schema)
            .map_err(|e| Error::Avro(format!("schema {id} failed to parse: {e}")))?;
        let mut reader = body;
        let value = from_avro_datum(&schema, &mut reader, None)
            .map_err(|e| Error::Avro(format!("datum does not match schema {id}: {e}")))?;
        Ok(DeserializedPayload {
            data: serde_json::to_vec(&avro_to_json(value))?,
            schema: Some("avro".to_string()),
            schema_id: Some(id),
        })
    }
}

/// Convert a decoded Avro value to JSON for rendering.
fn avro_to_json(value: AvroValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(b) => Value::Bool(b),
        AvroValue::Int(i) => Value::Number(i.into()),
        AvroValue::Long(i) => Value::Number(i.into()),
        AvroValue::Float(f) => serde_json::Number::from_f64(f64::from(f))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvroValue::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvroValue::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
        AvroValue::Fixed(_, b) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        AvroValue::String(s) => Value::String(s),
        AvroValue::Enum(_, symbol) => Value::String(symbol),
        AvroValue::Union(_, inner) => avro_to_json(*inner),
        AvroValue::Array(items) => Value::Array(items.into_iter().map(avro_to_json).collect()),
        AvroValue::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, avro_to_json(v)))
                .collect(),
        ),
        AvroValue::Record(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, avro_to_json(v)))
                .collect(),
        ),
        AvroValue::Date(days) => Value::Number(days.into()),
        AvroValue::TimeMillis(v) => Value::Number(v.into()),
        AvroValue::TimeMicros(v) => Value::Number(v.into()),
        AvroValue::TimestampMillis(v) => Value::Number(v.into()),
        AvroValue::TimestampMicros(v) => Value::Number(v.into()),
        // Logical types without a natural JSON mapping render via Debug
        other => Value::String(format!("{other:?}")),
    }
}
