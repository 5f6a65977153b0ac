//! Built-in output sinks.
//!
//! `TextSink` renders one row per message; `JsonSink` renders one JSON
//! object per line. Which fields appear is driven by the print toggles of
//! the invocation.

use async_trait::async_trait;
use kaftail_consume::{ConsumeFlags, RenderedMessage, Sink};

/// Which optional fields the sinks include.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOpts {
    pub key: bool,
    pub timestamps: bool,
    pub headers: bool,
    pub partitions: bool,
    pub schema: bool,
}

impl From<&ConsumeFlags> for PrintOpts {
    fn from(flags: &ConsumeFlags) -> Self {
        Self {
            key: flags.print_key,
            timestamps: flags.print_timestamps,
            headers: flags.print_headers,
            partitions: flags.print_partitions,
            schema: flags.print_schema,
        }
    }
}

/// One row per message on stdout.
pub struct TextSink {
    opts: PrintOpts,
}

impl TextSink {
    pub fn new(opts: PrintOpts) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl Sink for TextSink {
    async fn emit(&mut self, message: &RenderedMessage) -> anyhow::Result<()> {
        let mut columns = Vec::new();
        if self.opts.partitions {
            columns.push(format!("{}/{}", message.partition, message.offset));
        }
        if self.opts.timestamps {
            let rendered = message
                .timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            columns.push(rendered);
        }
        if self.opts.key {
            columns.push(payload_text(message.key.as_ref()));
        }
        columns.push(payload_text(message.value.as_ref()));
        if self.opts.schema {
            if let Some(value) = &message.value {
                if let Some(id) = value.schema_id {
                    columns.push(format!("schema={id}"));
                }
            }
        }
        if self.opts.headers {
            for header in &message.headers {
                let value = header
                    .value
                    .as_deref()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default();
                columns.push(format!("{}={value}", header.key));
            }
        }
        println!("{}", columns.join("\t"));
        Ok(())
    }
}

/// One JSON object per message on stdout.
pub struct JsonSink {
    opts: PrintOpts,
}

impl JsonSink {
    pub fn new(opts: PrintOpts) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl Sink for JsonSink {
    async fn emit(&mut self, message: &RenderedMessage) -> anyhow::Result<()> {
        let mut object = serde_json::Map::new();
        object.insert("partition".to_string(), message.partition.into());
        object.insert("offset".to_string(), message.offset.into());
        if self.opts.timestamps {
            object.insert(
                "timestamp".to_string(),
                message
                    .timestamp
                    .map(|t| t.to_rfc3339().into())
                    .unwrap_or(serde_json::Value::Null),
            );
        }
        if self.opts.key {
            object.insert(
                "key".to_string(),
                message
                    .key
                    .as_ref()
                    .map(|k| payload_json(k))
                    .unwrap_or(serde_json::Value::Null),
            );
        }
        object.insert(
            "value".to_string(),
            message
                .value
                .as_ref()
                .map(|v| payload_json(v))
                .unwrap_or(serde_json::Value::Null),
        );
        if self.opts.schema {
            if let Some(id) = message.value.as_ref().and_then(|v| v.schema_id) {
                object.insert("schema_id".to_string(), id.into());
            }
            if let Some(schema) = message.value.as_ref().and_then(|v| v.schema.clone()) {
                object.insert("schema".to_string(), schema.into());
            }
        }
        if self.opts.headers {
            let headers: serde_json::Map<String, serde_json::Value> = message
                .headers
                .iter()
                .map(|h| {
                    let value = h
                        .value
                        .as_deref()
                        .map(|v| String::from_utf8_lossy(v).into_owned().into())
                        .unwrap_or(serde_json::Value::Null);
                    (h.key.clone(), value)
                })
                .collect();
            object.insert("headers".to_string(), headers.into());
        }
        println!("{}", serde_json::Value::Object(object));
        Ok(())
    }
}

fn payload_text(payload: Option<&kaftail_codec::DeserializedPayload>) -> String {
    match payload {
        Some(payload) => String::from_utf8_lossy(&payload.data).into_owned(),
        None => "<null>".to_string(),
    }
}

/// Schema-decoded payloads are JSON text already; embed them structurally.
fn payload_json(payload: &kaftail_codec::DeserializedPayload) -> serde_json::Value {
    if payload.schema.is_some() {
        if let Ok(value) = serde_json::from_slice(&payload.data) {
            return value;
        }
    }
    serde_json::Value::String(String::from_utf8_lossy(&payload.data).into_owned())
}
