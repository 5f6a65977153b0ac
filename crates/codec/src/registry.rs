//! Schema registry client.
//!
//! `SchemaRegistry` is the capability trait the deserializers consume;
//! `HttpSchemaRegistry` implements it against the Confluent REST API.
//!
//! Lookups are cached per client instance (schema-by-id and
//! latest-by-subject), so repeated ids within one invocation cost one HTTP
//! round-trip. The caches are owned by the instance, not process-wide.

use std::collections::HashMap;

use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Serialization format of a registered schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Avro,
    Protobuf,
    Json,
}

impl SchemaType {
    fn from_registry(name: Option<&str>) -> Self {
        // The registry omits the field for Avro, its original format.
        match name {
            Some("PROTOBUF") => SchemaType::Protobuf,
            Some("JSON") => SchemaType::Json,
            _ => SchemaType::Avro,
        }
    }
}

/// A schema fetched from the registry.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    pub id: u32,
    pub schema: String,
    pub schema_type: SchemaType,
    pub subject: Option<String>,
    pub version: Option<u32>,
}

/// Read-side schema registry operations.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn schema_by_id(&self, id: u32) -> Result<RegisteredSchema>;
    async fn schema_by_version(&self, subject: &str, version: u32) -> Result<RegisteredSchema>;
    async fn latest_schema(&self, subject: &str) -> Result<RegisteredSchema>;
    async fn subjects(&self) -> Result<Vec<String>>;
}

/// Schema registry connection configuration.
#[derive(Debug, Clone, Parser)]
pub struct RegistryConfig {
    /// Schema registry base URL (enables registry-aware deserialization)
    #[clap(long, env = "KAFTAIL_SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,
}

/// Confluent REST API client with per-instance caches.
pub struct HttpSchemaRegistry {
    base_url: String,
    client: reqwest::Client,
    by_id: Mutex<HashMap<u32, RegisteredSchema>>,
    latest_by_subject: Mutex<HashMap<String, RegisteredSchema>>,
}

#[derive(Deserialize)]
struct SchemaByIdResponse {
    schema: String,
    #[serde(rename = "schemaType")]
    schema_type: Option<String>,
}

#[derive(Deserialize)]
struct SubjectVersionResponse {
    subject: String,
    id: u32,
    version: u32,
    schema: String,
    #[serde(rename = "schemaType")]
    schema_type: Option<String>,
}

impl HttpSchemaRegistry {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            by_id: Mutex::new(HashMap::new()),
            latest_by_subject: Mutex::new(HashMap::new()),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::RegistryStatus {
                status: status.as_u16(),
                path: path.to_string(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn schema_by_id(&self, id: u32) -> Result<RegisteredSchema> {
        if let Some(cached) = self.by_id.lock().await.get(&id) {
            return Ok(cached.clone());
        }
        let response: SchemaByIdResponse = self.get(&format!("/schemas/ids/{id}")).await?;
        let schema = RegisteredSchema {
            id,
            schema_type: SchemaType::from_registry(response.schema_type.as_deref()),
            schema: response.schema,
            subject: None,
            version: None,
        };
        debug!("fetched schema id {id} ({:?})", schema.schema_type);
        self.by_id.lock().await.insert(id, schema.clone());
        Ok(schema)
    }

    async fn schema_by_version(&self, subject: &str, version: u32) -> Result<RegisteredSchema> {
        let response: SubjectVersionResponse = self
            .get(&format!("/subjects/{subject}/versions/{version}"))
            .await?;
        Ok(registered(response))
    }

    async fn latest_schema(&self, subject: &str) -> Result<RegisteredSchema> {
        if let Some(cached) = self.latest_by_subject.lock().await.get(subject) {
            return Ok(cached.clone());
        }
        let response: SubjectVersionResponse = self
            .get(&format!("/subjects/{subject}/versions/latest"))
            .await?;
        let schema = registered(response);
        self.latest_by_subject
            .lock()
            .await
            .insert(subject.to_string(), schema.clone());
        Ok(schema)
    }

    async fn subjects(&self) -> Result<Vec<String>> {
        self.get("/subjects").await
    }
}

fn registered(response: SubjectVersionResponse) -> RegisteredSchema {
    RegisteredSchema {
        id: response.id,
        schema_type: SchemaType::from_registry(response.schema_type.as_deref()),
        schema: response.schema,
        subject: Some(response.subject),
        version: Some(response.version),
    }
}
