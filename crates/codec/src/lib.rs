//! Message deserialization for kaftail.
//!
//! This crate provides:
//! - The `Deserializer` trait and the probe-then-decode `DeserializerChain`
//! - A Confluent schema-registry REST client with per-instance caches
//! - Schema-registry Avro, Protobuf, and JSON-schema deserializers
//! - A bare-descriptor protobuf deserializer driven by `.proto` files parsed
//!   at runtime (no code generation)
//! - The default raw-bytes deserializer (UTF-8 probe, hex/base64/plain)
//!
//! A chain is built per target (key or value) from a `ChainConfig`; the
//! default deserializer is always appended last, so a chain never fails to
//! produce some output for a payload its earlier members decline.

pub mod bytes;
pub mod chain;
pub mod error;
pub mod json;
pub mod payload;
pub mod proto;
pub mod registry;
pub mod wire;

mod avro;

pub use avro::SchemaRegistryAvroDeserializer;
pub use bytes::DefaultDeserializer;
pub use chain::{build_chain, ChainConfig, Deserializer, DeserializerChain};
pub use error::{Error, Result};
pub use json::SchemaRegistryJsonDeserializer;
pub use payload::{DeserializedPayload, Encoding};
pub use proto::decoder::{ProtoDecoder, ProtoFieldValue, ProtoMessage};
pub use proto::parser::{
    ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType,
};
pub use proto::{ProtobufDeserializer, SchemaRegistryProtobufDeserializer};
pub use registry::{
    HttpSchemaRegistry, RegisteredSchema, RegistryConfig, SchemaRegistry, SchemaType,
};
