//! kaftail library surface.
//!
//! The heavy lifting lives in the workspace crates:
//!
//! - `kaftail-broker`: broker capability traits + the rdkafka client
//! - `kaftail-codec`: deserializer chain and schema registry client
//! - `kaftail-consume`: the consumption pipeline
//!
//! This crate adds the CLI shell: the built-in sinks and the wiring helpers
//! shared between `main` and the end-to-end tests.

use std::sync::Arc;

use kaftail_codec::{build_chain, ChainConfig, DeserializerChain, HttpSchemaRegistry};
use kaftail_codec::{RegistryConfig, SchemaRegistry};
use kaftail_consume::ConsumeFlags;

pub mod sink;

// Re-export the workspace crates for convenience
pub use kaftail_broker as broker;
pub use kaftail_codec as codec;
pub use kaftail_consume as consume;

/// Build the key and value deserializer chains for one invocation.
///
/// Both chains share the registry client (and therefore its caches), but
/// differ in encoding overrides and protobuf message types.
pub fn build_chains(
    flags: &ConsumeFlags,
    registry: &RegistryConfig,
) -> kaftail_codec::Result<(DeserializerChain, DeserializerChain)> {
    let registry: Option<Arc<dyn SchemaRegistry>> = registry
        .schema_registry_url
        .as_deref()
        .map(|url| Arc::new(HttpSchemaRegistry::new(url)) as Arc<dyn SchemaRegistry>);

    let key_chain = build_chain(&ChainConfig {
        encoding: flags.key_encoding,
        registry: registry.clone(),
        proto_type: flags.key_proto_type.clone(),
        proto_files: flags.proto_files.clone(),
    })?;
    let value_chain = build_chain(&ChainConfig {
        encoding: flags.value_encoding,
        registry,
        proto_type: flags.value_proto_type.clone(),
        proto_files: flags.proto_files.clone(),
    })?;
    Ok((key_chain, value_chain))
}
