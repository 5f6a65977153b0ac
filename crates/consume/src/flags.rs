//! Per-invocation consumption configuration.
//!
//! `ConsumeFlags` is created once from CLI input and read-only for the
//! lifetime of the pipeline. Validation of flag combinations happens here,
//! before any consumer starts; a rejected combination never produces partial
//! output.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use kaftail_broker::IsolationLevel;
use kaftail_codec::Encoding;

use crate::error::{Error, Result};
use crate::sink::OutputFormat;

/// Flags controlling one consume invocation.
#[derive(Debug, Clone, Parser)]
pub struct ConsumeFlags {
    /// Topic to consume from
    #[clap(long)]
    pub topic: String,

    /// Consumer group id (broker-managed offsets and assignment)
    #[clap(long)]
    pub group: Option<String>,

    /// Partitions to consume (comma-separated; default: all)
    #[clap(long, value_delimiter = ',')]
    pub partitions: Vec<i32>,

    /// Explicit start offset as partition=offset (repeatable)
    #[clap(long = "offset", value_name = "PARTITION=OFFSET")]
    pub offsets: Vec<String>,

    /// Start from the oldest available offset
    #[clap(long)]
    pub from_beginning: bool,

    /// Emit only the most recent N messages per partition, oldest first
    #[clap(long, default_value_t = 0, value_name = "N")]
    pub tail: u32,

    /// Exit once caught up instead of waiting for new messages
    #[clap(long)]
    pub exit: bool,

    /// Stop after emitting this many messages
    #[clap(long, value_name = "N")]
    pub max_messages: Option<u64>,

    /// Consume messages produced at or after this RFC 3339 instant (requires --exit)
    #[clap(long, value_name = "TIMESTAMP")]
    pub from_timestamp: Option<String>,

    /// Stop at the first message produced at or after this RFC 3339 instant (requires --exit)
    #[clap(long, value_name = "TIMESTAMP")]
    pub to_timestamp: Option<String>,

    /// Key output encoding for schema-less payloads
    #[clap(long, value_enum, default_value_t = Encoding::Auto)]
    pub key_encoding: Encoding,

    /// Value output encoding for schema-less payloads
    #[clap(long, value_enum, default_value_t = Encoding::Auto)]
    pub value_encoding: Encoding,

    /// Protobuf message type for decoding keys (with --proto-file)
    #[clap(long, value_name = "TYPE")]
    pub key_proto_type: Option<String>,

    /// Protobuf message type for decoding values (with --proto-file)
    #[clap(long, value_name = "TYPE")]
    pub value_proto_type: Option<String>,

    /// .proto schema file (repeatable)
    #[clap(long = "proto-file", value_name = "PATH")]
    pub proto_files: Vec<PathBuf>,

    /// Only emit messages whose key matches this glob
    #[clap(long, value_name = "GLOB")]
    pub filter_key: Option<String>,

    /// Only emit messages whose value matches this glob
    #[clap(long, value_name = "GLOB")]
    pub filter_value: Option<String>,

    /// Only emit messages with a header matching KEY=GLOB (repeatable)
    #[clap(long = "filter-header", value_name = "KEY=GLOB")]
    pub filter_headers: Vec<String>,

    /// Transactional read isolation
    #[clap(long, value_enum, default_value_t = IsolationLevel::ReadCommitted)]
    pub isolation_level: IsolationLevel,

    /// Print message keys
    #[clap(long)]
    pub print_key: bool,

    /// Print message timestamps
    #[clap(long)]
    pub print_timestamps: bool,

    /// Print message headers
    #[clap(long)]
    pub print_headers: bool,

    /// Print partition and offset
    #[clap(long)]
    pub print_partitions: bool,

    /// Print schema ids and names when a registry deserializer decoded
    #[clap(long)]
    pub print_schema: bool,

    /// Output mode
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl ConsumeFlags {
    /// Reject invalid flag combinations and malformed values. Called before
    /// any consumer starts.
    pub fn validate(&self) -> Result<()> {
        if self.group.is_some() {
            if self.exit {
                return Err(Error::Config(
                    "--group cannot be combined with --exit".to_string(),
                ));
            }
            if self.tail > 0 {
                return Err(Error::Config(
                    "--group cannot be combined with --tail".to_string(),
                ));
            }
            if !self.partitions.is_empty() {
                return Err(Error::Config(
                    "--group cannot be combined with --partitions".to_string(),
                ));
            }
            if !self.offsets.is_empty() {
                return Err(Error::Config(
                    "--group cannot be combined with --offset".to_string(),
                ));
            }
        }
        if self.tail > 0 && !self.offsets.is_empty() {
            return Err(Error::Config(
                "--tail cannot be combined with --offset".to_string(),
            ));
        }
        if (self.from_timestamp.is_some() || self.to_timestamp.is_some()) && !self.exit {
            return Err(Error::Config(
                "--from-timestamp/--to-timestamp require --exit".to_string(),
            ));
        }
        if self.exit
            && !self.has_timestamps()
            && self.offsets.is_empty()
            && !self.from_beginning
        {
            return Err(Error::Config(
                "--exit requires --from-beginning, --offset, or a timestamp range".to_string(),
            ));
        }
        self.parsed_offsets()?;
        self.from_ts()?;
        self.to_ts()?;
        Ok(())
    }

    pub fn has_timestamps(&self) -> bool {
        self.from_timestamp.is_some() || self.to_timestamp.is_some()
    }

    /// Parse the `partition=offset` flags.
    pub fn parsed_offsets(&self) -> Result<HashMap<i32, i64>> {
        let mut parsed = HashMap::new();
        for raw in &self.offsets {
            let (partition, offset) = raw.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid --offset {raw:?}, expected partition=offset"))
            })?;
            let partition: i32 = partition.trim().parse().map_err(|_| {
                Error::Config(format!("invalid partition in --offset {raw:?}"))
            })?;
            let offset: i64 = offset.trim().parse().map_err(|_| {
                Error::Config(format!("invalid offset in --offset {raw:?}"))
            })?;
            if offset < 0 {
                return Err(Error::Config(format!(
                    "offset must be non-negative in --offset {raw:?}"
                )));
            }
            parsed.insert(partition, offset);
        }
        Ok(parsed)
    }

    pub fn from_ts(&self) -> Result<Option<DateTime<Utc>>> {
        parse_timestamp(self.from_timestamp.as_deref())
    }

    pub fn to_ts(&self) -> Result<Option<DateTime<Utc>>> {
        parse_timestamp(self.to_timestamp.as_deref())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| Error::Config(format!("invalid timestamp {raw:?}: {e}")))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_flags() -> ConsumeFlags {
        ConsumeFlags::parse_from(["consume", "--topic", "events"])
    }

    #[test]
    fn plain_streaming_flags_validate() {
        assert!(base_flags().validate().is_ok());
    }

    #[test]
    fn group_rejects_bounded_and_partition_flags() {
        let mut flags = base_flags();
        flags.group = Some("readers".to_string());
        flags.exit = true;
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        let mut flags = base_flags();
        flags.group = Some("readers".to_string());
        flags.tail = 5;
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        let mut flags = base_flags();
        flags.group = Some("readers".to_string());
        flags.partitions = vec![0, 1];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        let mut flags = base_flags();
        flags.group = Some("readers".to_string());
        flags.offsets = vec!["0=10".to_string()];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        // All of them together is still one clear error
        let mut flags = base_flags();
        flags.group = Some("readers".to_string());
        flags.exit = true;
        flags.tail = 5;
        flags.partitions = vec![0];
        flags.offsets = vec!["0=10".to_string()];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn tail_rejects_explicit_offsets() {
        let mut flags = base_flags();
        flags.tail = 3;
        flags.offsets = vec!["0=10".to_string()];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn exit_needs_a_start_point() {
        let mut flags = base_flags();
        flags.exit = true;
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        let mut flags = base_flags();
        flags.exit = true;
        flags.from_beginning = true;
        assert!(flags.validate().is_ok());

        let mut flags = base_flags();
        flags.exit = true;
        flags.offsets = vec!["0=3".to_string()];
        assert!(flags.validate().is_ok());
    }

    #[test]
    fn timestamps_require_exit() {
        let mut flags = base_flags();
        flags.from_timestamp = Some("2024-06-01T00:00:00Z".to_string());
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        flags.exit = true;
        assert!(flags.validate().is_ok());
    }

    #[test]
    fn malformed_offsets_are_rejected() {
        let mut flags = base_flags();
        flags.offsets = vec!["nonsense".to_string()];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));

        let mut flags = base_flags();
        flags.offsets = vec!["0=-4".to_string()];
        assert!(matches!(flags.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn offsets_parse_into_a_map() {
        let mut flags = base_flags();
        flags.offsets = vec!["0=10".to_string(), "3=250".to_string()];
        let parsed = flags.parsed_offsets().unwrap();
        assert_eq!(parsed[&0], 10);
        assert_eq!(parsed[&3], 250);
    }

    #[test]
    fn timestamps_parse_as_rfc3339() {
        let mut flags = base_flags();
        flags.exit = true;
        flags.from_timestamp = Some("2024-06-01T12:30:00+02:00".to_string());
        let parsed = flags.from_ts().unwrap().unwrap();
        assert_eq!(parsed.timestamp(), 1717237800);

        flags.from_timestamp = Some("june first".to_string());
        assert!(flags.from_ts().is_err());
    }
}
