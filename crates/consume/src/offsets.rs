//! Per-partition offset window resolution.
//!
//! `resolve` is pure: it sees only the flag snapshot (`OffsetSpec`) and the
//! already-fetched partition metadata, and produces either a window or a
//! skip. A bounded mode never yields a window that would leave a consumer
//! waiting forever: empty windows become skips.

use std::collections::HashMap;

use kaftail_broker::StartPosition;

use crate::error::{Error, Result};

/// Sentinel meaning "unbounded, keep streaming".
pub const UNBOUNDED: i64 = -1;

/// The consumption window for one partition.
///
/// `end` is inclusive: when it is non-negative, the partition consumer stops
/// after delivering a message with `offset >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetWindow {
    pub start: StartPosition,
    pub end: i64,
}

impl OffsetWindow {
    pub fn bounded(&self) -> bool {
        self.end != UNBOUNDED
    }
}

/// Offset-relevant subset of the consume flags.
#[derive(Debug, Clone, Default)]
pub struct OffsetSpec {
    pub exit: bool,
    pub from_beginning: bool,
    pub tail: u32,
    /// Explicit per-partition start offsets (`--offset partition=offset`)
    pub explicit: HashMap<i32, i64>,
    /// Whether a timestamp range was given (metadata then carries the
    /// resolved per-partition offsets)
    pub use_timestamps: bool,
}

impl OffsetSpec {
    /// Whether consumption is bounded (terminates once caught up).
    pub fn bounded(&self) -> bool {
        self.exit || self.tail > 0
    }
}

/// Metadata for one partition, fetched before resolution.
#[derive(Debug, Clone, Copy)]
pub struct PartitionMeta {
    pub partition: i32,
    /// Low watermark: oldest offset still available
    pub oldest: i64,
    /// High watermark: the next offset that will be written
    pub newest: i64,
    /// First offset at/after --from-timestamp, when one was given
    pub at_from_timestamp: Option<i64>,
    /// First offset at/after --to-timestamp, when one was given
    pub at_to_timestamp: Option<i64>,
}

/// Outcome of window resolution for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Do not start a consumer for this partition
    Skip,
    Consume(OffsetWindow),
}

/// Compute the offset window for one partition.
///
/// Flag combinations are tried in priority order: timestamp range, tail,
/// explicit offset, from-beginning, then interactive follow. Configuration
/// errors surface here as well so the resolver is testable on its own, but
/// the orchestrator rejects them before fetching any metadata.
pub fn resolve(spec: &OffsetSpec, meta: &PartitionMeta) -> Result<Resolution> {
    // Empty partitions cannot satisfy a bounded mode; waiting on them would
    // never terminate.
    if spec.bounded() && meta.newest == meta.oldest {
        return Ok(Resolution::Skip);
    }

    if spec.exit && spec.use_timestamps {
        let start = meta.at_from_timestamp.unwrap_or(meta.oldest).max(meta.oldest);
        let end = meta.at_to_timestamp.unwrap_or(meta.newest - 1);
        return Ok(window(StartPosition::Offset(start), end));
    }

    if spec.exit && spec.explicit.is_empty() && !spec.from_beginning {
        return Err(Error::Config(
            "--exit requires --from-beginning, --offset, or a timestamp range".to_string(),
        ));
    }

    if spec.tail > 0 && !spec.explicit.is_empty() {
        return Err(Error::Config(
            "--tail cannot be combined with --offset".to_string(),
        ));
    }

    if spec.tail > 0 {
        let start = meta.oldest.max(meta.newest - i64::from(spec.tail));
        return Ok(window(StartPosition::Offset(start), meta.newest - 1));
    }

    if let Some(&offset) = spec.explicit.get(&meta.partition) {
        let end = if spec.exit { meta.newest - 1 } else { UNBOUNDED };
        return Ok(window(StartPosition::Offset(offset), end));
    }

    if spec.from_beginning {
        let end = if spec.exit { meta.newest - 1 } else { UNBOUNDED };
        return Ok(window(StartPosition::Offset(meta.oldest), end));
    }

    if spec.exit {
        // Bounded mode without a start point for this partition (explicit
        // offsets named other partitions): nothing to deliver.
        return Ok(Resolution::Skip);
    }

    // Interactive follow: only new messages, forever.
    Ok(window(StartPosition::Newest, UNBOUNDED))
}

/// Build a window, collapsing empty bounded windows into skips.
fn window(start: StartPosition, end: i64) -> Resolution {
    if end != UNBOUNDED {
        if end < 0 {
            return Resolution::Skip;
        }
        if let StartPosition::Offset(start) = start {
            if start > end {
                return Resolution::Skip;
            }
        }
    }
    Resolution::Consume(OffsetWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(oldest: i64, newest: i64) -> PartitionMeta {
        PartitionMeta {
            partition: 0,
            oldest,
            newest,
            at_from_timestamp: None,
            at_to_timestamp: None,
        }
    }

    fn consumed(resolution: Resolution) -> OffsetWindow {
        match resolution {
            Resolution::Consume(window) => window,
            Resolution::Skip => panic!("expected a window, got a skip"),
        }
    }

    #[test]
    fn tail_takes_the_most_recent_n() {
        // Offsets 0..=9 exist: oldest=0, newest=10, tail=3 → window [7, 9]
        let spec = OffsetSpec {
            tail: 3,
            ..Default::default()
        };
        let window = consumed(resolve(&spec, &meta(0, 10)).unwrap());
        assert_eq!(window.start, StartPosition::Offset(7));
        assert_eq!(window.end, 9);
    }

    #[test]
    fn tail_clamps_to_the_oldest_available() {
        let spec = OffsetSpec {
            tail: 100,
            ..Default::default()
        };
        let window = consumed(resolve(&spec, &meta(5, 10)).unwrap());
        assert_eq!(window.start, StartPosition::Offset(5));
        assert_eq!(window.end, 9);
    }

    #[test]
    fn from_beginning_with_exit_is_bounded() {
        let spec = OffsetSpec {
            exit: true,
            from_beginning: true,
            ..Default::default()
        };
        let window = consumed(resolve(&spec, &meta(0, 5)).unwrap());
        assert_eq!(window.start, StartPosition::Offset(0));
        assert_eq!(window.end, 4);
        assert!(window.bounded());
    }

    #[test]
    fn from_beginning_without_exit_is_unbounded() {
        let spec = OffsetSpec {
            from_beginning: true,
            ..Default::default()
        };
        let window = consumed(resolve(&spec, &meta(2, 5)).unwrap());
        assert_eq!(window.start, StartPosition::Offset(2));
        assert_eq!(window.end, UNBOUNDED);
    }

    #[test]
    fn explicit_offset_wins_over_from_beginning() {
        let mut explicit = HashMap::new();
        explicit.insert(0, 3);
        let spec = OffsetSpec {
            exit: true,
            from_beginning: true,
            explicit,
            ..Default::default()
        };
        let window = consumed(resolve(&spec, &meta(0, 10)).unwrap());
        assert_eq!(window.start, StartPosition::Offset(3));
        assert_eq!(window.end, 9);
    }

    #[test]
    fn exit_without_a_start_point_is_a_config_error() {
        let spec = OffsetSpec {
            exit: true,
            ..Default::default()
        };
        assert!(matches!(
            resolve(&spec, &meta(0, 10)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn tail_with_explicit_offsets_is_a_config_error() {
        let mut explicit = HashMap::new();
        explicit.insert(0, 3);
        let spec = OffsetSpec {
            tail: 3,
            explicit,
            ..Default::default()
        };
        assert!(matches!(
            resolve(&spec, &meta(0, 10)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn empty_partitions_are_skipped_in_bounded_modes() {
        let spec = OffsetSpec {
            exit: true,
            from_beginning: true,
            ..Default::default()
        };
        assert_eq!(resolve(&spec, &meta(4, 4)).unwrap(), Resolution::Skip);

        let spec = OffsetSpec {
            tail: 3,
            ..Default::default()
        };
        assert_eq!(resolve(&spec, &meta(0, 0)).unwrap(), Resolution::Skip);
    }

    #[test]
    fn empty_partitions_still_follow_interactively() {
        let spec = OffsetSpec::default();
        let window = consumed(resolve(&spec, &meta(0, 0)).unwrap());
        assert_eq!(window.start, StartPosition::Newest);
        assert_eq!(window.end, UNBOUNDED);
    }

    #[test]
    fn timestamp_range_bounds_the_window() {
        let spec = OffsetSpec {
            exit: true,
            use_timestamps: true,
            ..Default::default()
        };
        let meta = PartitionMeta {
            partition: 0,
            oldest: 0,
            newest: 100,
            at_from_timestamp: Some(40),
            at_to_timestamp: Some(60),
        };
        let window = consumed(resolve(&spec, &meta).unwrap());
        assert_eq!(window.start, StartPosition::Offset(40));
        assert_eq!(window.end, 60);
    }

    #[test]
    fn timestamp_range_past_the_end_is_skipped() {
        let spec = OffsetSpec {
            exit: true,
            use_timestamps: true,
            ..Default::default()
        };
        let meta = PartitionMeta {
            partition: 0,
            oldest: 0,
            newest: 100,
            // --from-timestamp later than every message: anchor == newest
            at_from_timestamp: Some(100),
            at_to_timestamp: None,
        };
        assert_eq!(resolve(&spec, &meta).unwrap(), Resolution::Skip);
    }

    #[test]
    fn bounded_partition_without_start_point_is_skipped() {
        // --exit --offset 1=5 on a two-partition topic: partition 0 has no
        // start point and must not block termination.
        let mut explicit = HashMap::new();
        explicit.insert(1, 5);
        let spec = OffsetSpec {
            exit: true,
            explicit,
            ..Default::default()
        };
        assert_eq!(resolve(&spec, &meta(0, 10)).unwrap(), Resolution::Skip);
    }

    #[test]
    fn bounded_windows_never_invert() {
        // An explicit offset beyond the last message under --exit
        let mut explicit = HashMap::new();
        explicit.insert(0, 50);
        let spec = OffsetSpec {
            exit: true,
            explicit,
            ..Default::default()
        };
        assert_eq!(resolve(&spec, &meta(0, 10)).unwrap(), Resolution::Skip);
    }
}
