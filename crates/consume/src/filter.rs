//! Glob filtering of consumed messages.
//!
//! Up to three independent predicates (key, value, per-header-key) combine
//! with AND semantics. Matching is over the raw message bytes: data that is
//! not valid UTF-8 never matches a pattern (fails closed), and a header named
//! by a filter that is absent from the message fails closed too. A filter
//! with no patterns configured matches everything.

use glob::Pattern;
use kaftail_broker::Message;

use crate::error::{Error, Result};

/// Compiled glob matchers for one invocation; immutable once constructed.
#[derive(Debug, Default)]
pub struct MessageFilter {
    key: Option<Pattern>,
    value: Option<Pattern>,
    headers: Vec<(String, Pattern)>,
}

impl MessageFilter {
    /// Compile patterns from the flag values. `header_patterns` entries are
    /// `KEY=GLOB` pairs.
    pub fn compile(
        key_pattern: Option<&str>,
        value_pattern: Option<&str>,
        header_patterns: &[String],
    ) -> Result<Self> {
        let key = key_pattern.map(compile_pattern).transpose()?;
        let value = value_pattern.map(compile_pattern).transpose()?;
        let mut headers = Vec::with_capacity(header_patterns.len());
        for raw in header_patterns {
            let (name, pattern) = raw.split_once('=').ok_or_else(|| {
                Error::Config(format!(
                    "invalid --filter-header {raw:?}, expected KEY=GLOB"
                ))
            })?;
            headers.push((name.to_string(), compile_pattern(pattern)?));
        }
        Ok(Self {
            key,
            value,
            headers,
        })
    }

    /// Whether any pattern is configured.
    pub fn is_active(&self) -> bool {
        self.key.is_some() || self.value.is_some() || !self.headers.is_empty()
    }

    /// Decide inclusion for one message. All configured predicates must
    /// match.
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(pattern) = &self.key {
            if !matches_bytes(pattern, message.key.as_deref()) {
                return false;
            }
        }
        if let Some(pattern) = &self.value {
            if !matches_bytes(pattern, message.value.as_deref()) {
                return false;
            }
        }
        for (name, pattern) in &self.headers {
            let header = message.headers.iter().find(|h| &h.key == name);
            let Some(header) = header else {
                // Referenced header absent: fail closed
                return false;
            };
            if !matches_bytes(pattern, header.value.as_deref()) {
                return false;
            }
        }
        true
    }
}

fn compile_pattern(raw: &str) -> Result<Pattern> {
    Pattern::new(raw).map_err(|e| Error::Config(format!("invalid glob pattern {raw:?}: {e}")))
}

/// Globs only ever match textual data; missing or non-UTF-8 bytes fail
/// closed rather than erroring.
fn matches_bytes(pattern: &Pattern, bytes: Option<&[u8]>) -> bool {
    match bytes.map(std::str::from_utf8) {
        Some(Ok(text)) => pattern.matches(text),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaftail_broker::Header;

    fn message(key: Option<&[u8]>, value: Option<&[u8]>, headers: Vec<Header>) -> Message {
        Message {
            topic: "events".to_string(),
            partition: 0,
            offset: 0,
            key: key.map(<[u8]>::to_vec),
            value: value.map(<[u8]>::to_vec),
            headers,
            timestamp: None,
        }
    }

    #[test]
    fn inactive_filter_matches_everything() {
        let filter = MessageFilter::compile(None, None, &[]).unwrap();
        assert!(!filter.is_active());
        assert!(filter.matches(&message(None, None, vec![])));
        assert!(filter.matches(&message(Some(b"\xff\xfe"), Some(b"\x00"), vec![])));
    }

    #[test]
    fn key_glob_matches_prefix() {
        let filter = MessageFilter::compile(Some("user-*"), None, &[]).unwrap();
        assert!(filter.matches(&message(Some(b"user-123"), Some(b"ok"), vec![])));

        let filter = MessageFilter::compile(Some("admin-*"), None, &[]).unwrap();
        assert!(!filter.matches(&message(Some(b"user-123"), Some(b"ok"), vec![])));
    }

    #[test]
    fn binary_data_never_matches() {
        let filter = MessageFilter::compile(None, Some("*"), &[]).unwrap();
        assert!(!filter.matches(&message(None, Some(&[0xff, 0xfe, 0x00]), vec![])));
    }

    #[test]
    fn missing_key_fails_closed() {
        let filter = MessageFilter::compile(Some("*"), None, &[]).unwrap();
        assert!(!filter.matches(&message(None, Some(b"ok"), vec![])));
    }

    #[test]
    fn all_configured_predicates_must_match() {
        let filter =
            MessageFilter::compile(Some("user-*"), Some("ok"), &["env=prod*".to_string()])
                .unwrap();
        let header = Header {
            key: "env".to_string(),
            value: Some(b"production".to_vec()),
        };
        assert!(filter.matches(&message(Some(b"user-1"), Some(b"ok"), vec![header.clone()])));
        // Value predicate fails
        assert!(!filter.matches(&message(Some(b"user-1"), Some(b"err"), vec![header.clone()])));
        // Header absent
        assert!(!filter.matches(&message(Some(b"user-1"), Some(b"ok"), vec![])));
        // Header present but not matching
        let staging = Header {
            key: "env".to_string(),
            value: Some(b"staging".to_vec()),
        };
        assert!(!filter.matches(&message(Some(b"user-1"), Some(b"ok"), vec![staging])));
    }

    #[test]
    fn malformed_header_filters_are_config_errors() {
        assert!(MessageFilter::compile(None, None, &["no-equals".to_string()]).is_err());
    }
}
