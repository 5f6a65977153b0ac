//! Schema-registry wire format.
//!
//! Registry-encoded payloads carry a one-byte magic marker followed by a
//! big-endian 32-bit schema id; the serialized body starts at byte 5.

/// Magic byte marking a schema-registry encoded payload.
pub const WIRE_MAGIC: u8 = 0x00;

/// Split a payload into its schema id and body, if it carries the wire
/// format prefix.
pub fn schema_id(payload: &[u8]) -> Option<(u32, &[u8])> {
    if payload.len() < 5 || payload[0] != WIRE_MAGIC {
        return None;
    }
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Some((id, &payload[5..]))
}

/// Prepend the wire format prefix to a serialized body.
pub fn encode(id: u32, body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(body.len() + 5);
    framed.push(WIRE_MAGIC);
    framed.extend_from_slice(&id.to_be_bytes());
    framed.extend_from_slice(body);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_prefix() {
        let framed = encode(1234, b"body");
        let (id, body) = schema_id(&framed).unwrap();
        assert_eq!(id, 1234);
        assert_eq!(body, b"body");
    }

    #[test]
    fn rejects_short_or_unmarked_payloads() {
        assert!(schema_id(b"").is_none());
        assert!(schema_id(&[0x00, 0x00, 0x00]).is_none());
        assert!(schema_id(b"plain text payload").is_none());
    }
}
