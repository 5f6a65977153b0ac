//! Default raw-bytes deserialization.
//!
//! The chain's terminal member: always accepts, never fails. Text passes
//! through unchanged; binary data is rendered hex or base64 so it survives a
//! terminal, honoring an explicit encoding override when one was given.

use async_trait::async_trait;
use base64::Engine;

use crate::chain::Deserializer;
use crate::error::Result;
use crate::payload::{DeserializedPayload, Encoding};

pub struct DefaultDeserializer {
    encoding: Encoding,
}

impl DefaultDeserializer {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    fn render(&self, payload: &[u8]) -> Vec<u8> {
        match self.encoding {
            Encoding::Plain => payload.to_vec(),
            Encoding::Hex => hex::encode(payload).into_bytes(),
            Encoding::Base64 => base64::engine::general_purpose::STANDARD
                .encode(payload)
                .into_bytes(),
            Encoding::Auto => {
                if std::str::from_utf8(payload).is_ok() {
                    payload.to_vec()
                } else {
                    hex::encode(payload).into_bytes()
                }
            }
        }
    }
}

#[async_trait]
impl Deserializer for DefaultDeserializer {
    fn name(&self) -> &'static str {
        "bytes"
    }

    async fn can_deserialize(&self, _payload: &[u8]) -> bool {
        true
    }

    async fn deserialize(&self, payload: &[u8]) -> Result<DeserializedPayload> {
        Ok(DeserializedPayload::plain(self.render(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_passes_text_through() {
        let deserializer = DefaultDeserializer::new(Encoding::Auto);
        assert_eq!(deserializer.render(b"hello world"), b"hello world");
    }

    #[test]
    fn auto_hex_encodes_binary() {
        let deserializer = DefaultDeserializer::new(Encoding::Auto);
        assert_eq!(deserializer.render(&[0xff, 0x00, 0x7f]), b"ff007f");
    }

    #[test]
    fn hex_round_trips() {
        let original = [0x00u8, 0x01, 0xfe, 0xff];
        let deserializer = DefaultDeserializer::new(Encoding::Hex);
        let rendered = deserializer.render(&original);
        let decoded = hex::decode(rendered).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn base64_round_trips() {
        let original = [0x00u8, 0x01, 0xfe, 0xff];
        let deserializer = DefaultDeserializer::new(Encoding::Base64);
        let rendered = deserializer.render(&original);
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(rendered)
            .unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn explicit_base64_overrides_text_detection() {
        let deserializer = DefaultDeserializer::new(Encoding::Base64);
        assert_eq!(deserializer.render(b"hi"), b"aGk=");
    }
}
