//! Dynamic protobuf wire-format decoding.
//!
//! Decodes serialized messages against a runtime-parsed `ProtoSchema`,
//! producing `ProtoMessage` values that render to JSON. Unknown fields are
//! skipped; fields absent from the payload are simply missing from the
//! decoded message (proto3 default semantics).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::proto::parser::{ProtoMessageDescriptor, ProtoSchema, ProtoType};
use base64::Engine;

/// Represents a field value in a decoded protobuf message.
#[derive(Debug, Clone)]
pub enum ProtoFieldValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Message(Box<ProtoMessage>),
    Repeated(Vec<ProtoFieldValue>),
}

/// Represents a decoded protobuf message.
#[derive(Debug, Clone)]
pub struct ProtoMessage {
    /// Fully qualified message type name
    pub message_type: String,
    /// Decoded field values by field name
    pub fields: HashMap<String, ProtoFieldValue>,
    /// Schema reference for field introspection
    pub descriptor: ProtoMessageDescriptor,
}

impl ProtoMessage {
    /// Render the message as JSON, preserving schema field order where the
    /// serializer keeps insertion order.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for name in self.descriptor.list_fields() {
            if let Some(value) = self.fields.get(name) {
                object.insert(name.clone(), field_to_json(value));
            }
        }
        serde_json::Value::Object(object)
    }
}

fn field_to_json(value: &ProtoFieldValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        ProtoFieldValue::Double(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ProtoFieldValue::Float(v) => serde_json::Number::from_f64(f64::from(*v))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ProtoFieldValue::Int32(v) => Value::Number((*v).into()),
        ProtoFieldValue::Int64(v) => Value::Number((*v).into()),
        ProtoFieldValue::Uint32(v) => Value::Number((*v).into()),
        ProtoFieldValue::Uint64(v) => Value::Number((*v).into()),
        ProtoFieldValue::Bool(v) => Value::Bool(*v),
        ProtoFieldValue::String(v) => Value::String(v.clone()),
        ProtoFieldValue::Bytes(v) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(v))
        }
        ProtoFieldValue::Message(inner) => inner.to_json(),
        ProtoFieldValue::Repeated(items) => Value::Array(items.iter().map(field_to_json).collect()),
    }
}

/// Decodes protobuf payloads against a parsed schema.
pub struct ProtoDecoder {
    schema: Arc<ProtoSchema>,
}

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

impl ProtoDecoder {
    pub fn new(schema: Arc<ProtoSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ProtoSchema {
        &self.schema
    }

    /// Decode a payload as the given message type.
    pub fn decode(&self, message_type: &str, data: &[u8]) -> Result<ProtoMessage> {
        let descriptor = self.schema.get_message(message_type)?.clone();
        self.decode_message(&descriptor, data)
    }

    /// Decode a payload against a specific descriptor.
    pub fn decode_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        data: &[u8],
    ) -> Result<ProtoMessage> {
        let mut reader = WireReader::new(data);
        let mut fields: HashMap<String, ProtoFieldValue> = HashMap::new();

        while !reader.at_end() {
            let tag = reader.read_varint()?;
            let field_number = (tag >> 3) as i32;
            let wire_type = (tag & 0x07) as u8;

            let Some(field) = descriptor.field_by_number(field_number) else {
                reader.skip(wire_type)?;
                continue;
            };

            if field.is_repeated && wire_type == WIRE_LEN && is_packable(&field.field_type) {
                // Packed repeated scalars: a single length-delimited run
                let packed = reader.read_bytes()?;
                let mut inner = WireReader::new(packed);
                let entry = fields
                    .entry(field.name.clone())
                    .or_insert_with(|| ProtoFieldValue::Repeated(Vec::new()));
                while !inner.at_end() {
                    let value =
                        self.decode_scalar(&field.field_type, packed_wire_type(&field.field_type), &mut inner)?;
                    push_repeated(entry, value);
                }
                continue;
            }

            let value = self.decode_value(&field.field_type, wire_type, &mut reader)?;
            if field.is_repeated {
                let entry = fields
                    .entry(field.name.clone())
                    .or_insert_with(|| ProtoFieldValue::Repeated(Vec::new()));
                push_repeated(entry, value);
            } else {
                fields.insert(field.name.clone(), value);
            }
        }

        Ok(ProtoMessage {
            message_type: descriptor.name.clone(),
            fields,
            descriptor: descriptor.clone(),
        })
    }

    fn decode_value(
        &self,
        field_type: &ProtoType,
        wire_type: u8,
        reader: &mut WireReader<'_>,
    ) -> Result<ProtoFieldValue> {
        match field_type {
            ProtoType::String => {
                expect_wire(field_type, wire_type, WIRE_LEN)?;
                let bytes = reader.read_bytes()?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::ProtobufDecode(format!("invalid UTF-8 string: {e}")))?;
                Ok(ProtoFieldValue::String(text.to_string()))
            }
            ProtoType::Bytes => {
                expect_wire(field_type, wire_type, WIRE_LEN)?;
                Ok(ProtoFieldValue::Bytes(reader.read_bytes()?.to_vec()))
            }
            ProtoType::Message(type_name) => {
                expect_wire(field_type, wire_type, WIRE_LEN)?;
                let bytes = reader.read_bytes()?;
                let nested = self.schema.get_message(type_name)?.clone();
                Ok(ProtoFieldValue::Message(Box::new(
                    self.decode_message(&nested, bytes)?,
                )))
            }
            _ => self.decode_scalar(field_type, wire_type, reader),
        }
    }

    fn decode_scalar(
        &self,
        field_type: &ProtoType,
        wire_type: u8,
        reader: &mut WireReader<'_>,
    ) -> Result<ProtoFieldValue> {
        match field_type {
            ProtoType::Double => {
                expect_wire(field_type, wire_type, WIRE_FIXED64)?;
                Ok(ProtoFieldValue::Double(f64::from_bits(
                    reader.read_fixed64()?,
                )))
            }
            ProtoType::Float => {
                expect_wire(field_type, wire_type, WIRE_FIXED32)?;
                Ok(ProtoFieldValue::Float(f32::from_bits(
                    reader.read_fixed32()?,
                )))
            }
            ProtoType::Int32 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Int32(reader.read_varint()? as i32))
            }
            ProtoType::Int64 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Int64(reader.read_varint()? as i64))
            }
            ProtoType::Uint32 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Uint32(reader.read_varint()? as u32))
            }
            ProtoType::Uint64 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Uint64(reader.read_varint()?))
            }
            ProtoType::Sint32 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                let raw = reader.read_varint()? as u32;
                Ok(ProtoFieldValue::Int32(zigzag32(raw)))
            }
            ProtoType::Sint64 => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Int64(zigzag64(reader.read_varint()?)))
            }
            ProtoType::Fixed32 => {
                expect_wire(field_type, wire_type, WIRE_FIXED32)?;
                Ok(ProtoFieldValue::Uint32(reader.read_fixed32()?))
            }
            ProtoType::Fixed64 => {
                expect_wire(field_type, wire_type, WIRE_FIXED64)?;
                Ok(ProtoFieldValue::Uint64(reader.read_fixed64()?))
            }
            ProtoType::Sfixed32 => {
                expect_wire(field_type, wire_type, WIRE_FIXED32)?;
                Ok(ProtoFieldValue::Int32(reader.read_fixed32()? as i32))
            }
            ProtoType::Sfixed64 => {
                expect_wire(field_type, wire_type, WIRE_FIXED64)?;
                Ok(ProtoFieldValue::Int64(reader.read_fixed64()? as i64))
            }
            ProtoType::Bool => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Bool(reader.read_varint()? != 0))
            }
            // Enums decode as their numeric value
            ProtoType::Enum(_) => {
                expect_wire(field_type, wire_type, WIRE_VARINT)?;
                Ok(ProtoFieldValue::Int32(reader.read_varint()? as i32))
            }
            other => Err(Error::ProtobufDecode(format!(
                "type {other} is not a scalar"
            ))),
        }
    }
}

fn push_repeated(entry: &mut ProtoFieldValue, value: ProtoFieldValue) {
    if let ProtoFieldValue::Repeated(items) = entry {
        items.push(value);
    }
}

fn is_packable(field_type: &ProtoType) -> bool {
    !matches!(
        field_type,
        ProtoType::String | ProtoType::Bytes | ProtoType::Message(_)
    )
}

fn packed_wire_type(field_type: &ProtoType) -> u8 {
    match field_type {
        ProtoType::Double | ProtoType::Fixed64 | ProtoType::Sfixed64 => WIRE_FIXED64,
        ProtoType::Float | ProtoType::Fixed32 | ProtoType::Sfixed32 => WIRE_FIXED32,
        _ => WIRE_VARINT,
    }
}

fn expect_wire(field_type: &ProtoType, actual: u8, expected: u8) -> Result<()> {
    if actual != expected {
        return Err(Error::ProtobufDecode(format!(
            "wire type {actual} does not match field type {field_type}"
        )));
    }
    Ok(())
}

fn zigzag32(raw: u32) -> i32 {
    ((raw >> 1) as i32) ^ -((raw & 1) as i32)
}

fn zigzag64(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}

struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| Error::ProtobufDecode("truncated varint".to_string()))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(Error::ProtobufDecode("varint too long".to_string()));
            }
        }
    }

    fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(Error::ProtobufDecode("truncated payload".to_string()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, wire_type: u8) -> Result<()> {
        match wire_type {
            WIRE_VARINT => {
                self.read_varint()?;
            }
            WIRE_FIXED64 => {
                self.take(8)?;
            }
            WIRE_LEN => {
                self.read_bytes()?;
            }
            WIRE_FIXED32 => {
                self.take(4)?;
            }
            other => {
                return Err(Error::ProtobufDecode(format!(
                    "unsupported wire type {other}"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::parser::ProtoSchema;

    const SCHEMA: &str = r#"
syntax = "proto3";
package shop;

message Item {
    string sku = 1;
    int64 quantity = 2;
    double price = 3;
    bool in_stock = 4;
    repeated int32 bin_ids = 5;
    Warehouse warehouse = 6;

    message Warehouse {
        string code = 1;
    }
}
"#;

    fn varint(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    fn tag(field: u64, wire: u64, out: &mut Vec<u8>) {
        varint(field << 3 | wire, out);
    }

    /// Hand-encode an Item message per the protobuf wire format.
    fn encode_item() -> Vec<u8> {
        let mut body = Vec::new();
        // sku = "A-17"
        tag(1, 2, &mut body);
        varint(4, &mut body);
        body.extend_from_slice(b"A-17");
        // quantity = 300
        tag(2, 0, &mut body);
        varint(300, &mut body);
        // price = 9.5
        tag(3, 1, &mut body);
        body.extend_from_slice(&9.5f64.to_bits().to_le_bytes());
        // in_stock = true
        tag(4, 0, &mut body);
        varint(1, &mut body);
        // bin_ids = [3, 150] packed
        tag(5, 2, &mut body);
        let mut packed = Vec::new();
        varint(3, &mut packed);
        varint(150, &mut packed);
        varint(packed.len() as u64, &mut body);
        body.extend_from_slice(&packed);
        // warehouse { code = "NW" }
        let mut nested = Vec::new();
        tag(1, 2, &mut nested);
        varint(2, &mut nested);
        nested.extend_from_slice(b"NW");
        tag(6, 2, &mut body);
        varint(nested.len() as u64, &mut body);
        body.extend_from_slice(&nested);
        body
    }

    #[test]
    fn decodes_scalars_and_nested_messages() {
        let schema = Arc::new(ProtoSchema::from_string(SCHEMA).unwrap());
        let decoder = ProtoDecoder::new(schema);
        let message = decoder.decode("Item", &encode_item()).unwrap();

        assert!(matches!(
            message.fields.get("sku"),
            Some(ProtoFieldValue::String(s)) if s == "A-17"
        ));
        assert!(matches!(
            message.fields.get("quantity"),
            Some(ProtoFieldValue::Int64(300))
        ));
        assert!(matches!(
            message.fields.get("in_stock"),
            Some(ProtoFieldValue::Bool(true))
        ));
        let Some(ProtoFieldValue::Repeated(bins)) = message.fields.get("bin_ids") else {
            panic!("bin_ids missing");
        };
        assert_eq!(bins.len(), 2);
        let Some(ProtoFieldValue::Message(warehouse)) = message.fields.get("warehouse") else {
            panic!("warehouse missing");
        };
        assert!(matches!(
            warehouse.fields.get("code"),
            Some(ProtoFieldValue::String(s)) if s == "NW"
        ));
    }

    #[test]
    fn renders_json_in_field_order() {
        let schema = Arc::new(ProtoSchema::from_string(SCHEMA).unwrap());
        let decoder = ProtoDecoder::new(schema);
        let message = decoder.decode("Item", &encode_item()).unwrap();
        let json = message.to_json();

        assert_eq!(json["sku"], "A-17");
        assert_eq!(json["quantity"], 300);
        assert_eq!(json["price"], 9.5);
        assert_eq!(json["bin_ids"][1], 150);
        assert_eq!(json["warehouse"]["code"], "NW");
    }

    #[test]
    fn skips_unknown_fields() {
        let schema = Arc::new(ProtoSchema::from_string(SCHEMA).unwrap());
        let decoder = ProtoDecoder::new(schema);
        let mut body = Vec::new();
        // field 99 (unknown), then a known field
        tag(99, 0, &mut body);
        varint(7, &mut body);
        tag(1, 2, &mut body);
        varint(2, &mut body);
        body.extend_from_slice(b"ok");

        let message = decoder.decode("Item", &body).unwrap();
        assert!(matches!(
            message.fields.get("sku"),
            Some(ProtoFieldValue::String(s)) if s == "ok"
        ));
    }

    #[test]
    fn rejects_truncated_payloads() {
        let schema = Arc::new(ProtoSchema::from_string(SCHEMA).unwrap());
        let decoder = ProtoDecoder::new(schema);
        let mut body = Vec::new();
        tag(1, 2, &mut body);
        varint(40, &mut body);
        body.extend_from_slice(b"short");
        assert!(decoder.decode("Item", &body).is_err());
    }
}
