//! Runtime `.proto` schema parsing.
//!
//! Parses protobuf schema files with `protobuf-parse` at runtime and builds
//! the descriptor model the dynamic decoder walks. No code generation is
//! involved, so message types named on the command line (or served by a
//! schema registry) can be decoded directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use protobuf_parse::Parser;

/// Represents a parsed protobuf schema
#[derive(Debug, Clone)]
pub struct ProtoSchema {
    /// Message descriptors keyed by simple and fully qualified name
    pub(crate) messages: HashMap<String, ProtoMessageDescriptor>,
    /// Fully qualified names of top-level messages in declaration order
    pub(crate) message_order: Vec<String>,
}

/// Describes a protobuf message type
#[derive(Debug, Clone)]
pub struct ProtoMessageDescriptor {
    /// Fully qualified message name (e.g., "mypackage.MyMessage")
    pub name: String,
    /// Map of field names to their descriptors
    pub fields: HashMap<String, ProtoFieldDescriptor>,
    /// Ordered list of field names
    pub field_order: Vec<String>,
}

/// Describes a single field in a message
#[derive(Debug, Clone)]
pub struct ProtoFieldDescriptor {
    /// Field name
    pub name: String,
    /// Field number (tag)
    pub number: i32,
    /// Field type
    pub field_type: ProtoType,
    /// Whether the field is repeated
    pub is_repeated: bool,
}

/// Protobuf field types
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String), // Nested message type name
    Enum(String),    // Enum type name
}

impl std::fmt::Display for ProtoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtoType::Double => "double",
            ProtoType::Float => "float",
            ProtoType::Int32 => "int32",
            ProtoType::Int64 => "int64",
            ProtoType::Uint32 => "uint32",
            ProtoType::Uint64 => "uint64",
            ProtoType::Sint32 => "sint32",
            ProtoType::Sint64 => "sint64",
            ProtoType::Fixed32 => "fixed32",
            ProtoType::Fixed64 => "fixed64",
            ProtoType::Sfixed32 => "sfixed32",
            ProtoType::Sfixed64 => "sfixed64",
            ProtoType::Bool => "bool",
            ProtoType::String => "string",
            ProtoType::Bytes => "bytes",
            ProtoType::Message(name) => return write!(f, "message:{name}"),
            ProtoType::Enum(name) => return write!(f, "enum:{name}"),
        };
        write!(f, "{name}")
    }
}

impl ProtoSchema {
    /// Parse one or more .proto files into a single schema.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::ProtobufParse("no .proto files given".to_string()));
        }
        let mut parser = Parser::new();
        for path in paths {
            // protobuf-parse requires inputs to live under an include root
            let path = std::fs::canonicalize(path)
                .map_err(|e| Error::ProtobufParse(format!("cannot read {}: {e}", path.display())))?;
            if let Some(parent) = path.parent() {
                parser.include(parent);
            }
            parser.input(&path);
        }
        let parsed = parser
            .parse_and_typecheck()
            .map_err(|e| Error::ProtobufParse(e.to_string()))?;

        let mut messages = HashMap::new();
        let mut message_order = Vec::new();

        for file_descriptor in &parsed.file_descriptors {
            let package = file_descriptor.package.clone().unwrap_or_default();
            if package.starts_with("google.protobuf") {
                continue;
            }
            for message in &file_descriptor.message_type {
                collect_message(&package, "", message, &mut messages, Some(&mut message_order))?;
            }
        }

        log::debug!("parsed {} message type(s) from .proto input", message_order.len());
        Ok(ProtoSchema {
            messages,
            message_order,
        })
    }

    /// Parse a .proto file and create a schema
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_files(&[path.as_ref().to_path_buf()])
    }

    /// Parse .proto content from a string (e.g. a registry-served schema)
    pub fn from_string(content: &str) -> Result<Self> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        // protobuf-parse only reads files, so stage the content on disk
        let mut temp_file = NamedTempFile::new()
            .map_err(|e| Error::ProtobufParse(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::ProtobufParse(format!("Failed to write temp file: {e}")))?;
        Self::from_file(temp_file.path())
    }

    /// Get a message descriptor by simple or fully qualified name
    pub fn get_message(&self, name: &str) -> Result<&ProtoMessageDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.messages
            .get(name)
            .ok_or_else(|| Error::MessageTypeNotFound(name.to_string()))
    }

    /// Top-level message at a declaration-order index (registry wire format)
    pub fn message_at(&self, index: usize) -> Result<&ProtoMessageDescriptor> {
        let name = self
            .message_order
            .get(index)
            .ok_or_else(|| Error::MessageTypeNotFound(format!("message index {index}")))?;
        self.get_message(name)
    }

    /// List all message types in the schema
    pub fn list_messages(&self) -> Vec<String> {
        self.message_order.clone()
    }
}

/// Register a message and its nested types under simple and qualified names.
fn collect_message(
    package: &str,
    outer: &str,
    message: &protobuf::descriptor::DescriptorProto,
    messages: &mut HashMap<String, ProtoMessageDescriptor>,
    top_level_order: Option<&mut Vec<String>>,
) -> Result<()> {
    let simple = message.name.clone().unwrap_or_default();
    if simple.is_empty() {
        return Ok(());
    }
    let local = if outer.is_empty() {
        simple
    } else {
        format!("{outer}.{simple}")
    };
    let qualified = if package.is_empty() {
        local.clone()
    } else {
        format!("{package}.{local}")
    };

    let mut fields = HashMap::new();
    let mut field_order = Vec::new();
    for field in &message.field {
        let field_name = field.name.clone().unwrap_or_default();
        if field_name.is_empty() {
            continue;
        }
        field_order.push(field_name.clone());
        fields.insert(
            field_name.clone(),
            ProtoFieldDescriptor {
                name: field_name,
                number: field.number.unwrap_or(0),
                field_type: parse_field_type(field)?,
                is_repeated: field.label
                    == Some(
                        protobuf::descriptor::field_descriptor_proto::Label::LABEL_REPEATED.into(),
                    ),
            },
        );
    }

    let descriptor = ProtoMessageDescriptor {
        name: qualified.clone(),
        fields,
        field_order,
    };
    messages.insert(local.clone(), descriptor.clone());
    messages.insert(qualified.clone(), descriptor);
    if let Some(order) = top_level_order {
        order.push(qualified);
    }

    for nested in &message.nested_type {
        collect_message(package, &local, nested, messages, None)?;
    }
    Ok(())
}

fn parse_field_type(field: &protobuf::descriptor::FieldDescriptorProto) -> Result<ProtoType> {
    use protobuf::descriptor::field_descriptor_proto::Type;

    let field_type_enum_or_unknown = field
        .type_
        .ok_or_else(|| Error::ProtobufParse("Field missing type".to_string()))?;
    let field_type_enum = field_type_enum_or_unknown.enum_value_or_default();

    Ok(match field_type_enum {
        Type::TYPE_DOUBLE => ProtoType::Double,
        Type::TYPE_FLOAT => ProtoType::Float,
        Type::TYPE_INT64 => ProtoType::Int64,
        Type::TYPE_UINT64 => ProtoType::Uint64,
        Type::TYPE_INT32 => ProtoType::Int32,
        Type::TYPE_FIXED64 => ProtoType::Fixed64,
        Type::TYPE_FIXED32 => ProtoType::Fixed32,
        Type::TYPE_BOOL => ProtoType::Bool,
        Type::TYPE_STRING => ProtoType::String,
        Type::TYPE_MESSAGE => ProtoType::Message(field.type_name.clone().unwrap_or_default()),
        Type::TYPE_BYTES => ProtoType::Bytes,
        Type::TYPE_UINT32 => ProtoType::Uint32,
        Type::TYPE_ENUM => ProtoType::Enum(field.type_name.clone().unwrap_or_default()),
        Type::TYPE_SFIXED32 => ProtoType::Sfixed32,
        Type::TYPE_SFIXED64 => ProtoType::Sfixed64,
        Type::TYPE_SINT32 => ProtoType::Sint32,
        Type::TYPE_SINT64 => ProtoType::Sint64,
        Type::TYPE_GROUP => {
            return Err(Error::ProtobufParse(
                "TYPE_GROUP is Proto2 syntax only and deprecated hence not supported".to_string(),
            ))
        }
    })
}

impl ProtoMessageDescriptor {
    /// Get a field descriptor by name
    pub fn get_field(&self, name: &str) -> Result<&ProtoFieldDescriptor> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::ProtobufDecode(format!("field not found: {name}")))
    }

    /// Get a field descriptor by field number (wire tag)
    pub fn field_by_number(&self, number: i32) -> Option<&ProtoFieldDescriptor> {
        self.fields.values().find(|f| f.number == number)
    }

    /// List all field names in order
    pub fn list_fields(&self) -> &[String] {
        &self.field_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
syntax = "proto3";
package ordering;

message Order {
    string id = 1;
    int64 amount_cents = 2;
    repeated string tags = 3;
    Customer customer = 4;

    message Customer {
        string name = 1;
        bool verified = 2;
    }
}

message Refund {
    string order_id = 1;
    double amount = 2;
}
"#;

    #[test]
    fn parses_messages_with_package_names() {
        let schema = ProtoSchema::from_string(SCHEMA).unwrap();
        let order = schema.get_message("Order").unwrap();
        assert_eq!(order.name, "ordering.Order");
        assert_eq!(order.list_fields(), ["id", "amount_cents", "tags", "customer"]);
        assert!(schema.get_message("ordering.Refund").is_ok());
    }

    #[test]
    fn resolves_nested_messages_by_qualified_name() {
        let schema = ProtoSchema::from_string(SCHEMA).unwrap();
        let customer = schema.get_message(".ordering.Order.Customer").unwrap();
        assert_eq!(customer.get_field("verified").unwrap().number, 2);
    }

    #[test]
    fn keeps_top_level_declaration_order() {
        let schema = ProtoSchema::from_string(SCHEMA).unwrap();
        assert_eq!(schema.message_at(0).unwrap().name, "ordering.Order");
        assert_eq!(schema.message_at(1).unwrap().name, "ordering.Refund");
        assert!(schema.message_at(2).is_err());
    }

    #[test]
    fn field_types_are_parsed() {
        let schema = ProtoSchema::from_string(SCHEMA).unwrap();
        let order = schema.get_message("Order").unwrap();
        assert_eq!(order.get_field("id").unwrap().field_type, ProtoType::String);
        assert_eq!(
            order.get_field("amount_cents").unwrap().field_type,
            ProtoType::Int64
        );
        assert!(order.get_field("tags").unwrap().is_repeated);
        assert!(matches!(
            order.get_field("customer").unwrap().field_type,
            ProtoType::Message(_)
        ));
    }
}
