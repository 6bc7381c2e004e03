//! Descriptor type definitions for generated proto files.
//!
//! This module defines the in-memory shape of a generated `.proto` file: a
//! [`ProtoFile`] holding top-level [`Message`]s, each with ordered
//! [`Field`]s and nested messages. The types serialize with [`serde`] so that
//! baseline packages and pre-translated inputs can be stored as JSON.

use serde::{Deserialize, Serialize};

/// Proto syntax emitted for every generated file.
pub const PROTO_SYNTAX: &str = "proto3";

/// Tag numbers reserved by the protobuf implementation itself.
///
/// Newly allocated tags never fall inside this range.
pub const IMPLEMENTATION_RESERVED: TagRange = TagRange {
    start: 19_000,
    end: 19_999,
};

/// Largest tag number allowed by the wire format.
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// Cardinality of a field.
///
/// # Examples
///
/// ```
/// use protogen_core::FieldLabel;
///
/// assert_eq!(FieldLabel::default(), FieldLabel::Optional);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldLabel {
    /// Singular field (the default).
    #[default]
    Optional,
    /// Repeated field.
    Repeated,
}

/// A single field of a message.
///
/// The declared type is opaque to tag stabilization: it is carried through
/// unchanged.
///
/// # Examples
///
/// ```
/// use protogen_core::{Field, FieldLabel};
///
/// let name = Field::new("name", 3, "HumanName").repeated();
/// assert_eq!(name.tag, 3);
/// assert_eq!(name.label, FieldLabel::Repeated);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name (e.g. "active").
    pub name: String,
    /// Numeric tag identifying the field on the wire.
    pub tag: u32,
    /// Declared type name (e.g. "Boolean", "string").
    pub type_name: String,
    /// Field cardinality.
    #[serde(default)]
    pub label: FieldLabel,
}

impl Field {
    /// Creates a singular field.
    pub fn new(name: &str, tag: u32, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            tag,
            type_name: type_name.to_string(),
            label: FieldLabel::Optional,
        }
    }

    /// Marks the field as repeated.
    pub fn repeated(mut self) -> Self {
        self.label = FieldLabel::Repeated;
        self
    }

    /// Returns a copy of this field carrying a different tag.
    pub fn with_tag(&self, tag: u32) -> Self {
        Self {
            tag,
            ..self.clone()
        }
    }
}

/// Inclusive range of reserved tag numbers.
///
/// # Examples
///
/// ```
/// use protogen_core::TagRange;
///
/// let range = TagRange::new(4, 6);
/// assert!(range.contains(4));
/// assert!(range.contains(6));
/// assert!(!range.contains(7));
/// assert_eq!(TagRange::single(9).end, 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRange {
    /// First reserved tag.
    pub start: u32,
    /// Last reserved tag (inclusive).
    pub end: u32,
}

impl TagRange {
    /// Creates an inclusive range.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates a range reserving a single tag.
    pub fn single(tag: u32) -> Self {
        Self {
            start: tag,
            end: tag,
        }
    }

    /// Returns `true` if `tag` falls within this range.
    pub fn contains(&self, tag: u32) -> bool {
        self.start <= tag && tag <= self.end
    }
}

/// A message definition with its fields and nested messages.
///
/// Tags among the direct [`fields`](Message::fields) of one message must be
/// pairwise unique; see [`validate_message`](crate::validate_message).
///
/// # Examples
///
/// ```
/// use protogen_core::{Field, Message, TagRange};
///
/// let patient = Message::new("Patient")
///     .with_field(Field::new("id", 1, "Id"))
///     .with_field(Field::new("active", 2, "Boolean"))
///     .with_reserved(TagRange::new(7, 8))
///     .with_nested(Message::new("Contact").with_field(Field::new("name", 1, "HumanName")));
///
/// assert_eq!(patient.field("active").map(|f| f.tag), Some(2));
/// assert!(patient.is_tag_reserved(1));
/// assert!(patient.is_tag_reserved(8));
/// assert!(!patient.is_tag_reserved(3));
/// assert_eq!(patient.highest_reserved_tag(), Some(8));
/// assert!(patient.find_nested("Contact").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Simple (unqualified) message name.
    pub name: String,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Nested message definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Message>,
    /// Tag ranges that may not be used by any field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved_ranges: Vec<TagRange>,
    /// Field names that may not be used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved_names: Vec<String>,
}

impl Message {
    /// Creates an empty message.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a nested message.
    pub fn with_nested(mut self, nested: Message) -> Self {
        self.nested.push(nested);
        self
    }

    /// Adds a reserved tag range.
    pub fn with_reserved(mut self, range: TagRange) -> Self {
        self.reserved_ranges.push(range);
        self
    }

    /// Looks up a direct field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a direct nested message by simple name.
    pub fn find_nested(&self, name: &str) -> Option<&Message> {
        self.nested.iter().find(|m| m.name == name)
    }

    /// Returns `true` if `tag` is used by a field or covered by a reserved
    /// range of this message.
    pub fn is_tag_reserved(&self, tag: u32) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
            || self.reserved_ranges.iter().any(|r| r.contains(tag))
    }

    /// Returns the highest tag used by a field or a reserved range.
    pub fn highest_reserved_tag(&self) -> Option<u32> {
        let fields = self.fields.iter().map(|f| f.tag);
        let ranges = self.reserved_ranges.iter().map(|r| r.end);
        fields.chain(ranges).max()
    }

    /// Returns the number of messages in this tree, including `self`.
    pub fn message_count(&self) -> usize {
        1 + self.nested.iter().map(Message::message_count).sum::<usize>()
    }
}

/// File-level options written into the generated `.proto` text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOptions {
    /// Java package; also the namespace used for qualified names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_package: Option<String>,
    /// Emit one Java class per message.
    #[serde(default)]
    pub java_multiple_files: bool,
    /// Go import path, stamped by the assembler's annotation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_package: Option<String>,
}

/// A generated `.proto` file: its archive path and descriptor content.
///
/// # Examples
///
/// ```
/// use protogen_core::{Message, ProtoFile};
///
/// let mut file = ProtoFile::new("resources/patient.proto", "google.fhir.r5.core");
/// file.options.java_package = Some("com.google.fhir.r5.core".into());
/// file.messages.push(Message::new("Patient"));
///
/// assert_eq!(file.namespace(), "com.google.fhir.r5.core");
/// assert_eq!(
///     file.qualified_name(&file.messages[0]),
///     "com.google.fhir.r5.core.Patient"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoFile {
    /// Relative path of the file inside the output archive.
    pub path: String,
    /// Proto package declaration.
    pub package: String,
    /// Imported files, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// File options.
    #[serde(default)]
    pub options: FileOptions,
    /// Top-level messages in declaration order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ProtoFile {
    /// Creates an empty file.
    pub fn new(path: &str, package: &str) -> Self {
        Self {
            path: path.to_string(),
            package: package.to_string(),
            imports: Vec::new(),
            options: FileOptions::default(),
            messages: Vec::new(),
        }
    }

    /// Adds a top-level message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Returns the namespace used to qualify message names: the Java package
    /// when set, otherwise the proto package.
    pub fn namespace(&self) -> &str {
        self.options
            .java_package
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.package)
    }

    /// Returns the fully-qualified name of a top-level message.
    pub fn qualified_name(&self, message: &Message) -> String {
        qualify(self.namespace(), &message.name)
    }

    /// Returns the number of messages in this file, nested ones included.
    pub fn message_count(&self) -> usize {
        self.messages.iter().map(Message::message_count).sum()
    }
}

/// Joins a parent qualified name and a simple name with a dot.
pub fn qualify(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_falls_back_to_proto_package() {
        let file = ProtoFile::new("codes.proto", "google.fhir.r5.core");
        assert_eq!(file.namespace(), "google.fhir.r5.core");

        let mut with_empty_java = file.clone();
        with_empty_java.options.java_package = Some(String::new());
        assert_eq!(with_empty_java.namespace(), "google.fhir.r5.core");
    }

    #[test]
    fn test_highest_reserved_tag_includes_ranges() {
        let message = Message::new("Observation")
            .with_field(Field::new("id", 1, "Id"))
            .with_reserved(TagRange::new(40, 42));
        assert_eq!(message.highest_reserved_tag(), Some(42));
        assert_eq!(Message::new("Empty").highest_reserved_tag(), None);
    }

    #[test]
    fn test_message_count_is_recursive() {
        let message = Message::new("Bundle")
            .with_nested(Message::new("Entry").with_nested(Message::new("Request")))
            .with_nested(Message::new("Link"));
        assert_eq!(message.message_count(), 4);
    }

    #[test]
    fn test_field_deserializes_with_default_label() {
        let field: Field =
            serde_json::from_str(r#"{"name": "id", "tag": 1, "type_name": "Id"}"#).unwrap();
        assert_eq!(field.label, FieldLabel::Optional);
    }

    #[test]
    fn test_qualify_handles_empty_parent() {
        assert_eq!(qualify("", "Patient"), "Patient");
        assert_eq!(qualify("a.b", "Patient"), "a.b.Patient");
    }
}
