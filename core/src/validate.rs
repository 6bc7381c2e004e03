//! Package and message validation.
//!
//! Validates structural invariants of generated packages: unique file paths,
//! and per message unique field names and pairwise-unique, in-range tags
//! outside the protobuf implementation-reserved range.
//!
//! # Examples
//!
//! ```
//! use protogen_core::*;
//!
//! let good = Message::new("Patient")
//!     .with_field(Field::new("id", 1, "Id"))
//!     .with_field(Field::new("active", 2, "Boolean"));
//! assert!(validate_message(&good, "Patient").is_empty());
//!
//! // Invalid: two fields share tag 2
//! let bad = good.clone().with_field(Field::new("gender", 2, "Code"));
//! assert!(!validate_message(&bad, "Patient").is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{IMPLEMENTATION_RESERVED, MAX_TAG, Message, ProtoPackage, qualify};

/// Package/message validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A file has an empty path.
    #[error("file path cannot be empty")]
    EmptyPath,
    /// Two files share a path.
    #[error("duplicate file path in package: {0}")]
    DuplicatePath(String),
    /// A message has an empty name.
    #[error("message name cannot be empty in {0}")]
    EmptyMessageName(String),
    /// Two direct fields of one message share a tag.
    #[error("duplicate tag {tag} in message {message}")]
    DuplicateTag {
        /// Qualified name of the offending message.
        message: String,
        /// The repeated tag.
        tag: u32,
    },
    /// Two direct fields of one message share a name.
    #[error("duplicate field {field} in message {message}")]
    DuplicateFieldName {
        /// Qualified name of the offending message.
        message: String,
        /// The repeated field name.
        field: String,
    },
    /// A tag is zero or above the wire-format maximum.
    #[error("invalid tag {tag} for field {field} in message {message}")]
    InvalidTag {
        /// Qualified name of the offending message.
        message: String,
        /// Field carrying the tag.
        field: String,
        /// The invalid tag.
        tag: u32,
    },
    /// A tag falls inside the range protobuf reserves for its own use.
    #[error(
        "tag {tag} for field {field} in message {message} is in the reserved range 19000-19999"
    )]
    ReservedTag {
        /// Qualified name of the offending message.
        message: String,
        /// Field carrying the tag.
        field: String,
        /// The reserved tag.
        tag: u32,
    },
}

/// Validates a full package.
///
/// Checks for empty and duplicate paths, then validates every message tree.
/// Returns all errors found, in package order.
///
/// # Examples
///
/// ```
/// use protogen_core::*;
///
/// let mut package = ProtoPackage::from_files(vec![ProtoFile::new("codes.proto", "p")]);
/// assert!(validate_package(&package).is_empty());
///
/// package.files.push(ProtoFile::new("codes.proto", "p"));
/// let errors = validate_package(&package);
/// assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicatePath(_))));
/// ```
pub fn validate_package(package: &ProtoPackage) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen_paths: HashSet<&str> = HashSet::new();

    for file in &package.files {
        if file.path.trim().is_empty() {
            errors.push(ValidationError::EmptyPath);
        } else if !seen_paths.insert(file.path.as_str()) {
            errors.push(ValidationError::DuplicatePath(file.path.clone()));
        }

        for message in &file.messages {
            errors.extend(validate_message(message, &file.qualified_name(message)));
        }
    }

    errors
}

/// Validates a message tree rooted at `message`, whose qualified name is
/// `qualified_name`.
pub fn validate_message(message: &Message, qualified_name: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_message_recursive(message, qualified_name, &mut errors);
    errors
}

fn validate_message_recursive(
    message: &Message,
    qualified_name: &str,
    errors: &mut Vec<ValidationError>,
) {
    if message.name.trim().is_empty() {
        errors.push(ValidationError::EmptyMessageName(qualified_name.to_string()));
    }

    let mut tags = HashSet::new();
    let mut names = HashSet::new();
    for field in &message.fields {
        if field.tag == 0 || field.tag > MAX_TAG {
            errors.push(ValidationError::InvalidTag {
                message: qualified_name.to_string(),
                field: field.name.clone(),
                tag: field.tag,
            });
        } else if IMPLEMENTATION_RESERVED.contains(field.tag) {
            errors.push(ValidationError::ReservedTag {
                message: qualified_name.to_string(),
                field: field.name.clone(),
                tag: field.tag,
            });
        }
        if !tags.insert(field.tag) {
            errors.push(ValidationError::DuplicateTag {
                message: qualified_name.to_string(),
                tag: field.tag,
            });
        }
        if !names.insert(field.name.as_str()) {
            errors.push(ValidationError::DuplicateFieldName {
                message: qualified_name.to_string(),
                field: field.name.clone(),
            });
        }
    }

    for nested in &message.nested {
        validate_message_recursive(nested, &qualify(qualified_name, &nested.name), errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, ProtoFile};

    #[test]
    fn test_valid_package() {
        let file = ProtoFile::new("resources/patient.proto", "google.fhir.r5.core").with_message(
            Message::new("Patient")
                .with_field(Field::new("id", 1, "Id"))
                .with_nested(Message::new("Contact").with_field(Field::new("id", 1, "String"))),
        );
        let package = ProtoPackage::from_files(vec![file]);
        assert!(validate_package(&package).is_empty());
    }

    #[test]
    fn test_empty_path() {
        let package = ProtoPackage::from_files(vec![ProtoFile::new("  ", "p")]);
        assert_eq!(validate_package(&package), vec![ValidationError::EmptyPath]);
    }

    #[test]
    fn test_duplicate_tag_in_nested_message_is_qualified() {
        let message = Message::new("Patient").with_nested(
            Message::new("Contact")
                .with_field(Field::new("name", 2, "HumanName"))
                .with_field(Field::new("gender", 2, "Code")),
        );
        let errors = validate_message(&message, "a.r5.Patient");
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateTag {
                message: "a.r5.Patient.Contact".into(),
                tag: 2,
            }]
        );
    }

    #[test]
    fn test_duplicate_field_name() {
        let message = Message::new("Patient")
            .with_field(Field::new("id", 1, "Id"))
            .with_field(Field::new("id", 2, "Id"));
        let errors = validate_message(&message, "Patient");
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::DuplicateFieldName { field, .. }] if field == "id"
        ));
    }

    #[test]
    fn test_zero_and_oversized_tags() {
        let message = Message::new("Patient")
            .with_field(Field::new("id", 0, "Id"))
            .with_field(Field::new("active", MAX_TAG + 1, "Boolean"));
        let errors = validate_message(&message, "Patient");
        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, ValidationError::InvalidTag { .. }))
        );
    }

    #[test]
    fn test_implementation_reserved_tags() {
        let message = Message::new("ContainedResource")
            .with_field(Field::new("bundle", 18_999, "Bundle"))
            .with_field(Field::new("patient", 19_000, "Patient"))
            .with_field(Field::new("account", 19_999, "Account"))
            .with_field(Field::new("observation", 20_000, "Observation"));
        let errors = validate_message(&message, "p.ContainedResource");
        assert_eq!(
            errors,
            vec![
                ValidationError::ReservedTag {
                    message: "p.ContainedResource".into(),
                    field: "patient".into(),
                    tag: 19_000,
                },
                ValidationError::ReservedTag {
                    message: "p.ContainedResource".into(),
                    field: "account".into(),
                    tag: 19_999,
                },
            ]
        );
    }
}
