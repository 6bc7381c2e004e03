//! Core descriptor types and cross-version tag stabilization.
//!
//! This crate defines the in-memory model of a generated proto package and
//! the algorithms that operate on it without touching the filesystem:
//!
//! - [`ProtoPackage`]: an ordered set of [`ProtoFile`]s bound for one archive.
//! - [`Message`] / [`Field`]: message trees with numeric field tags.
//! - [`SourcePackage`] / [`StructureDefinition`]: the loaded input package
//!   the assembler works from.
//!
//! Validation ([`validate_package`], [`validate_message`]) catches duplicate
//! paths, duplicate tags and out-of-range tags.
//!
//! Stabilization ([`stabilize_package`], [`stabilize_package_checked`])
//! rewrites field tags so that fields shared with a baseline version keep the
//! baseline's tags, using a [`ReferenceLookup`] and [`ReferenceNaming`].

mod definition;
mod naming;
mod package;
mod retag;
mod types;
mod validate;

pub use definition::{
    BUNDLE_STRUCTURE_DEFINITION_URL, Derivation, SourcePackage, StructureDefinition,
    StructureKind, Terminology,
};
pub use naming::{DEFAULT_BASELINE_TOKEN, DEFAULT_VERSION_PATTERN, ReferenceNaming};
pub use package::ProtoPackage;
pub use retag::{
    DEFAULT_EXCLUDED_SUFFIXES, ReferenceLookup, StabilizeError, StabilizeOptions, StabilizeStats,
    StabilizedPackage, stabilize_message, stabilize_package, stabilize_package_checked,
    unify_fields,
};
pub use types::*;
pub use validate::{ValidationError, validate_message, validate_package};
