//! Cross-version tag stabilization ("retagging").
//!
//! Each message of a generated package is matched by reference identity (see
//! [`ReferenceNaming`]) against a baseline message in a [`ReferenceLookup`].
//! When a counterpart exists, fields are unified by name: shared fields take
//! the baseline tag, and fields new in this version receive tags the baseline
//! does not use. This keeps messages from different versions layout-compatible
//! for encodings that identify fields purely by tag.
//!
//! This is best-effort. It does not guarantee binary compatibility; that must
//! be verified independently.
//!
//! # Tag allocation for new fields
//!
//! A field absent from the baseline keeps its own tag when that tag is not
//! reserved by the baseline (used by a field or covered by a reserved range)
//! and not already taken by another field of the result. Otherwise, in field
//! order, it receives the lowest free tag strictly above the baseline's
//! highest reserved tag, skipping [`IMPLEMENTATION_RESERVED`].
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use protogen_core::*;
//!
//! let mut reference = HashMap::new();
//! reference.insert(
//!     "com.google.fhir.r4.core.Patient".to_string(),
//!     Message::new("Patient")
//!         .with_field(Field::new("id", 1, "Id"))
//!         .with_field(Field::new("active", 2, "Boolean"))
//!         .with_field(Field::new("name", 3, "HumanName")),
//! );
//!
//! let mut file = ProtoFile::new("resources/patient.proto", "google.fhir.r5.core");
//! file.options.java_package = Some("com.google.fhir.r5.core".into());
//! file.messages.push(
//!     Message::new("Patient")
//!         .with_field(Field::new("id", 1, "Id"))
//!         .with_field(Field::new("active", 2, "Boolean"))
//!         .with_field(Field::new("name", 5, "HumanName"))
//!         .with_field(Field::new("gender", 9, "Code")),
//! );
//!
//! let package = ProtoPackage::from_files(vec![file]);
//! let result = stabilize_package_checked(&package, &reference, &StabilizeOptions::default()).unwrap();
//!
//! let patient = &result.package.files[0].messages[0];
//! assert_eq!(patient.field("name").unwrap().tag, 3);
//! assert_eq!(patient.field("gender").unwrap().tag, 9);
//! assert_eq!(result.stats.matched, 1);
//! ```

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    Field, IMPLEMENTATION_RESERVED, Message, ProtoFile, ProtoPackage, ReferenceNaming, qualify,
};

/// Name suffixes excluded from stabilization by default.
///
/// `ContainedResource` gets a per-version tag range from the contained
/// resource offset instead. `SearchParameter` and `OperationDefinition` bind
/// value sets whose meaning changed across versions.
pub const DEFAULT_EXCLUDED_SUFFIXES: &[&str] = &[
    ".ContainedResource",
    ".SearchParameter",
    ".OperationDefinition",
];

/// Read-only lookup from a baseline qualified name to its message.
pub trait ReferenceLookup {
    /// Returns the baseline message with the given qualified name.
    fn lookup(&self, qualified_name: &str) -> Option<&Message>;
}

impl ReferenceLookup for HashMap<String, Message> {
    fn lookup(&self, qualified_name: &str) -> Option<&Message> {
        self.get(qualified_name)
    }
}

/// Knobs for a stabilization run.
#[derive(Debug, Clone)]
pub struct StabilizeOptions {
    /// How reference identities are derived.
    pub naming: ReferenceNaming,
    /// Messages whose qualified name ends with any of these are left as-is.
    pub excluded_suffixes: Vec<String>,
}

impl StabilizeOptions {
    /// Returns `true` if `qualified_name` ends with an excluded suffix.
    pub fn is_excluded(&self, qualified_name: &str) -> bool {
        self.excluded_suffixes
            .iter()
            .any(|suffix| qualified_name.ends_with(suffix.as_str()))
    }
}

impl Default for StabilizeOptions {
    fn default() -> Self {
        Self {
            naming: ReferenceNaming::default(),
            excluded_suffixes: DEFAULT_EXCLUDED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Counters describing one stabilization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilizeStats {
    /// Messages visited (excluded ones included, their nested ones not).
    pub examined: usize,
    /// Messages that found a reference counterpart.
    pub matched: usize,
    /// Messages skipped by suffix.
    pub skipped: usize,
    /// Fields whose tag changed.
    pub retagged_fields: usize,
}

impl StabilizeStats {
    /// Returns `true` if at least one message matched.
    pub fn matched_any(&self) -> bool {
        self.matched > 0
    }

    fn absorb(&mut self, other: StabilizeStats) {
        self.examined += other.examined;
        self.matched += other.matched;
        self.skipped += other.skipped;
        self.retagged_fields += other.retagged_fields;
    }
}

/// Stabilization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StabilizeError {
    /// Stabilization was requested but nothing matched, which points at a
    /// missing or misnamed reference index rather than a disjoint schema.
    #[error(
        "legacy tag stabilization requested, but no matching reference messages found \
         ({examined} message(s) examined)"
    )]
    NoMatchingMessages {
        /// Number of messages examined.
        examined: usize,
    },
}

/// A package after stabilization, with the run counters.
#[derive(Debug, Clone)]
pub struct StabilizedPackage {
    /// The rewritten package.
    pub package: ProtoPackage,
    /// Counters aggregated over the whole package.
    pub stats: StabilizeStats,
}

/// Stabilizes every message of `package` against `reference`.
///
/// Returns a new package; the input is not modified. A run with zero matches
/// is not an error here; see [`stabilize_package_checked`].
pub fn stabilize_package<R>(
    package: &ProtoPackage,
    reference: &R,
    options: &StabilizeOptions,
) -> StabilizedPackage
where
    R: ReferenceLookup + ?Sized,
{
    let mut stats = StabilizeStats::default();
    let files = package
        .files
        .iter()
        .map(|file| {
            let (stabilized, file_stats) = stabilize_file(file, reference, options);
            stats.absorb(file_stats);
            stabilized
        })
        .collect();

    StabilizedPackage {
        package: ProtoPackage::from_files(files),
        stats,
    }
}

/// Like [`stabilize_package`], but fails when no message matched.
///
/// # Errors
///
/// Returns [`StabilizeError::NoMatchingMessages`] if no message of the
/// package found a reference counterpart.
pub fn stabilize_package_checked<R>(
    package: &ProtoPackage,
    reference: &R,
    options: &StabilizeOptions,
) -> Result<StabilizedPackage, StabilizeError>
where
    R: ReferenceLookup + ?Sized,
{
    let result = stabilize_package(package, reference, options);
    if !result.stats.matched_any() {
        return Err(StabilizeError::NoMatchingMessages {
            examined: result.stats.examined,
        });
    }

    info!(
        examined = result.stats.examined,
        matched = result.stats.matched,
        skipped = result.stats.skipped,
        retagged_fields = result.stats.retagged_fields,
        "Stabilized field tags"
    );
    Ok(result)
}

fn stabilize_file<R>(
    file: &ProtoFile,
    reference: &R,
    options: &StabilizeOptions,
) -> (ProtoFile, StabilizeStats)
where
    R: ReferenceLookup + ?Sized,
{
    let mut stats = StabilizeStats::default();
    let mut stabilized = file.clone();
    stabilized.messages = file
        .messages
        .iter()
        .map(|message| {
            let (result, message_stats) =
                stabilize_message(message, &file.qualified_name(message), reference, options);
            stats.absorb(message_stats);
            result
        })
        .collect();
    (stabilized, stats)
}

/// Stabilizes one message tree whose root has the given qualified name.
///
/// Returns the rewritten message and the counters for this tree.
pub fn stabilize_message<R>(
    message: &Message,
    qualified_name: &str,
    reference: &R,
    options: &StabilizeOptions,
) -> (Message, StabilizeStats)
where
    R: ReferenceLookup + ?Sized,
{
    let mut stats = StabilizeStats {
        examined: 1,
        ..StabilizeStats::default()
    };

    if options.is_excluded(qualified_name) {
        info!(message = qualified_name, "Skipping excluded message");
        stats.skipped = 1;
        return (message.clone(), stats);
    }

    let mut result = message.clone();

    let counterpart = options
        .naming
        .reference_identity(qualified_name)
        .and_then(|identity| reference.lookup(&identity));
    match counterpart {
        Some(baseline) => {
            let (fields, changed) = unify_fields(message, baseline);
            debug!(
                message = qualified_name,
                retagged_fields = changed,
                "Unified with reference message"
            );
            result.fields = fields;
            stats.matched = 1;
            stats.retagged_fields = changed;
        }
        None => {
            debug!(message = qualified_name, "No reference counterpart");
        }
    }

    result.nested = message
        .nested
        .iter()
        .map(|nested| {
            let (stabilized, nested_stats) = stabilize_message(
                nested,
                &qualify(qualified_name, &nested.name),
                reference,
                options,
            );
            stats.absorb(nested_stats);
            stabilized
        })
        .collect();

    (result, stats)
}

/// Aligns the fields of `candidate` with those of `baseline` by name.
///
/// Returns the rewritten fields, in the candidate's order, and the number of
/// fields whose tag changed.
///
/// # Examples
///
/// ```
/// use protogen_core::*;
///
/// let baseline = Message::new("Patient")
///     .with_field(Field::new("id", 1, "Id"))
///     .with_field(Field::new("name", 3, "HumanName"));
/// let candidate = Message::new("Patient")
///     .with_field(Field::new("id", 1, "Id"))
///     .with_field(Field::new("name", 2, "HumanName"))
///     .with_field(Field::new("gender", 3, "Code"));
///
/// let (fields, changed) = unify_fields(&candidate, &baseline);
/// let tags: Vec<u32> = fields.iter().map(|f| f.tag).collect();
/// assert_eq!(tags, vec![1, 3, 4]);
/// assert_eq!(changed, 2);
/// ```
pub fn unify_fields(candidate: &Message, baseline: &Message) -> (Vec<Field>, usize) {
    let mut taken: BTreeSet<u32> = BTreeSet::new();
    let mut assigned: Vec<Option<u32>> = Vec::with_capacity(candidate.fields.len());

    for field in &candidate.fields {
        match baseline.field(&field.name) {
            Some(shared) => {
                taken.insert(shared.tag);
                assigned.push(Some(shared.tag));
            }
            None => assigned.push(None),
        }
    }

    for (field, slot) in candidate.fields.iter().zip(assigned.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        let own = field.tag;
        if !baseline.is_tag_reserved(own)
            && !IMPLEMENTATION_RESERVED.contains(own)
            && taken.insert(own)
        {
            *slot = Some(own);
        }
    }

    let mut next = baseline.highest_reserved_tag().map_or(1, |tag| tag + 1);
    for slot in assigned.iter_mut().filter(|slot| slot.is_none()) {
        while taken.contains(&next)
            || baseline.is_tag_reserved(next)
            || IMPLEMENTATION_RESERVED.contains(next)
        {
            next = if IMPLEMENTATION_RESERVED.contains(next) {
                IMPLEMENTATION_RESERVED.end + 1
            } else {
                next + 1
            };
        }
        taken.insert(next);
        *slot = Some(next);
    }

    let mut changed = 0;
    let fields = candidate
        .fields
        .iter()
        .zip(assigned)
        .map(|(field, tag)| {
            let tag = tag.unwrap_or(field.tag);
            if tag != field.tag {
                changed += 1;
            }
            field.with_tag(tag)
        })
        .collect();

    (fields, changed)
}
