//! Reference index loading with a builder over several sources.
//!
//! Provides [`ReferenceIndex`] for O(1) lookup of baseline messages by
//! qualified name, and [`IndexBuilder`] for constructing one from several
//! sources that are merged into one lookup.
//!
//! # Loading patterns
//!
//! ```no_run
//! use protogen_reference::ReferenceIndex;
//!
//! // Load from a directory of ProtoFile JSON descriptors
//! let index = ReferenceIndex::from_dir("baseline/r4/").unwrap();
//! assert!(index.contains("com.google.fhir.r4.core.Patient"));
//!
//! // Load from a single ProtoPackage JSON bundle
//! let index = ReferenceIndex::from_bundle("baseline/r4.json").unwrap();
//!
//! // Use the builder to merge several sources
//! let index = ReferenceIndex::builder()
//!     .from_dir("baseline/r4/")
//!     .from_bundle("baseline/r4.json")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Every nested message is indexed under its own qualified name, e.g.
//! `com.google.fhir.r4.core.Patient.Contact`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use protogen_core::{Message, ProtoFile, ProtoPackage, ReferenceLookup, qualify};
use tracing::debug;

use crate::error::{ReferenceError, Result};

/// Describes where a [`ReferenceIndex`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    /// Loaded from a directory of individual `ProtoFile` JSON files.
    Directory(PathBuf),
    /// Loaded from a single `ProtoPackage` JSON file.
    Bundle(PathBuf),
    /// Built from an in-memory package.
    Package,
    /// Merged from several sources.
    Multiple(Vec<IndexSource>),
}

/// Read-only map from baseline qualified message names to messages.
///
/// # Examples
///
/// ```
/// use protogen_core::*;
/// use protogen_reference::ReferenceIndex;
///
/// let mut file = ProtoFile::new("resources/patient.proto", "google.fhir.r4.core");
/// file.options.java_package = Some("com.google.fhir.r4.core".into());
/// file.messages.push(
///     Message::new("Patient")
///         .with_field(Field::new("id", 1, "Id"))
///         .with_nested(Message::new("Contact")),
/// );
///
/// let index = ReferenceIndex::from_package(&ProtoPackage::from_files(vec![file])).unwrap();
/// assert_eq!(index.len(), 2);
/// assert!(index.get("com.google.fhir.r4.core.Patient").is_some());
/// assert!(index.contains("com.google.fhir.r4.core.Patient.Contact"));
/// ```
#[derive(Debug)]
pub struct ReferenceIndex {
    messages: HashMap<String, Message>,
    source: IndexSource,
}

impl ReferenceIndex {
    /// Returns a new [`IndexBuilder`] for merging several sources.
    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    /// Indexes every message of an in-memory baseline package.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::DuplicateMessage`] if two messages share a
    /// qualified name.
    pub fn from_package(package: &ProtoPackage) -> Result<Self> {
        let mut messages = HashMap::new();
        for file in &package.files {
            index_file(file, &mut messages)?;
        }
        Ok(Self {
            messages,
            source: IndexSource::Package,
        })
    }

    /// Loads baseline descriptors from a directory of `*.json` files.
    ///
    /// Each file is parsed as a [`ProtoFile`]. Files are indexed in path
    /// order so that duplicate detection is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::IoError`] if the directory or a file cannot
    /// be read, [`ReferenceError::JsonError`] if a file is not a valid
    /// descriptor, or [`ReferenceError::DuplicateMessage`] on name clashes.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(file_path);
            }
        }
        paths.sort();

        let mut messages = HashMap::new();
        for file_path in &paths {
            let file = std::fs::File::open(file_path)?;
            let reader = std::io::BufReader::new(file);
            let descriptor: ProtoFile = serde_json::from_reader(reader)?;
            index_file(&descriptor, &mut messages)?;
        }

        debug!(
            directory = %path.display(),
            files = paths.len(),
            messages = messages.len(),
            "Loaded reference directory"
        );
        Ok(Self {
            messages,
            source: IndexSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads baseline descriptors from a single [`ProtoPackage`] JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::IoError`] if the file cannot be read,
    /// [`ReferenceError::JsonError`] if parsing fails, or
    /// [`ReferenceError::DuplicateMessage`] on name clashes.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let package: ProtoPackage = serde_json::from_reader(reader)?;

        let mut index = Self::from_package(&package)?;
        index.source = IndexSource::Bundle(path.to_path_buf());
        debug!(
            bundle = %path.display(),
            messages = index.len(),
            "Loaded reference bundle"
        );
        Ok(index)
    }

    /// Looks up a baseline message by qualified name in O(1) time.
    pub fn get(&self, qualified_name: &str) -> Option<&Message> {
        self.messages.get(qualified_name)
    }

    /// Returns `true` if the index holds a message with this qualified name.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.messages.contains_key(qualified_name)
    }

    /// Returns the number of indexed messages, nested ones included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the indexed qualified names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &IndexSource {
        &self.source
    }
}

impl ReferenceLookup for ReferenceIndex {
    fn lookup(&self, qualified_name: &str) -> Option<&Message> {
        self.get(qualified_name)
    }
}

fn index_file(file: &ProtoFile, messages: &mut HashMap<String, Message>) -> Result<()> {
    for message in &file.messages {
        index_message(message, file.qualified_name(message), messages)?;
    }
    Ok(())
}

fn index_message(
    message: &Message,
    qualified_name: String,
    messages: &mut HashMap<String, Message>,
) -> Result<()> {
    for nested in &message.nested {
        index_message(nested, qualify(&qualified_name, &nested.name), messages)?;
    }
    if messages.contains_key(&qualified_name) {
        return Err(ReferenceError::DuplicateMessage(qualified_name));
    }
    messages.insert(qualified_name, message.clone());
    Ok(())
}

/// Builder for constructing a [`ReferenceIndex`] from several sources.
///
/// Every source is loaded in the order it was added and the results are
/// merged into one index. A source that fails to load aborts the build with
/// [`ReferenceError::Source`], naming the offending path.
///
/// # Example
///
/// ```no_run
/// use protogen_reference::ReferenceIndex;
///
/// let index = ReferenceIndex::builder()
///     .from_dir("/opt/baseline/r4/resources/")
///     .from_bundle("/opt/baseline/r4/datatypes.json")
///     .build()
///     .unwrap();
/// ```
pub struct IndexBuilder {
    sources: Vec<IndexSource>,
}

impl IndexBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of `ProtoFile` JSON descriptors as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(IndexSource::Directory(path.into()));
        self
    }

    /// Adds a `ProtoPackage` bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(IndexSource::Bundle(path.into()));
        self
    }

    /// Adds a path as a source, treating directories as descriptor
    /// directories and anything else as a bundle file.
    pub fn from_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            self.from_dir(path)
        } else {
            self.from_bundle(path)
        }
    }

    /// Loads every configured source and merges them into one index.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::NoSourcesAvailable`] if no source is
    /// configured, [`ReferenceError::Source`] wrapping the first load
    /// failure, or [`ReferenceError::DuplicateMessage`] if two sources
    /// define the same qualified name.
    pub fn build(self) -> Result<ReferenceIndex> {
        if self.sources.is_empty() {
            return Err(ReferenceError::NoSourcesAvailable);
        }

        let mut messages = HashMap::new();
        for source in &self.sources {
            let (path, result) = match source {
                IndexSource::Directory(path) => (path, ReferenceIndex::from_dir(path)),
                IndexSource::Bundle(path) => (path, ReferenceIndex::from_bundle(path)),
                IndexSource::Package | IndexSource::Multiple(_) => continue,
            };

            let index = result.map_err(|err| ReferenceError::Source {
                path: path.clone(),
                source: Box::new(err),
            })?;
            for (name, message) in index.messages {
                if messages.contains_key(&name) {
                    return Err(ReferenceError::DuplicateMessage(name));
                }
                messages.insert(name, message);
            }
        }

        let mut sources = self.sources;
        let source = if sources.len() == 1 {
            sources.remove(0)
        } else {
            IndexSource::Multiple(sources)
        };
        Ok(ReferenceIndex { messages, source })
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}
