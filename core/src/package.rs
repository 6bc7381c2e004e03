use serde::{Deserialize, Serialize};

use crate::ProtoFile;

/// Ordered set of generated proto files destined for one archive.
///
/// File order is significant: it determines archive entry order, so two runs
/// over identical inputs produce identical archives. Paths must be unique;
/// see [`validate_package`](crate::validate_package).
///
/// # Examples
///
/// ```
/// use protogen_core::*;
///
/// let package = ProtoPackage::from_files(vec![
///     ProtoFile::new("valuesets.proto", "google.fhir.r5.core"),
///     ProtoFile::new("codes.proto", "google.fhir.r5.core"),
/// ]);
///
/// assert_eq!(package.file_count(), 2);
/// assert_eq!(package.paths().collect::<Vec<_>>(), vec!["valuesets.proto", "codes.proto"]);
/// assert!(package.file("codes.proto").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoPackage {
    /// Files in archive order.
    #[serde(default)]
    pub files: Vec<ProtoFile>,
}

impl ProtoPackage {
    /// Creates an empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a package from files in the given order.
    pub fn from_files(files: Vec<ProtoFile>) -> Self {
        Self { files }
    }

    /// Returns the number of files in this package.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns the number of messages across all files, nested ones included.
    pub fn message_count(&self) -> usize {
        self.files.iter().map(ProtoFile::message_count).sum()
    }

    /// Returns file paths in package order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Looks up a file by path.
    pub fn file(&self, path: &str) -> Option<&ProtoFile> {
        self.files.iter().find(|f| f.path == path)
    }
}
