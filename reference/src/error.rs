//! Error types for reference index operations.
//!
//! Covers I/O and JSON failures while reading baseline descriptors, duplicate
//! qualified names, and failures tied to a configured source path.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building a reference index.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Two baseline messages share a qualified name.
    #[error("duplicate reference message: {0}")]
    DuplicateMessage(String),

    /// A configured source could not be loaded.
    #[error("failed to load reference source {}: {source}", path.display())]
    Source {
        /// Path of the failing source.
        path: PathBuf,
        /// Underlying failure.
        source: Box<ReferenceError>,
    },

    /// No source was configured.
    #[error("no reference sources configured")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`ReferenceError`].
pub type Result<T> = std::result::Result<T, ReferenceError>;
