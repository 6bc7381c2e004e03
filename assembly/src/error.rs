//! Error types for assembly, stabilization and packaging runs.

use protogen_core::{StabilizeError, ValidationError};
use protogen_reference::ReferenceError;
use thiserror::Error;

/// Errors that can abort a generation run.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The input package declares more than one bundle resource.
    #[error("more than one bundle resource found: {first} and {second}")]
    MultipleBundles {
        /// URL of the first bundle definition.
        first: String,
        /// URL of the second bundle definition.
        second: String,
    },

    /// An upstream generator could not produce a file.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The assembled package violates a structural invariant.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid or inconsistent run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reference index loading failure.
    #[error("reference index: {0}")]
    Reference(#[from] ReferenceError),

    /// Tag stabilization failure.
    #[error(transparent)]
    Stabilize(#[from] StabilizeError),

    /// A file could not be rendered.
    #[error("failed to render {path}: {message}")]
    Render {
        /// Path of the file being rendered.
        path: String,
        /// Renderer-provided reason.
        message: String,
    },

    /// Two archive entries share a name.
    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// Zip container failure.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Convenience alias for results with [`AssemblyError`].
pub type Result<T> = std::result::Result<T, AssemblyError>;
