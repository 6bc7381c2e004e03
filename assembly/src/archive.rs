//! Deterministic packaging of a rendered package into a zip archive.
//!
//! Entries are written in package order with a fixed timestamp, fixed
//! permissions and a fixed compression method, so identical packages yield
//! byte-identical archives. The archive is staged in a temporary file next to
//! the target and moved into place only after every entry is written; a
//! failed run leaves no partial archive behind.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use protogen_core::ProtoPackage;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{AssemblyError, Result};
use crate::render::Renderer;

/// Permissions recorded for every archive entry.
pub const ENTRY_PERMISSIONS: u32 = 0o644;

/// Destination for named archive entries.
pub trait ArchiveSink {
    /// Appends one entry.
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// In-memory sink, useful for inspecting what would be archived.
impl ArchiveSink for Vec<(String, Vec<u8>)> {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entry names in write order.
    pub entries: Vec<String>,
    /// Hex SHA-256 over entry names and contents in write order.
    pub sha256: String,
}

/// Zip sink staged in a temporary file.
pub struct ZipSink {
    writer: ZipWriter<NamedTempFile>,
    target: PathBuf,
}

impl ZipSink {
    /// Starts an archive that will be moved to `target` on
    /// [`finish`](Self::finish). Missing parent directories are created.
    pub fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let staging = NamedTempFile::new_in(&parent)?;
        Ok(Self {
            writer: ZipWriter::new(staging),
            target,
        })
    }

    fn entry_options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(ENTRY_PERMISSIONS)
    }

    /// Completes the archive and moves it to its target path.
    pub fn finish(self) -> Result<PathBuf> {
        let staging = self.writer.finish()?;
        staging.as_file().sync_all()?;
        staging.persist(&self.target).map_err(|e| e.error)?;
        Ok(self.target)
    }
}

impl ArchiveSink for ZipSink {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.writer.start_file(name, Self::entry_options())?;
        self.writer.write_all(bytes)?;
        Ok(())
    }
}

/// Renders every file of `package` and appends it to `sink` in package order.
///
/// # Errors
///
/// Returns [`AssemblyError::Render`] when a file fails to render,
/// [`AssemblyError::DuplicateEntry`] when two files share a path, or the
/// sink's error.
pub fn write_package(
    package: &ProtoPackage,
    renderer: &dyn Renderer,
    sink: &mut dyn ArchiveSink,
) -> Result<ArchiveSummary> {
    let mut seen = HashSet::new();
    let mut hasher = Sha256::new();
    let mut entries = Vec::with_capacity(package.file_count());

    for file in &package.files {
        if !seen.insert(file.path.as_str()) {
            return Err(AssemblyError::DuplicateEntry(file.path.clone()));
        }
        let bytes = renderer.render(file).map_err(|message| AssemblyError::Render {
            path: file.path.clone(),
            message,
        })?;

        sink.add_entry(&file.path, &bytes)?;
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
        debug!(entry = %file.path, bytes = bytes.len(), "Added archive entry");
        entries.push(file.path.clone());
    }

    Ok(ArchiveSummary {
        entries,
        sha256: format!("{:x}", hasher.finalize()),
    })
}

/// Writes `package` as a zip archive at `target`.
///
/// Nothing is left at `target` if any step fails.
pub fn write_archive(
    package: &ProtoPackage,
    renderer: &dyn Renderer,
    target: &Path,
) -> Result<ArchiveSummary> {
    let mut sink = ZipSink::create(target)?;
    let summary = write_package(package, renderer, &mut sink)?;
    let path = sink.finish()?;
    info!(
        path = %path.display(),
        entries = summary.entries.len(),
        sha256 = %summary.sha256,
        "Wrote archive"
    );
    Ok(summary)
}
