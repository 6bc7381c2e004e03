//! Proto package assembly, stabilization and zip packaging.
//!
//! A run loads an input package, asks the generators for every file of the
//! proto package in a fixed order, optionally aligns field tags with a
//! baseline [`ReferenceIndex`](protogen_reference::ReferenceIndex), and
//! writes the rendered files into a deterministic zip archive.
//!
//! # Example
//!
//! ```no_run
//! use protogen_assembly::{RunConfig, run};
//!
//! let config = RunConfig::load("protogen.yaml")?;
//! let summary = run(&config)?;
//! println!("wrote {} files to {}", summary.files, summary.archive_path.display());
//! # Ok::<(), protogen_assembly::AssemblyError>(())
//! ```

mod archive;
mod assemble;
mod config;
mod error;
mod generate;
mod pipeline;
mod render;

pub use archive::{ArchiveSink, ArchiveSummary, ENTRY_PERMISSIONS, ZipSink, write_archive, write_package};
pub use assemble::{
    AssemblySettings, BUNDLE_FILE_PATH, CODES_FILE_PATH, DATATYPES_FILE_PATH,
    LEGACY_BASELINE_VERSION, LEGACY_REFERENCE_RESOURCE_NAMES, VALUESETS_FILE_PATH,
    annotate_go_packages, assemble_package, collect_files, find_bundle, go_package_for,
    resource_file_path, to_snake_case,
};
pub use config::{DEFAULT_ARCHIVE_NAME, DEFAULT_GO_IMPORT_ROOT, ProtogenConfig, RetagConfig, RunConfig};
pub use error::{AssemblyError, Result};
pub use generate::{
    CONTAINED_RESOURCE_MESSAGE, DescriptorGenerator, JsonPackageLoader, PACKAGE_MANIFEST_NAME,
    PackageLoader, REFERENCE_ID_TYPE, REFERENCE_MESSAGE, ResourceGenerator, TerminologyGenerator,
};
pub use pipeline::{RunSummary, load_reference_index, run, run_with};
pub use render::{ProtoTextRenderer, Renderer};
