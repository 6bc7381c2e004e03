//! Run configuration for proto package generation.
//!
//! Defines the YAML-serializable configuration that controls where the input
//! package is read from, which packages the generated files declare, and
//! whether legacy tag stabilization runs.
//!
//! # Example YAML
//!
//! ```yaml
//! output_directory: proto/google/fhir/proto/r5/core
//! input_package: packages/hl7.fhir.r5.core
//! proto_package: google.fhir.r5.core
//! java_proto_package: com.google.fhir.r5.core
//! license_date: "2023"
//! contained_resource_offset: 5000
//! legacy_retagging: true
//! retagging:
//!   reference_sources:
//!     - baseline/r4
//!   baseline_token: r4
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use protogen_core::{
    DEFAULT_BASELINE_TOKEN, DEFAULT_EXCLUDED_SUFFIXES, DEFAULT_VERSION_PATTERN, ReferenceNaming,
    StabilizeOptions,
};
use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, Result};

/// Default Go import root used for `go_package` annotations.
pub const DEFAULT_GO_IMPORT_ROOT: &str = "github.com/google/fhir/go";

/// Default archive file name inside the output directory.
pub const DEFAULT_ARCHIVE_NAME: &str = "output.zip";

/// Settings handed to generators: the packages and paths every generated
/// file declares.
///
/// # Examples
///
/// ```
/// use protogen_assembly::ProtogenConfig;
///
/// let config = ProtogenConfig::new("google.fhir.r5.core", "com.google.fhir.r5.core")
///     .with_source_directory("proto/google/fhir/proto/r5/core");
/// assert_eq!(config.source_path("datatypes.proto"), "proto/google/fhir/proto/r5/core/datatypes.proto");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtogenConfig {
    /// Proto package declared by generated files.
    pub proto_package: String,
    /// Java package declared by generated files.
    pub java_proto_package: String,
    /// Date used in the license header.
    #[serde(default)]
    pub license_date: String,
    /// Directory in the source tree where the generated files live.
    #[serde(default)]
    pub source_directory: String,
}

impl ProtogenConfig {
    /// Creates a config with the two package identifiers.
    pub fn new(proto_package: &str, java_proto_package: &str) -> Self {
        Self {
            proto_package: proto_package.to_string(),
            java_proto_package: java_proto_package.to_string(),
            license_date: String::new(),
            source_directory: String::new(),
        }
    }

    /// Sets the source directory.
    pub fn with_source_directory(mut self, source_directory: &str) -> Self {
        self.source_directory = source_directory.to_string();
        self
    }

    /// Sets the license date.
    pub fn with_license_date(mut self, license_date: &str) -> Self {
        self.license_date = license_date.to_string();
        self
    }

    /// Returns `path` prefixed with the source directory, as used in imports.
    pub fn source_path(&self, path: &str) -> String {
        let dir = self.source_directory.trim_end_matches('/');
        if dir.is_empty() {
            path.to_string()
        } else {
            format!("{dir}/{path}")
        }
    }
}

/// Settings for legacy tag stabilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetagConfig {
    /// Baseline descriptor directories or bundle files, merged in order. A
    /// source that fails to load aborts the run.
    #[serde(default)]
    pub reference_sources: Vec<PathBuf>,
    /// Message name suffixes left untouched.
    #[serde(default = "default_excluded_suffixes")]
    pub excluded_suffixes: Vec<String>,
    /// Version token of the baseline package.
    #[serde(default = "default_baseline_token")]
    pub baseline_token: String,
    /// Regex matching the version segment of a qualified name.
    #[serde(default = "default_version_pattern")]
    pub version_pattern: String,
}

impl RetagConfig {
    /// Builds the stabilizer options described by this config.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Config`] if the version pattern does not
    /// compile.
    pub fn stabilize_options(&self) -> Result<StabilizeOptions> {
        let naming = ReferenceNaming::new(&self.version_pattern, self.baseline_token.as_str())
            .map_err(|err| {
                AssemblyError::Config(format!(
                    "invalid version pattern '{}': {err}",
                    self.version_pattern
                ))
            })?;
        Ok(StabilizeOptions {
            naming,
            excluded_suffixes: self.excluded_suffixes.clone(),
        })
    }
}

impl Default for RetagConfig {
    fn default() -> Self {
        Self {
            reference_sources: Vec::new(),
            excluded_suffixes: default_excluded_suffixes(),
            baseline_token: default_baseline_token(),
            version_pattern: default_version_pattern(),
        }
    }
}

/// Top-level configuration for one generation run.
///
/// Loaded from a YAML file, or assembled from command-line flags.
///
/// # Examples
///
/// ```
/// use protogen_assembly::RunConfig;
///
/// let config = RunConfig::new(
///     "proto/google/fhir/proto/r5/core",
///     "packages/hl7.fhir.r5.core",
///     "google.fhir.r5.core",
///     "com.google.fhir.r5.core",
/// );
/// assert_eq!(config.contained_resource_offset, 0);
/// assert!(!config.legacy_retagging);
/// assert!(config.archive_path().ends_with("output.zip"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory in the source tree for the generated files; the archive is
    /// written here.
    pub output_directory: PathBuf,
    /// Input package directory or JSON file.
    pub input_package: PathBuf,
    /// Proto package for generated messages.
    pub proto_package: String,
    /// Java package for generated messages.
    pub java_proto_package: String,
    /// Date used in the license header.
    #[serde(default)]
    pub license_date: String,
    /// Tag offset for `ContainedResource` fields, so that versions use
    /// non-overlapping ranges.
    #[serde(default)]
    pub contained_resource_offset: u32,
    /// Align tags with the baseline version.
    #[serde(default)]
    pub legacy_retagging: bool,
    /// Stabilization settings.
    #[serde(default)]
    pub retagging: RetagConfig,
    /// Root of the Go import path.
    #[serde(default = "default_go_import_root")]
    pub go_import_root: String,
    /// Archive file name inside the output directory.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

impl RunConfig {
    /// Creates a config with required fields and defaults elsewhere.
    pub fn new(
        output_directory: impl Into<PathBuf>,
        input_package: impl Into<PathBuf>,
        proto_package: &str,
        java_proto_package: &str,
    ) -> Self {
        Self {
            output_directory: output_directory.into(),
            input_package: input_package.into(),
            proto_package: proto_package.to_string(),
            java_proto_package: java_proto_package.to_string(),
            license_date: String::new(),
            contained_resource_offset: 0,
            legacy_retagging: false,
            retagging: RetagConfig::default(),
            go_import_root: default_go_import_root(),
            archive_name: default_archive_name(),
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Io`] if the file cannot be read, or
    /// [`AssemblyError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Io`] if the file cannot be written, or
    /// [`AssemblyError::Yaml`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns the generator settings derived from this run config. The
    /// output directory doubles as the source directory.
    pub fn protogen_config(&self) -> ProtogenConfig {
        ProtogenConfig {
            proto_package: self.proto_package.clone(),
            java_proto_package: self.java_proto_package.clone(),
            license_date: self.license_date.clone(),
            source_directory: self.output_directory.to_string_lossy().into_owned(),
        }
    }

    /// Returns the final archive path.
    pub fn archive_path(&self) -> PathBuf {
        self.output_directory.join(&self.archive_name)
    }

    /// Checks option combinations that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Config`] for empty package identifiers, an
    /// empty archive name, or retagging without reference sources.
    pub fn validate(&self) -> Result<()> {
        if self.proto_package.trim().is_empty() {
            return Err(AssemblyError::Config("proto package cannot be empty".into()));
        }
        if self.java_proto_package.trim().is_empty() {
            return Err(AssemblyError::Config(
                "java proto package cannot be empty".into(),
            ));
        }
        if self.archive_name.trim().is_empty() {
            return Err(AssemblyError::Config("archive name cannot be empty".into()));
        }
        if self.legacy_retagging && self.retagging.reference_sources.is_empty() {
            return Err(AssemblyError::Config(
                "legacy retagging requested, but no reference sources configured".into(),
            ));
        }
        Ok(())
    }
}

fn default_excluded_suffixes() -> Vec<String> {
    DEFAULT_EXCLUDED_SUFFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_baseline_token() -> String {
    DEFAULT_BASELINE_TOKEN.to_string()
}

fn default_version_pattern() -> String {
    DEFAULT_VERSION_PATTERN.to_string()
}

fn default_go_import_root() -> String {
    DEFAULT_GO_IMPORT_ROOT.to_string()
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.to_string()
}
