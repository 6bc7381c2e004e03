//! Package assembly: collecting generated files in a deterministic order and
//! stamping output-path annotations.
//!
//! Assembly is two pure passes over an ordered list of files:
//!
//! 1. [`collect_files`] asks the generators for every file of the package:
//!    `valuesets.proto`, `codes.proto`, one `resources/<name>.proto` per
//!    concrete resource, the bundle file, and `datatypes.proto`.
//! 2. [`annotate_go_packages`] stamps each file's `go_package` from the
//!    source directory and the file path.
//!
//! [`assemble_package`] runs both and validates the result.

use protogen_core::{ProtoFile, ProtoPackage, SourcePackage, StructureDefinition, validate_package};
use tracing::{debug, info};

use crate::error::{AssemblyError, Result};
use crate::generate::{ResourceGenerator, TerminologyGenerator};

/// Archive path of the value-set file.
pub const VALUESETS_FILE_PATH: &str = "valuesets.proto";

/// Archive path of the code-system file.
pub const CODES_FILE_PATH: &str = "codes.proto";

/// Archive path of the datatypes file.
pub const DATATYPES_FILE_PATH: &str = "datatypes.proto";

/// Archive path of the bundle and contained-resource file.
pub const BUNDLE_FILE_PATH: &str = "resources/bundle_and_contained_resource.proto";

/// Semantic version whose datatypes keep references to abstract resources.
pub const LEGACY_BASELINE_VERSION: &str = "4.0.1";

/// Resource names injected into the datatype generator's input for
/// [`LEGACY_BASELINE_VERSION`], keeping their typed reference fields.
pub const LEGACY_REFERENCE_RESOURCE_NAMES: &[&str] = &["DomainResource", "MetadataResource"];

/// Settings that shape the assembled package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblySettings {
    /// Tag offset for contained-resource fields.
    pub contained_resource_offset: u32,
    /// Directory in the source tree where the files live.
    pub source_directory: String,
    /// Root of the Go import path.
    pub go_import_root: String,
}

/// Converts a CamelCase type name to snake_case.
///
/// # Examples
///
/// ```
/// use protogen_assembly::to_snake_case;
///
/// assert_eq!(to_snake_case("Patient"), "patient");
/// assert_eq!(to_snake_case("MedicationRequest"), "medication_request");
/// assert_eq!(to_snake_case("SDTMDataset"), "sdtm_dataset");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Returns the archive path of a resource's file.
///
/// # Examples
///
/// ```
/// use protogen_assembly::resource_file_path;
///
/// assert_eq!(resource_file_path("MedicationRequest"), "resources/medication_request.proto");
/// ```
pub fn resource_file_path(resource_name: &str) -> String {
    format!("resources/{}.proto", to_snake_case(resource_name))
}

/// Assembles, annotates and validates the package for `source`.
///
/// # Errors
///
/// Returns [`AssemblyError::MultipleBundles`] when more than one bundle
/// resource is present, any generator error, or
/// [`AssemblyError::Validation`] when the assembled package has duplicate
/// paths or tags, or tags in the implementation-reserved range.
pub fn assemble_package(
    source: &SourcePackage,
    terminology: &dyn TerminologyGenerator,
    resources: &dyn ResourceGenerator,
    settings: &AssemblySettings,
) -> Result<ProtoPackage> {
    let files = collect_files(
        source,
        terminology,
        resources,
        settings.contained_resource_offset,
    )?;
    let files = annotate_go_packages(files, &settings.source_directory, &settings.go_import_root);
    let package = ProtoPackage::from_files(files);

    if let Some(first) = validate_package(&package).into_iter().next() {
        return Err(AssemblyError::Validation(first));
    }

    info!(
        version = %source.semantic_version,
        files = package.file_count(),
        messages = package.message_count(),
        "Assembled package"
    );
    Ok(package)
}

/// Returns the single bundle definition among the concrete resources, if
/// any.
///
/// # Errors
///
/// Returns [`AssemblyError::MultipleBundles`] when two or more definitions
/// qualify.
pub fn find_bundle(source: &SourcePackage) -> Result<Option<&StructureDefinition>> {
    let mut bundles = source.concrete_resources().filter(|d| d.is_bundle());
    let first = bundles.next();
    if let (Some(first), Some(second)) = (first, bundles.next()) {
        return Err(AssemblyError::MultipleBundles {
            first: first.url.clone(),
            second: second.url.clone(),
        });
    }
    Ok(first)
}

/// Generates every file of the package in archive order.
///
/// # Errors
///
/// Returns [`AssemblyError::MultipleBundles`] before any generator runs when
/// the bundle is ambiguous, or the first generator error.
pub fn collect_files(
    source: &SourcePackage,
    terminology: &dyn TerminologyGenerator,
    resources: &dyn ResourceGenerator,
    contained_resource_offset: u32,
) -> Result<Vec<ProtoFile>> {
    let bundle = find_bundle(source)?;
    let version = source.semantic_version.as_str();

    let mut files = vec![
        with_path(terminology.value_set_file()?, VALUESETS_FILE_PATH),
        with_path(terminology.code_system_file()?, CODES_FILE_PATH),
    ];

    let mut resource_names = Vec::new();
    for definition in source.concrete_resources() {
        let name = definition.type_name();
        if !definition.is_bundle() {
            let file = resources.resource_file(definition, version)?;
            files.push(with_path(file, &resource_file_path(&name)));
        }
        resource_names.push(name);
    }

    match bundle {
        Some(bundle) => {
            let file = resources.bundle_file(
                bundle,
                &resource_names,
                version,
                contained_resource_offset,
            )?;
            files.push(with_path(file, BUNDLE_FILE_PATH));
        }
        None => debug!(version, "No bundle resource, skipping bundle file"),
    }

    if version == LEGACY_BASELINE_VERSION {
        resource_names.extend(LEGACY_REFERENCE_RESOURCE_NAMES.iter().map(|s| s.to_string()));
    }
    files.push(with_path(
        resources.datatypes_file(&resource_names)?,
        DATATYPES_FILE_PATH,
    ));

    Ok(files)
}

fn with_path(mut file: ProtoFile, path: &str) -> ProtoFile {
    file.path = path.to_string();
    file
}

/// Returns the `go_package` for a file at `path`.
///
/// The result is `<root>/<source_directory>/<parent of path>/<stem>_go_proto`
/// with empty segments dropped.
///
/// # Examples
///
/// ```
/// use protogen_assembly::go_package_for;
///
/// assert_eq!(
///     go_package_for("github.com/google/fhir/go", "proto/r5/core", "resources/patient.proto"),
///     "github.com/google/fhir/go/proto/r5/core/resources/patient_go_proto",
/// );
/// assert_eq!(
///     go_package_for("github.com/google/fhir/go", "", "codes.proto"),
///     "github.com/google/fhir/go/codes_go_proto",
/// );
/// ```
pub fn go_package_for(go_import_root: &str, source_directory: &str, path: &str) -> String {
    let (parent, file_name) = match path.rsplit_once('/') {
        Some((parent, file_name)) => (parent, file_name),
        None => ("", path),
    };
    let stem = file_name.strip_suffix(".proto").unwrap_or(file_name);
    let leaf = format!("{stem}_go_proto");

    [go_import_root, source_directory, parent, leaf.as_str()]
        .iter()
        .flat_map(|segment| segment.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Stamps every file's `go_package`. Order is preserved and re-running the
/// pass yields the same files.
pub fn annotate_go_packages(
    files: Vec<ProtoFile>,
    source_directory: &str,
    go_import_root: &str,
) -> Vec<ProtoFile> {
    files
        .into_iter()
        .map(|mut file| {
            file.options.go_package =
                Some(go_package_for(go_import_root, source_directory, &file.path));
            file
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use protogen_core::{Derivation, Message, ValidationError};

    use super::*;
    use crate::config::ProtogenConfig;
    use crate::generate::DescriptorGenerator;

    /// Records the calls it receives and returns empty files.
    #[derive(Default)]
    struct RecordingGenerator {
        bundle_calls: RefCell<Vec<(String, Vec<String>, u32)>>,
        datatype_names: RefCell<Vec<String>>,
    }

    impl TerminologyGenerator for RecordingGenerator {
        fn value_set_file(&self) -> Result<ProtoFile> {
            Ok(ProtoFile::new("", "p").with_message(Message::new("ValueSets")))
        }

        fn code_system_file(&self) -> Result<ProtoFile> {
            Ok(ProtoFile::new("", "p"))
        }
    }

    impl ResourceGenerator for RecordingGenerator {
        fn resource_file(&self, definition: &StructureDefinition, _: &str) -> Result<ProtoFile> {
            Ok(ProtoFile::new("", "p").with_message(Message::new(&definition.type_name())))
        }

        fn bundle_file(
            &self,
            bundle: &StructureDefinition,
            resource_names: &[String],
            _: &str,
            offset: u32,
        ) -> Result<ProtoFile> {
            self.bundle_calls
                .borrow_mut()
                .push((bundle.name.clone(), resource_names.to_vec(), offset));
            Ok(ProtoFile::new("", "p"))
        }

        fn datatypes_file(&self, resource_names: &[String]) -> Result<ProtoFile> {
            *self.datatype_names.borrow_mut() = resource_names.to_vec();
            Ok(ProtoFile::new("", "p"))
        }
    }

    fn settings() -> AssemblySettings {
        AssemblySettings {
            contained_resource_offset: 7,
            source_directory: "proto/r5/core".into(),
            go_import_root: "github.com/google/fhir/go".into(),
        }
    }

    fn source(version: &str, definitions: Vec<StructureDefinition>) -> SourcePackage {
        let mut source = SourcePackage::new(version);
        source.structure_definitions = definitions;
        source
    }

    #[test]
    fn test_file_order_and_bundle_special_case() {
        let mut profile = StructureDefinition::resource("VitalSigns");
        profile.derivation = Derivation::Constraint;
        let mut abstract_resource = StructureDefinition::resource("DomainResource");
        abstract_resource.is_abstract = true;

        let source = source(
            "5.0.0",
            vec![
                StructureDefinition::resource("Account"),
                StructureDefinition::resource("Bundle"),
                profile,
                abstract_resource,
                StructureDefinition::complex_type("HumanName"),
                StructureDefinition::resource("MedicationRequest"),
            ],
        );
        let generator = RecordingGenerator::default();

        let package = assemble_package(&source, &generator, &generator, &settings()).unwrap();
        assert_eq!(
            package.paths().collect::<Vec<_>>(),
            vec![
                "valuesets.proto",
                "codes.proto",
                "resources/account.proto",
                "resources/medication_request.proto",
                "resources/bundle_and_contained_resource.proto",
                "datatypes.proto",
            ]
        );

        let calls = generator.bundle_calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Bundle");
        assert_eq!(calls[0].1, vec!["Account", "Bundle", "MedicationRequest"]);
        assert_eq!(calls[0].2, 7);
        assert_eq!(
            *generator.datatype_names.borrow(),
            vec!["Account", "Bundle", "MedicationRequest"]
        );
    }

    #[test]
    fn test_missing_bundle_omits_bundle_file() {
        let source = source("5.0.0", vec![StructureDefinition::resource("Patient")]);
        let generator = RecordingGenerator::default();

        let package = assemble_package(&source, &generator, &generator, &settings()).unwrap();
        assert!(package.file(BUNDLE_FILE_PATH).is_none());
        assert!(generator.bundle_calls.borrow().is_empty());
        assert_eq!(package.file_count(), 4);
    }

    #[test]
    fn test_two_bundles_are_rejected_before_generation() {
        let mut second = StructureDefinition::resource("Bundle");
        second.name = "BundleCopy".into();
        let source = source(
            "5.0.0",
            vec![StructureDefinition::resource("Bundle"), second],
        );
        let generator = RecordingGenerator::default();

        let err = assemble_package(&source, &generator, &generator, &settings()).unwrap_err();
        assert!(matches!(err, AssemblyError::MultipleBundles { .. }));
        assert!(generator.datatype_names.borrow().is_empty());
    }

    #[test]
    fn test_legacy_version_injects_reference_names_for_datatypes_only() {
        let source = source(
            LEGACY_BASELINE_VERSION,
            vec![
                StructureDefinition::resource("Bundle"),
                StructureDefinition::resource("Patient"),
            ],
        );
        let generator = RecordingGenerator::default();

        let package = assemble_package(&source, &generator, &generator, &settings()).unwrap();
        assert_eq!(
            *generator.datatype_names.borrow(),
            vec!["Bundle", "Patient", "DomainResource", "MetadataResource"]
        );
        assert_eq!(
            generator.bundle_calls.borrow()[0].1,
            vec!["Bundle", "Patient"]
        );
        assert!(package.file("resources/domain_resource.proto").is_none());
        assert!(package.file("resources/metadata_resource.proto").is_none());
    }

    #[test]
    fn test_go_package_annotation_is_idempotent() {
        let files = vec![
            ProtoFile::new("codes.proto", "p"),
            ProtoFile::new("resources/patient.proto", "p"),
        ];
        let once = annotate_go_packages(files, "proto/r5/core/", "github.com/google/fhir/go");
        let twice = annotate_go_packages(once.clone(), "proto/r5/core/", "github.com/google/fhir/go");
        assert_eq!(once, twice);
        assert_eq!(
            once[1].options.go_package.as_deref(),
            Some("github.com/google/fhir/go/proto/r5/core/resources/patient_go_proto")
        );
        assert_eq!(once[0].path, "codes.proto");
    }

    #[test]
    fn test_duplicate_resource_names_fail_validation() {
        let source = source(
            "5.0.0",
            vec![
                StructureDefinition::resource("Patient"),
                StructureDefinition::resource("Patient"),
            ],
        );
        let generator = RecordingGenerator::default();

        let err = assemble_package(&source, &generator, &generator, &settings()).unwrap_err();
        assert!(matches!(err, AssemblyError::Validation(_)));
    }

    #[test]
    fn test_contained_offset_into_reserved_range_fails_validation() {
        let source = source(
            "5.0.0",
            vec![
                StructureDefinition::resource("Bundle").with_message(Message::new("Bundle")),
                StructureDefinition::resource("Patient").with_message(Message::new("Patient")),
            ],
        );
        let config = ProtogenConfig::new("google.fhir.r5.core", "com.google.fhir.r5.core");
        let generator = DescriptorGenerator::new(&source, &config);
        let settings = AssemblySettings {
            contained_resource_offset: 18_999,
            ..settings()
        };

        let err = assemble_package(&source, &generator, &generator, &settings).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Validation(ValidationError::ReservedTag { ref field, tag: 19_000, .. })
                if field == "bundle"
        ));
    }

    #[test]
    fn test_snake_case_edge_cases() {
        assert_eq!(to_snake_case(""), "");
        assert_eq!(to_snake_case("A"), "a");
        assert_eq!(to_snake_case("Base64Binary"), "base64_binary");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }
}
