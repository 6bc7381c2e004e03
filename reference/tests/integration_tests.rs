use std::io::Write;
use std::path::Path;

use protogen_core::{
    Field, Message, ProtoFile, ProtoPackage, StabilizeError, StabilizeOptions,
    stabilize_package_checked,
};
use protogen_reference::{ReferenceError, ReferenceIndex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn versioned_file(version: &str, path: &str, messages: Vec<Message>) -> ProtoFile {
    let mut file = ProtoFile::new(path, &format!("google.fhir.{version}.core"));
    file.options.java_package = Some(format!("com.google.fhir.{version}.core"));
    file.messages = messages;
    file
}

fn write_descriptor(dir: &Path, name: &str, file: &ProtoFile) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    serde_json::to_writer_pretty(&mut f, file).unwrap();
    f.flush().unwrap();
}

fn baseline_patient() -> Message {
    Message::new("Patient")
        .with_field(Field::new("id", 1, "Id"))
        .with_field(Field::new("active", 2, "Boolean"))
        .with_field(Field::new("name", 3, "HumanName").repeated())
        .with_nested(
            Message::new("Contact")
                .with_field(Field::new("relationship", 1, "CodeableConcept"))
                .with_field(Field::new("name", 2, "HumanName")),
        )
}

// ---------------------------------------------------------------------------
// Directory index drives stabilization
// ---------------------------------------------------------------------------

#[test]
fn test_directory_index_stabilizes_candidate_package() {
    let dir = tempfile::tempdir().unwrap();
    write_descriptor(
        dir.path(),
        "patient.json",
        &versioned_file("r4", "resources/patient.proto", vec![baseline_patient()]),
    );

    let index = ReferenceIndex::from_dir(dir.path()).unwrap();
    assert_eq!(index.len(), 2);

    let candidate = Message::new("Patient")
        .with_field(Field::new("id", 1, "Id"))
        .with_field(Field::new("name", 2, "HumanName").repeated())
        .with_field(Field::new("active", 3, "Boolean"))
        .with_field(Field::new("gender", 4, "Code"))
        .with_nested(
            Message::new("Contact")
                .with_field(Field::new("name", 1, "HumanName"))
                .with_field(Field::new("relationship", 2, "CodeableConcept")),
        );
    let package = ProtoPackage::from_files(vec![versioned_file(
        "r5",
        "resources/patient.proto",
        vec![candidate],
    )]);

    let result = stabilize_package_checked(&package, &index, &StabilizeOptions::default()).unwrap();
    let patient = &result.package.files[0].messages[0];

    assert_eq!(patient.field("id").unwrap().tag, 1);
    assert_eq!(patient.field("active").unwrap().tag, 2);
    assert_eq!(patient.field("name").unwrap().tag, 3);
    assert_eq!(patient.field("gender").unwrap().tag, 4);

    let contact = &patient.nested[0];
    assert_eq!(contact.field("relationship").unwrap().tag, 1);
    assert_eq!(contact.field("name").unwrap().tag, 2);

    assert_eq!(result.stats.matched, 2);
    assert!(protogen_core::validate_package(&result.package).is_empty());
}

#[test]
fn test_empty_index_yields_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let index = ReferenceIndex::from_dir(dir.path()).unwrap();
    assert!(index.is_empty());

    let package = ProtoPackage::from_files(vec![versioned_file(
        "r5",
        "resources/patient.proto",
        vec![baseline_patient()],
    )]);
    let err = stabilize_package_checked(&package, &index, &StabilizeOptions::default()).unwrap_err();
    assert_eq!(err, StabilizeError::NoMatchingMessages { examined: 2 });
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn test_malformed_descriptor_is_json_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let err = ReferenceIndex::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, ReferenceError::JsonError(_)));
}

#[test]
fn test_missing_bundle_is_io_error() {
    let err = ReferenceIndex::from_bundle("/nonexistent/baseline/r4.json").unwrap_err();
    assert!(matches!(err, ReferenceError::IoError(_)));
}

#[test]
fn test_builder_from_path_detects_directories() {
    let dir = tempfile::tempdir().unwrap();
    write_descriptor(
        dir.path(),
        "patient.json",
        &versioned_file("r4", "resources/patient.proto", vec![baseline_patient()]),
    );

    let index = ReferenceIndex::builder()
        .from_path(dir.path())
        .build()
        .unwrap();
    assert!(index.contains("com.google.fhir.r4.core.Patient.Contact"));
}
