use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use protogen_assembly::{
    AssemblyError, BUNDLE_FILE_PATH, DescriptorGenerator, JsonPackageLoader, ProtoTextRenderer,
    RunConfig, run, run_with,
};
use protogen_core::{
    Field, Message, ProtoFile, ReferenceLookup, SourcePackage, StabilizeError, StructureDefinition,
};
use protogen_reference::ReferenceError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn candidate_patient() -> Message {
    Message::new("Patient")
        .with_field(Field::new("id", 1, "Id"))
        .with_field(Field::new("name", 2, "HumanName").repeated())
        .with_field(Field::new("active", 3, "Boolean"))
        .with_field(Field::new("gender", 4, "Code"))
}

fn baseline_patient() -> Message {
    Message::new("Patient")
        .with_field(Field::new("id", 1, "Id"))
        .with_field(Field::new("active", 2, "Boolean"))
        .with_field(Field::new("name", 3, "HumanName").repeated())
}

fn source_package(version: &str) -> SourcePackage {
    let mut source = SourcePackage::new(version);
    source.structure_definitions = vec![
        StructureDefinition::resource("Patient").with_message(candidate_patient()),
        StructureDefinition::resource("Bundle")
            .with_message(Message::new("Bundle").with_field(Field::new("id", 1, "Id"))),
        StructureDefinition::complex_type("Reference")
            .with_message(Message::new("Reference").with_field(Field::new("type", 1, "Uri"))),
    ];
    source
        .terminology
        .code_systems
        .push(Message::new("AdministrativeGenderCode"));
    source
}

fn write_source(dir: &Path, source: &SourcePackage) {
    std::fs::create_dir_all(dir).unwrap();
    let file = std::fs::File::create(dir.join("package.json")).unwrap();
    serde_json::to_writer_pretty(file, source).unwrap();
}

fn write_baseline(dir: &Path, messages: Vec<Message>) {
    std::fs::create_dir_all(dir).unwrap();
    let mut file = ProtoFile::new("resources/patient.proto", "google.fhir.r4.core");
    file.options.java_package = Some("com.google.fhir.r4.core".into());
    file.messages = messages;
    let out = std::fs::File::create(dir.join("patient.json")).unwrap();
    serde_json::to_writer_pretty(out, &file).unwrap();
}

fn config(root: &Path) -> RunConfig {
    let mut config = RunConfig::new(
        root.join("out"),
        root.join("input"),
        "google.fhir.r5.core",
        "com.google.fhir.r5.core",
    );
    config.contained_resource_offset = 5000;
    config
}

fn read_entry(archive: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(archive).unwrap()).unwrap();
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

// ---------------------------------------------------------------------------
// End-to-end runs
// ---------------------------------------------------------------------------

#[test]
fn test_run_without_retagging_writes_archive() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("5.0.0"));
    let config = config(root.path());

    let summary = run(&config).unwrap();
    assert_eq!(summary.archive_path, root.path().join("out/output.zip"));
    assert!(summary.stabilized.is_none());
    assert_eq!(
        summary.archive.entries,
        vec![
            "valuesets.proto",
            "codes.proto",
            "resources/patient.proto",
            BUNDLE_FILE_PATH,
            "datatypes.proto",
        ]
    );

    let patient = read_entry(&summary.archive_path, "resources/patient.proto");
    assert!(patient.contains("Boolean active = 3;"));
    assert!(patient.contains("patient_go_proto"));

    let bundle = read_entry(&summary.archive_path, BUNDLE_FILE_PATH);
    assert!(bundle.contains("Patient patient = 5001;"));
    assert!(bundle.contains("Bundle bundle = 5002;"));

    let datatypes = read_entry(&summary.archive_path, "datatypes.proto");
    assert!(datatypes.contains("ReferenceId patient_id = 2;"));
}

#[test]
fn test_run_with_retagging_aligns_shared_fields() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("5.0.0"));
    write_baseline(&root.path().join("baseline"), vec![baseline_patient()]);

    let mut config = config(root.path());
    config.legacy_retagging = true;
    config.retagging.reference_sources = vec![root.path().join("baseline")];

    let summary = run(&config).unwrap();
    let stats = summary.stabilized.unwrap();
    assert_eq!(stats.matched, 1);
    assert!(stats.skipped >= 1);

    let patient = read_entry(&summary.archive_path, "resources/patient.proto");
    assert!(patient.contains("Id id = 1;"));
    assert!(patient.contains("Boolean active = 2;"));
    assert!(patient.contains("repeated HumanName name = 3;"));
    assert!(patient.contains("Code gender = 4;"));

    let bundle = read_entry(&summary.archive_path, BUNDLE_FILE_PATH);
    assert!(bundle.contains("Patient patient = 5001;"));
}

#[test]
fn test_retagging_without_matches_writes_no_archive() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("5.0.0"));
    write_baseline(&root.path().join("baseline"), vec![Message::new("Unrelated")]);

    let mut config = config(root.path());
    config.legacy_retagging = true;
    config.retagging.reference_sources = vec![root.path().join("baseline")];

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Stabilize(StabilizeError::NoMatchingMessages { .. })
    ));
    assert!(!config.archive_path().exists());
}

#[test]
fn test_malformed_reference_source_aborts_with_path() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("5.0.0"));
    write_baseline(&root.path().join("baseline"), vec![baseline_patient()]);
    let broken = root.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();

    let mut config = config(root.path());
    config.legacy_retagging = true;
    config.retagging.reference_sources = vec![broken.clone(), root.path().join("baseline")];

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Reference(ReferenceError::Source { ref path, .. }) if *path == broken
    ));
    assert!(err.to_string().contains("broken.json"));
    assert!(!config.archive_path().exists());
}

#[test]
fn test_license_header_comes_from_run_config() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("5.0.0"));
    let mut config = config(root.path());
    config.license_date = "2024".into();

    let summary = run(&config).unwrap();
    let codes = read_entry(&summary.archive_path, "codes.proto");
    assert!(codes.starts_with("// Copyright 2024 Google LLC\n"));
}

#[test]
fn test_retagging_without_sources_is_config_error() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config(root.path());
    config.legacy_retagging = true;

    let err = run(&config).unwrap_err();
    assert!(matches!(err, AssemblyError::Config(_)));
}

#[test]
fn test_multiple_bundles_abort_before_packaging() {
    let root = tempfile::tempdir().unwrap();
    let mut source = source_package("5.0.0");
    let mut second = StructureDefinition::resource("Bundle");
    second.name = "OtherBundle".into();
    source.structure_definitions.push(second);
    write_source(&root.path().join("input"), &source);
    let config = config(root.path());

    let err = run(&config).unwrap_err();
    assert!(matches!(err, AssemblyError::MultipleBundles { .. }));
    assert!(!config.archive_path().exists());
}

#[test]
fn test_repeated_runs_produce_identical_archives() {
    let root = tempfile::tempdir().unwrap();
    write_source(&root.path().join("input"), &source_package("4.0.1"));
    let first_config = config(root.path());
    let mut second_config = config(root.path());
    second_config.archive_name = "second.zip".into();

    let first = run(&first_config).unwrap();
    let second = run(&second_config).unwrap();

    assert_eq!(first.archive.sha256, second.archive.sha256);
    assert_eq!(
        std::fs::read(&first.archive_path).unwrap(),
        std::fs::read(&second.archive_path).unwrap()
    );

    let datatypes = read_entry(&first.archive_path, "datatypes.proto");
    assert!(datatypes.contains("ReferenceId domain_resource_id"));
    assert!(datatypes.contains("ReferenceId metadata_resource_id"));
}

#[test]
fn test_run_with_injected_reference_map() {
    let root = tempfile::tempdir().unwrap();
    let source = source_package("5.0.0");
    write_source(&root.path().join("input"), &source);

    let mut config = config(root.path());
    config.legacy_retagging = true;
    config.retagging.reference_sources = vec![root.path().join("unused")];
    let protogen = config.protogen_config();
    let generator = DescriptorGenerator::new(&source, &protogen);

    let mut reference: HashMap<String, Message> = HashMap::new();
    reference.insert("com.google.fhir.r4.core.Patient".into(), baseline_patient());

    let summary = run_with(
        &config,
        &JsonPackageLoader,
        &generator,
        &generator,
        Some(&reference as &dyn ReferenceLookup),
        &ProtoTextRenderer::new(),
    )
    .unwrap();
    assert_eq!(summary.stabilized.map(|s| s.matched), Some(1));
}
