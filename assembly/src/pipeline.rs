//! End-to-end generation run: load, assemble, stabilize, package.

use std::path::PathBuf;

use protogen_core::{
    ProtoPackage, ReferenceLookup, SourcePackage, StabilizeStats, stabilize_package_checked,
};
use protogen_reference::{IndexBuilder, ReferenceIndex};
use tracing::{debug, info};

use crate::archive::{ArchiveSummary, write_archive};
use crate::assemble::{AssemblySettings, assemble_package};
use crate::config::RunConfig;
use crate::error::{AssemblyError, Result};
use crate::generate::{
    DescriptorGenerator, JsonPackageLoader, PackageLoader, ResourceGenerator, TerminologyGenerator,
};
use crate::render::{ProtoTextRenderer, Renderer};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Path of the written archive.
    pub archive_path: PathBuf,
    /// Number of files in the archive.
    pub files: usize,
    /// Number of messages across all files.
    pub messages: usize,
    /// Stabilization counters, when legacy retagging ran.
    pub stabilized: Option<StabilizeStats>,
    /// Archive entries and digest.
    pub archive: ArchiveSummary,
}

/// Runs generation with the default loader, generators and renderer.
///
/// # Errors
///
/// Returns the first error of any stage. No archive is written unless every
/// stage succeeds.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let source = JsonPackageLoader.load(&config.input_package)?;
    let protogen = config.protogen_config();
    let generator = DescriptorGenerator::new(&source, &protogen);
    let renderer = ProtoTextRenderer::with_license_date(&protogen.license_date);

    let index = if config.legacy_retagging {
        Some(load_reference_index(config)?)
    } else {
        None
    };

    let package = build_package(
        config,
        &source,
        &generator,
        &generator,
        index.as_ref().map(|index| index as &dyn ReferenceLookup),
    )?;
    finish(config, package, &renderer)
}

/// Runs generation with injected collaborators.
///
/// `reference` is consulted only when `config.legacy_retagging` is set.
pub fn run_with(
    config: &RunConfig,
    loader: &dyn PackageLoader,
    terminology: &dyn TerminologyGenerator,
    resources: &dyn ResourceGenerator,
    reference: Option<&dyn ReferenceLookup>,
    renderer: &dyn Renderer,
) -> Result<RunSummary> {
    config.validate()?;
    let source = loader.load(&config.input_package)?;
    let package = build_package(config, &source, terminology, resources, reference)?;
    finish(config, package, renderer)
}

/// Loads and merges every configured reference source.
///
/// # Errors
///
/// Returns [`AssemblyError::Reference`] naming the first source that fails
/// to load.
pub fn load_reference_index(config: &RunConfig) -> Result<ReferenceIndex> {
    let builder = config
        .retagging
        .reference_sources
        .iter()
        .fold(IndexBuilder::new(), |builder, path| builder.from_path(path));
    let index = builder.build()?;
    debug!(messages = index.len(), "Loaded reference index");
    Ok(index)
}

fn build_package(
    config: &RunConfig,
    source: &SourcePackage,
    terminology: &dyn TerminologyGenerator,
    resources: &dyn ResourceGenerator,
    reference: Option<&dyn ReferenceLookup>,
) -> Result<(ProtoPackage, Option<StabilizeStats>)> {
    let settings = AssemblySettings {
        contained_resource_offset: config.contained_resource_offset,
        source_directory: config.protogen_config().source_directory,
        go_import_root: config.go_import_root.clone(),
    };
    let package = assemble_package(source, terminology, resources, &settings)?;

    match (config.legacy_retagging, reference) {
        (true, Some(reference)) => {
            let options = config.retagging.stabilize_options()?;
            let result = stabilize_package_checked(&package, reference, &options)?;
            Ok((result.package, Some(result.stats)))
        }
        (true, None) => Err(AssemblyError::Config(
            "legacy retagging requested, but no reference index available".into(),
        )),
        (false, _) => Ok((package, None)),
    }
}

fn finish(
    config: &RunConfig,
    (package, stabilized): (ProtoPackage, Option<StabilizeStats>),
    renderer: &dyn Renderer,
) -> Result<RunSummary> {
    let archive_path = config.archive_path();
    let archive = write_archive(&package, renderer, &archive_path)?;
    info!(
        path = %archive_path.display(),
        files = package.file_count(),
        retagged = stabilized.is_some(),
        "Generation complete"
    );
    Ok(RunSummary {
        archive_path,
        files: package.file_count(),
        messages: package.message_count(),
        stabilized,
        archive,
    })
}
