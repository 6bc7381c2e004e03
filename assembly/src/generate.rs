//! Collaborator interfaces for loading input packages and generating files,
//! plus descriptor-backed default implementations.
//!
//! Translating a structure definition into a message is not done here. The
//! defaults read input packages whose definitions already carry translated
//! message trees ([`JsonPackageLoader`]) and wrap those trees into files
//! ([`DescriptorGenerator`]). The two messages whose shape depends on the
//! resource-name list are derived: `ContainedResource` in the bundle file and
//! the typed reference fields of the `Reference` datatype.

use std::path::Path;

use protogen_core::{Field, Message, ProtoFile, SourcePackage, StructureDefinition};
use tracing::debug;

use crate::assemble::{
    BUNDLE_FILE_PATH, CODES_FILE_PATH, DATATYPES_FILE_PATH, VALUESETS_FILE_PATH,
    resource_file_path, to_snake_case,
};
use crate::config::ProtogenConfig;
use crate::error::{AssemblyError, Result};

/// Name of the aggregate message holding one field per resource type.
pub const CONTAINED_RESOURCE_MESSAGE: &str = "ContainedResource";

/// Name of the datatype that receives typed reference fields.
pub const REFERENCE_MESSAGE: &str = "Reference";

/// Type name of the typed reference id fields.
pub const REFERENCE_ID_TYPE: &str = "ReferenceId";

/// Loads an input package from a location.
pub trait PackageLoader {
    /// Returns the package found at `location`.
    fn load(&self, location: &Path) -> Result<SourcePackage>;
}

/// Produces the terminology files of a package.
pub trait TerminologyGenerator {
    /// Returns the file holding non-trivial value sets.
    fn value_set_file(&self) -> Result<ProtoFile>;

    /// Returns the file holding code systems.
    fn code_system_file(&self) -> Result<ProtoFile>;
}

/// Produces resource, bundle and datatype files.
///
/// The assembler assigns archive paths; the `path` of returned files is
/// overwritten.
pub trait ResourceGenerator {
    /// Returns the file for one concrete resource.
    fn resource_file(
        &self,
        definition: &StructureDefinition,
        semantic_version: &str,
    ) -> Result<ProtoFile>;

    /// Returns the file holding the bundle and the contained-resource
    /// aggregate over `resource_names`.
    fn bundle_file(
        &self,
        bundle: &StructureDefinition,
        resource_names: &[String],
        semantic_version: &str,
        contained_resource_offset: u32,
    ) -> Result<ProtoFile>;

    /// Returns the datatypes file; `resource_names` feed the typed reference
    /// datatype.
    fn datatypes_file(&self, resource_names: &[String]) -> Result<ProtoFile>;
}

/// Reads a [`SourcePackage`] from JSON.
///
/// A directory location is read as `<dir>/package.json`; any other path is
/// read as the JSON document itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPackageLoader;

/// File name looked up when the input location is a directory.
pub const PACKAGE_MANIFEST_NAME: &str = "package.json";

impl PackageLoader for JsonPackageLoader {
    fn load(&self, location: &Path) -> Result<SourcePackage> {
        let path = if location.is_dir() {
            location.join(PACKAGE_MANIFEST_NAME)
        } else {
            location.to_path_buf()
        };
        let file = std::fs::File::open(&path)?;
        let reader = std::io::BufReader::new(file);
        let package: SourcePackage = serde_json::from_reader(reader)?;
        debug!(
            path = %path.display(),
            version = %package.semantic_version,
            definitions = package.structure_definitions.len(),
            "Loaded input package"
        );
        Ok(package)
    }
}

/// Generators backed by the translated messages carried in a
/// [`SourcePackage`].
///
/// # Examples
///
/// ```
/// use protogen_assembly::{DescriptorGenerator, ProtogenConfig, ResourceGenerator};
/// use protogen_core::*;
///
/// let mut source = SourcePackage::new("5.0.0");
/// source.structure_definitions.push(
///     StructureDefinition::complex_type("Reference")
///         .with_message(Message::new("Reference").with_field(Field::new("type", 1, "Uri"))),
/// );
/// let config = ProtogenConfig::new("google.fhir.r5.core", "com.google.fhir.r5.core");
/// let generator = DescriptorGenerator::new(&source, &config);
///
/// let file = generator.datatypes_file(&["Patient".to_string()]).unwrap();
/// let reference = &file.messages[0];
/// assert_eq!(reference.field("patient_id").map(|f| f.tag), Some(2));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DescriptorGenerator<'a> {
    source: &'a SourcePackage,
    config: &'a ProtogenConfig,
}

impl<'a> DescriptorGenerator<'a> {
    /// Creates a generator over `source` emitting files configured by
    /// `config`.
    pub fn new(source: &'a SourcePackage, config: &'a ProtogenConfig) -> Self {
        Self { source, config }
    }

    fn empty_file(&self, path: &str, imports: &[&str]) -> ProtoFile {
        let mut file = ProtoFile::new(path, &self.config.proto_package);
        file.options.java_package = Some(self.config.java_proto_package.clone());
        file.options.java_multiple_files = true;
        file.imports = imports
            .iter()
            .map(|import| self.config.source_path(import))
            .collect();
        file
    }

    fn translated_message(definition: &StructureDefinition) -> Result<Message> {
        definition.message.clone().ok_or_else(|| {
            AssemblyError::Generation(format!(
                "structure definition {} has no translated message",
                definition.url
            ))
        })
    }
}

impl TerminologyGenerator for DescriptorGenerator<'_> {
    fn value_set_file(&self) -> Result<ProtoFile> {
        let mut file = self.empty_file(VALUESETS_FILE_PATH, &[CODES_FILE_PATH]);
        file.messages = self.source.terminology.value_sets.clone();
        Ok(file)
    }

    fn code_system_file(&self) -> Result<ProtoFile> {
        let mut file = self.empty_file(CODES_FILE_PATH, &[]);
        file.messages = self.source.terminology.code_systems.clone();
        Ok(file)
    }
}

impl ResourceGenerator for DescriptorGenerator<'_> {
    fn resource_file(
        &self,
        definition: &StructureDefinition,
        semantic_version: &str,
    ) -> Result<ProtoFile> {
        debug!(
            resource = %definition.name,
            version = semantic_version,
            "Generating resource file"
        );
        let path = resource_file_path(&definition.type_name());
        let mut file = self.empty_file(
            &path,
            &[CODES_FILE_PATH, DATATYPES_FILE_PATH, VALUESETS_FILE_PATH],
        );
        file.messages.push(Self::translated_message(definition)?);
        Ok(file)
    }

    fn bundle_file(
        &self,
        bundle: &StructureDefinition,
        resource_names: &[String],
        semantic_version: &str,
        contained_resource_offset: u32,
    ) -> Result<ProtoFile> {
        debug!(
            resources = resource_names.len(),
            version = semantic_version,
            offset = contained_resource_offset,
            "Generating bundle and contained resource file"
        );
        let bundle_name = bundle.type_name();
        let resource_paths: Vec<String> = resource_names
            .iter()
            .filter(|name| **name != bundle_name)
            .map(|name| resource_file_path(name))
            .collect();
        let mut imports: Vec<&str> = vec![CODES_FILE_PATH, DATATYPES_FILE_PATH];
        imports.extend(resource_paths.iter().map(String::as_str));

        let mut file = self.empty_file(BUNDLE_FILE_PATH, &imports);
        file.messages.push(Self::translated_message(bundle)?);
        file.messages.push(contained_resource(
            resource_names,
            contained_resource_offset,
        )?);
        Ok(file)
    }

    fn datatypes_file(&self, resource_names: &[String]) -> Result<ProtoFile> {
        let mut file = self.empty_file(DATATYPES_FILE_PATH, &[CODES_FILE_PATH, VALUESETS_FILE_PATH]);
        for definition in self.source.concrete_datatypes() {
            let mut message = Self::translated_message(definition)?;
            if message.name == REFERENCE_MESSAGE {
                add_typed_reference_fields(&mut message, resource_names);
            }
            file.messages.push(message);
        }
        Ok(file)
    }
}

fn contained_resource(resource_names: &[String], offset: u32) -> Result<Message> {
    let mut message = Message::new(CONTAINED_RESOURCE_MESSAGE);
    for (index, name) in resource_names.iter().enumerate() {
        let tag = u32::try_from(index)
            .ok()
            .and_then(|i| offset.checked_add(i + 1))
            .ok_or_else(|| {
                AssemblyError::Generation(format!(
                    "contained resource tag overflow at {name} (offset {offset})"
                ))
            })?;
        message.fields.push(Field::new(&to_snake_case(name), tag, name));
    }
    Ok(message)
}

fn add_typed_reference_fields(reference: &mut Message, resource_names: &[String]) {
    let mut next = reference.highest_reserved_tag().map_or(1, |tag| tag + 1);
    for name in resource_names {
        let field_name = format!("{}_id", to_snake_case(name));
        if reference.field(&field_name).is_some() {
            continue;
        }
        reference
            .fields
            .push(Field::new(&field_name, next, REFERENCE_ID_TYPE));
        next += 1;
    }
}
