//! Source-side definitions consumed by the assembler.
//!
//! A [`SourcePackage`] is the loaded form of an input schema package: its
//! semantic version plus structure definitions in source order. Each
//! [`StructureDefinition`] may carry the message tree already translated by an
//! upstream generator.

use serde::{Deserialize, Serialize};

use crate::Message;

/// Canonical URL of the bundle resource definition.
pub const BUNDLE_STRUCTURE_DEFINITION_URL: &str = "http://hl7.org/fhir/StructureDefinition/Bundle";

/// What a structure definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureKind {
    /// A resource type (e.g. Patient).
    Resource,
    /// A complex datatype (e.g. HumanName).
    ComplexType,
    /// A primitive datatype (e.g. boolean).
    PrimitiveType,
    /// A logical model.
    Logical,
}

/// How a structure definition relates to its base definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Derivation {
    /// Defines a new type.
    Specialization,
    /// Profiles an existing type.
    Constraint,
}

/// A structure definition from the input package.
///
/// # Examples
///
/// ```
/// use protogen_core::*;
///
/// let patient = StructureDefinition::resource("Patient");
/// assert!(patient.is_concrete_resource());
/// assert!(!patient.is_bundle());
/// assert_eq!(patient.url, "http://hl7.org/fhir/StructureDefinition/Patient");
///
/// let bundle = StructureDefinition::resource("Bundle");
/// assert!(bundle.is_bundle());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDefinition {
    /// Canonical URL identifying the definition.
    pub url: String,
    /// Type name (e.g. "Patient", "MedicationRequest").
    pub name: String,
    /// Kind of structure.
    pub kind: StructureKind,
    /// Derivation rule.
    pub derivation: Derivation,
    /// Abstract definitions never produce their own file.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Message tree already translated from this definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl StructureDefinition {
    /// Creates a concrete resource specialization with the conventional URL.
    pub fn resource(name: &str) -> Self {
        Self::new(name, StructureKind::Resource)
    }

    /// Creates a concrete complex datatype specialization.
    pub fn complex_type(name: &str) -> Self {
        Self::new(name, StructureKind::ComplexType)
    }

    fn new(name: &str, kind: StructureKind) -> Self {
        Self {
            url: format!("http://hl7.org/fhir/StructureDefinition/{name}"),
            name: name.to_string(),
            kind,
            derivation: Derivation::Specialization,
            is_abstract: false,
            message: None,
        }
    }

    /// Attaches a pre-translated message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns `true` for non-abstract resource specializations, the
    /// definitions that get a file of their own (or the bundle slot).
    pub fn is_concrete_resource(&self) -> bool {
        self.kind == StructureKind::Resource
            && self.derivation == Derivation::Specialization
            && !self.is_abstract
    }

    /// Returns `true` for non-abstract datatype specializations.
    pub fn is_concrete_datatype(&self) -> bool {
        matches!(
            self.kind,
            StructureKind::ComplexType | StructureKind::PrimitiveType
        ) && self.derivation == Derivation::Specialization
            && !self.is_abstract
    }

    /// Returns `true` if this definition is the bundle resource.
    pub fn is_bundle(&self) -> bool {
        self.is_concrete_resource() && self.url == BUNDLE_STRUCTURE_DEFINITION_URL
    }

    /// Returns the generated type name: the definition name with
    /// non-alphanumeric characters removed and the first letter capitalized.
    ///
    /// # Examples
    ///
    /// ```
    /// use protogen_core::StructureDefinition;
    ///
    /// assert_eq!(StructureDefinition::resource("Patient").type_name(), "Patient");
    /// assert_eq!(StructureDefinition::complex_type("codeable-concept").type_name(), "Codeableconcept");
    /// ```
    pub fn type_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let mut chars = cleaned.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

/// Terminology messages that accompany a source package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminology {
    /// Messages for non-trivial value sets.
    #[serde(default)]
    pub value_sets: Vec<Message>,
    /// Messages for code systems backing trivial value sets.
    #[serde(default)]
    pub code_systems: Vec<Message>,
}

/// A loaded input package.
///
/// # Examples
///
/// ```
/// use protogen_core::*;
///
/// let mut package = SourcePackage::new("5.0.0");
/// package.structure_definitions.push(StructureDefinition::resource("Patient"));
/// package.structure_definitions.push(StructureDefinition::complex_type("HumanName"));
///
/// assert_eq!(package.concrete_resources().count(), 1);
/// assert_eq!(package.concrete_datatypes().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePackage {
    /// Semantic version of the package (e.g. "4.0.1").
    pub semantic_version: String,
    /// Structure definitions in source order.
    #[serde(default)]
    pub structure_definitions: Vec<StructureDefinition>,
    /// Pre-translated terminology messages.
    #[serde(default)]
    pub terminology: Terminology,
}

impl SourcePackage {
    /// Creates an empty package with the given semantic version.
    pub fn new(semantic_version: &str) -> Self {
        Self {
            semantic_version: semantic_version.to_string(),
            ..Self::default()
        }
    }

    /// Iterates concrete resource definitions in source order.
    pub fn concrete_resources(&self) -> impl Iterator<Item = &StructureDefinition> {
        self.structure_definitions
            .iter()
            .filter(|d| d.is_concrete_resource())
    }

    /// Iterates concrete datatype definitions in source order.
    pub fn concrete_datatypes(&self) -> impl Iterator<Item = &StructureDefinition> {
        self.structure_definitions
            .iter()
            .filter(|d| d.is_concrete_datatype())
    }
}
