//! Baseline reference index for cross-version tag stabilization.
//!
//! This crate loads the baseline version's message descriptors once, before
//! stabilization begins, and exposes them as a plain name → message lookup
//! ([`ReferenceIndex`], which implements
//! [`ReferenceLookup`](protogen_core::ReferenceLookup)).
//!
//! # Quick start
//!
//! ```no_run
//! use protogen_reference::ReferenceIndex;
//!
//! // Load baseline descriptors from a directory
//! let index = ReferenceIndex::from_dir("baseline/r4/").unwrap();
//! if let Some(patient) = index.get("com.google.fhir.r4.core.Patient") {
//!     println!("Patient has {} fields", patient.fields.len());
//! }
//!
//! // Merge several sources with the builder
//! let index = ReferenceIndex::builder()
//!     .from_dir("baseline/r4/")
//!     .from_bundle("baseline/r4.json")
//!     .build()
//!     .unwrap();
//! ```

mod error;
mod loader;

pub use error::{ReferenceError, Result};
pub use loader::{IndexBuilder, IndexSource, ReferenceIndex};
