//! Core domain models for depmigrate
//!
//! This module contains the fundamental types used throughout the application:
//! - Package requests parsed from the command line
//! - package.json manifests and their update metadata
//! - Declared ranges that are rewritten in place
//! - The update plan crossing from planning into execution

mod manifest;
mod package_identifier;
mod update_plan;
mod version_spec;

pub use manifest::{
    MetadataDiagnostic, PackageManifest, ParsedMetadata, PeerDependencyMeta, UpdateMetadata,
    UPDATE_METADATA_KEY,
};
pub use package_identifier::{classify_spec, PackageIdentifier, SpecKind};
pub use update_plan::{PlanEntry, UpdatePlan};
pub use version_spec::{VersionSpec, VersionSpecKind};
