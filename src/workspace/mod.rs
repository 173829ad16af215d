//! Workspace on disk
//!
//! This module provides:
//! - Reading the workspace manifest
//! - The installed dependency graph
//! - Ordered module resolution strategies
//! - In-place rewriting of dependency ranges

mod graph;
mod resolve;
mod writer;

pub use graph::{load_dependency_graph, DependencyGraph, DependencyNode};
pub use resolve::{
    check_in_package, resolve_first, NodeModulesLookup, PackageLocal, Resolution,
    ResolveStrategy,
};
pub use writer::{apply_plan, update_dependency};

use crate::domain::PackageManifest;
use crate::error::ManifestError;
use std::fs;
use std::path::Path;

/// Manifest file name of a workspace or package
pub const MANIFEST_FILE: &str = "package.json";

/// Read and parse `<root>/package.json`, returning the parsed manifest and its raw text
pub fn read_workspace_manifest(root: &Path) -> Result<(PackageManifest, String), ManifestError> {
    let path = root.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(ManifestError::not_found(&path));
    }
    let content = fs::read_to_string(&path).map_err(|e| ManifestError::read_error(&path, e))?;
    let manifest = PackageManifest::from_json(&content)
        .map_err(|e| ManifestError::json_parse_error(&path, e.to_string()))?;
    Ok((manifest, content))
}
