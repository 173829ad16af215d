//! Dependency graph of the workspace
//!
//! Every declared dependency is resolved to its installed `package.json`;
//! dependencies that cannot be resolved on disk are left out.

use super::resolve::{resolve_first, NodeModulesLookup, Resolution};
use super::{read_workspace_manifest, MANIFEST_FILE};
use crate::domain::PackageManifest;
use crate::error::ManifestError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A declared dependency and what is installed for it
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub name: String,
    /// Range declared in the workspace manifest
    pub declared_range: String,
    /// Directory the package is installed in
    pub install_path: PathBuf,
    /// `None` when the manifest was located but could not be read
    pub installed: Option<PackageManifest>,
}

impl DependencyNode {
    /// Installed version string, if known
    pub fn installed_version(&self) -> Option<&str> {
        self.installed
            .as_ref()
            .map(|m| m.version.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// name -> node for the workspace's declared dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub root: PathBuf,
    pub manifest: PackageManifest,
    pub nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    pub fn get(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// Installed manifest of a package, if readable
    pub fn installed(&self, name: &str) -> Option<&PackageManifest> {
        self.nodes.get(name).and_then(|node| node.installed.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DependencyNode)> {
        self.nodes.iter()
    }
}

/// Load the workspace manifest and every installed dependency manifest
pub fn load_dependency_graph(root: &Path) -> Result<DependencyGraph, ManifestError> {
    let (manifest, _) = read_workspace_manifest(root)?;
    let lookup = NodeModulesLookup::new(root);

    let mut nodes = BTreeMap::new();
    for (name, declared_range) in manifest.all_dependencies() {
        let request = format!("{name}/{MANIFEST_FILE}");
        let manifest_path = match resolve_first(&[&lookup], &request) {
            Resolution::Found(path) => path,
            Resolution::NotFound => {
                debug!("{name} is declared but not installed");
                continue;
            }
            Resolution::Error(reason) => {
                debug!("could not resolve {name}: {reason}");
                continue;
            }
        };

        let installed = read_installed(&manifest_path);
        let install_path = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        nodes.insert(
            name.clone(),
            DependencyNode {
                name,
                declared_range,
                install_path,
                installed,
            },
        );
    }

    Ok(DependencyGraph {
        root: root.to_path_buf(),
        manifest,
        nodes,
    })
}

fn read_installed(path: &Path) -> Option<PackageManifest> {
    let content = fs::read_to_string(path)
        .map_err(|e| debug!("failed to read {}: {e}", path.display()))
        .ok()?;
    PackageManifest::from_json(&content)
        .map_err(|e| debug!("failed to parse {}: {e}", path.display()))
        .ok()
}
