//! Resolution of an update batch
//!
//! Requested packages are fetched and resolved, then the batch is grown by
//! package-group and peer expansion until it stops changing.

use super::expand::{group_additions, peer_additions};
use super::resolver::{ResolvedTarget, VersionResolver};
use crate::domain::{PackageIdentifier, PackageManifest, PlanEntry, UpdatePlan};
use crate::error::{AppError, RequestError};
use crate::registry::{ManifestSnapshot, MetadataCache};
use crate::version::parse_version;
use crate::workspace::DependencyGraph;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// A package that resolved to a different version than installed
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub request: PackageIdentifier,
    pub installed: Version,
    pub target: ManifestSnapshot,
}

/// The resolved batch
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub entries: Vec<BatchEntry>,
    /// Packages that already are at their resolved version
    pub up_to_date: Vec<String>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// name -> target manifest, as consumed by the peer validator
    pub fn targets(&self) -> BTreeMap<String, PackageManifest> {
        self.entries
            .iter()
            .map(|e| (e.request.name.clone(), e.target.manifest.clone()))
            .collect()
    }

    /// Plan carried into execution
    pub fn plan(&self) -> UpdatePlan {
        let mut plan = UpdatePlan::new();
        for entry in &self.entries {
            let migrations = entry.target.manifest.update_metadata().metadata.migrations;
            plan.push(
                PlanEntry::new(
                    &entry.request.name,
                    entry.installed.clone(),
                    entry.target.version.clone(),
                )
                .with_migrations(migrations),
            );
        }
        plan
    }
}

/// Installed version of a declared dependency
pub fn installed_version(graph: &DependencyGraph, name: &str) -> Result<Version, RequestError> {
    let declared = graph.manifest.all_dependencies().contains_key(name);
    match graph.get(name) {
        Some(node) => node
            .installed_version()
            .and_then(parse_version)
            .ok_or_else(|| RequestError::NotInstalled {
                name: name.to_string(),
            }),
        None if declared => Err(RequestError::NotInstalled {
            name: name.to_string(),
        }),
        None => Err(RequestError::NotADependency {
            name: name.to_string(),
        }),
    }
}

/// Fetch, resolve and expand `requests`
pub async fn resolve_batch(
    requests: Vec<PackageIdentifier>,
    graph: &DependencyGraph,
    cache: &Arc<MetadataCache>,
    resolver: &VersionResolver,
) -> Result<Batch, AppError> {
    let mut seen: BTreeSet<String> = requests.iter().map(|r| r.name.clone()).collect();
    let mut pending = requests;
    let mut batch = Batch::default();

    while !pending.is_empty() {
        let fetched = cache
            .fetch_all(pending.iter().map(|r| r.name.clone()))
            .await;
        let mut added = Vec::new();

        for request in pending.drain(..) {
            let metadata = match fetched.get(&request.name) {
                Some(result) => result.clone()?,
                None => cache.fetch(&request.name).await?,
            };
            let installed = installed_version(graph, &request.name)?;

            let resolved = resolver.resolve_against(&request, &metadata, &installed)?;
            let snapshot = resolved.snapshot().clone();

            for addition in group_additions(&snapshot.manifest, graph, &seen)
                .into_iter()
                .chain(peer_additions(&snapshot.manifest, graph, &seen))
            {
                if seen.insert(addition.name.clone()) {
                    added.push(addition);
                }
            }

            match resolved {
                ResolvedTarget::UpToDate(_) => {
                    info!("Package '{}' is already up to date.", request.name);
                    batch.up_to_date.push(request.name.clone());
                }
                ResolvedTarget::Update(_) => batch.entries.push(BatchEntry {
                    request,
                    installed,
                    target: snapshot,
                }),
            }
        }

        pending = added;
    }

    Ok(batch)
}
