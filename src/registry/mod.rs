//! Registry adapters for fetching package metadata
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - npm Registry adapter
//! - A per-run metadata cache with bounded concurrent fetching

mod cache;
mod client;
mod npm;

pub use cache::{MetadataCache, DEFAULT_CONCURRENCY};
pub use client::HttpClient;
pub use npm::{NpmAdapter, DEFAULT_REGISTRY_URL};

use crate::domain::PackageManifest;
use crate::error::RegistryError;
use crate::version::{cmp_precedence, parse_version};
use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use std::collections::BTreeMap;

/// Trait for registry adapters
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Get the registry name
    fn registry_name(&self) -> &str;

    /// Fetch every published version and the dist-tags of a package
    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, RegistryError>;
}

/// One published version's manifest
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    pub version: Version,
    pub manifest: PackageManifest,
}

/// All versions and dist-tags of a package
#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub name: String,
    /// Keyed by the version string exactly as published
    pub versions: BTreeMap<String, ManifestSnapshot>,
    pub dist_tags: BTreeMap<String, String>,
}

impl PackageMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build from a registry packument. Versions that are not valid semver,
    /// or whose manifest cannot be read, are skipped.
    pub fn from_packument(name: &str, packument: Value) -> Self {
        let mut metadata = Self::new(name);

        if let Some(tags) = packument.get("dist-tags").and_then(Value::as_object) {
            for (tag, version) in tags {
                if let Some(version) = version.as_str() {
                    metadata.dist_tags.insert(tag.clone(), version.to_string());
                }
            }
        }

        if let Some(Value::Object(versions)) = packument.get("versions").cloned() {
            for (raw, manifest) in versions {
                let Some(version) = parse_version(&raw) else {
                    tracing::debug!("{name}: skipping non-semver version {raw}");
                    continue;
                };
                match PackageManifest::from_value(manifest) {
                    Ok(manifest) => {
                        metadata
                            .versions
                            .insert(raw, ManifestSnapshot { version, manifest });
                    }
                    Err(e) => tracing::debug!("{name}@{raw}: unreadable manifest: {e}"),
                }
            }
        }

        metadata
    }

    /// Add a version (manifest name and version are filled in)
    pub fn with_version(mut self, mut manifest: PackageManifest) -> Self {
        if manifest.name.is_empty() {
            manifest.name = self.name.clone();
        }
        if let Some(version) = parse_version(&manifest.version) {
            self.versions
                .insert(manifest.version.clone(), ManifestSnapshot { version, manifest });
        }
        self
    }

    /// Point a dist-tag at a version
    pub fn with_tag(mut self, tag: impl Into<String>, version: impl Into<String>) -> Self {
        self.dist_tags.insert(tag.into(), version.into());
        self
    }

    /// Snapshot for a concrete version
    pub fn snapshot(&self, version: &Version) -> Option<&ManifestSnapshot> {
        self.versions
            .get(&version.to_string())
            .or_else(|| {
                self.versions
                    .values()
                    .find(|s| cmp_precedence(&s.version, version).is_eq())
            })
    }

    /// Snapshot the dist-tag points at
    pub fn tagged(&self, tag: &str) -> Option<&ManifestSnapshot> {
        let raw = self.dist_tags.get(tag)?;
        self.versions
            .get(raw)
            .or_else(|| parse_version(raw).and_then(|v| self.snapshot(&v)))
    }

    /// All snapshots, lowest version first
    pub fn sorted(&self) -> Vec<&ManifestSnapshot> {
        let mut all: Vec<_> = self.versions.values().collect();
        all.sort_by(|a, b| cmp_precedence(&a.version, &b.version));
        all
    }
}
