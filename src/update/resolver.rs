//! Target version selection
//!
//! Picks the concrete version a request resolves to:
//! - exact version: that version
//! - range: `latest` when it satisfies, else the highest non-deprecated match
//! - tag: direct dist-tag lookup, with `next` falling back to `latest` when
//!   the user did not type a spec

use crate::domain::{PackageIdentifier, SpecKind};
use crate::error::RegistryError;
use crate::registry::{ManifestSnapshot, PackageMetadata};
use crate::version::{cmp_precedence, parse_version, VersionRange};
use semver::Version;
use tracing::debug;

/// Why no manifest could be picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickError {
    /// The package has no published versions at all
    NoVersions,
    /// Nothing matches the spec
    TargetNotFound,
}

/// Result of resolving a request against registry metadata
#[derive(Debug, Clone, Copy)]
pub enum ResolvedTarget<'a> {
    /// A newer (or different) version should be installed
    Update(&'a ManifestSnapshot),
    /// The resolved version is what is already installed
    UpToDate(&'a ManifestSnapshot),
}

impl<'a> ResolvedTarget<'a> {
    pub fn snapshot(&self) -> &'a ManifestSnapshot {
        match self {
            ResolvedTarget::Update(s) | ResolvedTarget::UpToDate(s) => s,
        }
    }
}

/// Resolves requests to concrete versions
#[derive(Debug, Clone, Default)]
pub struct VersionResolver;

impl VersionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a request, applying the `next` -> `latest` fallback
    pub fn resolve<'a>(
        &self,
        request: &PackageIdentifier,
        metadata: &'a PackageMetadata,
    ) -> Result<&'a ManifestSnapshot, RegistryError> {
        match pick_manifest(metadata, &request.fetch_spec, request.kind) {
            Ok(snapshot) => Ok(snapshot),
            Err(PickError::TargetNotFound)
                if request.kind == SpecKind::Tag
                    && request.fetch_spec == "next"
                    && !request.has_explicit_spec() =>
            {
                debug!("{}: no 'next' tag, falling back to 'latest'", request.name);
                pick_manifest(metadata, "latest", SpecKind::Tag).map_err(|_| not_found(request))
            }
            Err(_) => Err(not_found(request)),
        }
    }

    /// Resolve and compare against the installed version
    pub fn resolve_against<'a>(
        &self,
        request: &PackageIdentifier,
        metadata: &'a PackageMetadata,
        installed: &Version,
    ) -> Result<ResolvedTarget<'a>, RegistryError> {
        let snapshot = self.resolve(request, metadata)?;
        if cmp_precedence(&snapshot.version, installed).is_eq() {
            Ok(ResolvedTarget::UpToDate(snapshot))
        } else {
            Ok(ResolvedTarget::Update(snapshot))
        }
    }
}

fn not_found(request: &PackageIdentifier) -> RegistryError {
    RegistryError::TargetNotFound {
        request: request.to_string(),
    }
}

/// Pick the manifest a spec selects
pub fn pick_manifest<'a>(
    metadata: &'a PackageMetadata,
    spec: &str,
    kind: SpecKind,
) -> Result<&'a ManifestSnapshot, PickError> {
    if metadata.versions.is_empty() {
        return Err(PickError::NoVersions);
    }

    match kind {
        SpecKind::Tag => metadata.tagged(spec).ok_or(PickError::TargetNotFound),
        SpecKind::Version => parse_version(spec)
            .and_then(|v| metadata.snapshot(&v))
            .ok_or(PickError::TargetNotFound),
        SpecKind::Range => {
            let range = VersionRange::parse(spec).map_err(|_| PickError::TargetNotFound)?;

            if let Some(latest) = metadata.tagged("latest") {
                if range.satisfies(&latest.version, false) {
                    return Ok(latest);
                }
            }

            let best = |deprecated: bool| {
                metadata
                    .versions
                    .values()
                    .filter(|s| s.manifest.is_deprecated() == deprecated)
                    .filter(|s| range.satisfies(&s.version, false))
                    .max_by(|a, b| cmp_precedence(&a.version, &b.version))
            };
            best(false)
                .or_else(|| best(true))
                .ok_or(PickError::TargetNotFound)
        }
    }
}
