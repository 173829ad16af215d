//! Peer dependency validation of an update batch
//!
//! Two passes over the workspace:
//! - forward: the peers each target version declares must accept the
//!   versions that will be installed next to it
//! - reverse: every other installed package declaring a peer on an updated
//!   package must accept its new version (after range extension rules)

use super::compat::RangeRules;
use crate::domain::PackageManifest;
use crate::error::PolicyError;
use crate::version::{parse_version, VersionRange};
use crate::workspace::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, error, warn};

/// Packages known to declare wrong peer ranges
pub const DEFAULT_PEER_IGNORE: [&str; 5] = [
    "codelyzer",
    "@schematics/update",
    "@angular-devkit/build-ng-packagr",
    "tsickle",
    "@nguniversal/builders",
];

/// Which pass found a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerDirection {
    Forward,
    Reverse,
}

/// `dependent` requires `dependency` in `range`, but `version` would be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConflict {
    pub dependent: String,
    pub dependency: String,
    pub range: String,
    /// Range after extension rules, when they changed it
    pub extended: Option<String>,
    pub version: String,
    pub direction: PeerDirection,
}

impl fmt::Display for PeerConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Package \"{}\" has an incompatible peer dependency to \"{}\" (requires \"{}\"{}, would install \"{}\")",
            self.dependent,
            self.dependency,
            self.range,
            if self.extended.is_some() { " (extended)" } else { "" },
            self.version
        )
    }
}

/// A non-optional peer that is not installed at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPeer {
    pub dependent: String,
    pub peer: String,
    pub range: String,
}

/// Outcome of validating a batch
#[derive(Debug, Clone, Default)]
pub struct PeerReport {
    pub conflicts: Vec<PeerConflict>,
    pub missing: Vec<MissingPeer>,
}

impl PeerReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Log the findings; conflicts block the batch unless `force` is set
    pub fn enforce(&self, force: bool) -> Result<(), PolicyError> {
        for missing in &self.missing {
            warn!(
                "Package \"{}\" has a missing peer dependency of \"{}\" @ \"{}\".",
                missing.dependent, missing.peer, missing.range
            );
        }

        if self.conflicts.is_empty() {
            return Ok(());
        }
        for conflict in &self.conflicts {
            if force {
                warn!("{conflict}.");
            } else {
                error!("{conflict}.");
            }
        }
        if force {
            warn!("Continuing despite incompatible peer dependencies because '--force' was given.");
            Ok(())
        } else {
            Err(PolicyError::PeerConflicts {
                count: self.conflicts.len(),
            })
        }
    }
}

/// Checks peer ranges in both directions
#[derive(Debug, Clone)]
pub struct PeerDependencyValidator {
    rules: RangeRules,
    ignore: BTreeSet<String>,
    include_prerelease: bool,
}

impl PeerDependencyValidator {
    pub fn new(rules: RangeRules, ignore: impl IntoIterator<Item = String>) -> Self {
        Self {
            rules,
            ignore: ignore.into_iter().collect(),
            include_prerelease: false,
        }
    }

    /// Let pre-release versions satisfy ranges (`--next`)
    pub fn include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// Validate `targets` (name -> target manifest) against the installed graph
    pub fn validate(
        &self,
        graph: &DependencyGraph,
        targets: &BTreeMap<String, PackageManifest>,
    ) -> PeerReport {
        let mut report = PeerReport::default();
        for (name, target) in targets {
            self.check_forward(name, target, graph, targets, &mut report);
        }
        for (name, target) in targets {
            self.check_reverse(name, &target.version, graph, targets, &mut report);
        }
        report
    }

    fn check_forward(
        &self,
        name: &str,
        target: &PackageManifest,
        graph: &DependencyGraph,
        targets: &BTreeMap<String, PackageManifest>,
        report: &mut PeerReport,
    ) {
        for (peer, range) in &target.peer_dependencies {
            debug!("Checking forward peer {peer} of {name}...");
            let peer_version = targets
                .get(peer)
                .map(|m| m.version.as_str())
                .or_else(|| graph.get(peer).and_then(|node| node.installed_version()));

            let Some(peer_version) = peer_version else {
                if !target.is_optional_peer(peer) {
                    report.missing.push(MissingPeer {
                        dependent: name.to_string(),
                        peer: peer.clone(),
                        range: range.clone(),
                    });
                }
                continue;
            };

            if !self.satisfies(peer_version, range) {
                report.conflicts.push(PeerConflict {
                    dependent: name.to_string(),
                    dependency: peer.clone(),
                    range: range.clone(),
                    extended: None,
                    version: peer_version.to_string(),
                    direction: PeerDirection::Forward,
                });
            }
        }
    }

    fn check_reverse(
        &self,
        name: &str,
        version: &str,
        graph: &DependencyGraph,
        targets: &BTreeMap<String, PackageManifest>,
        report: &mut PeerReport,
    ) {
        for (dependent, node) in graph.iter() {
            if dependent == name || self.ignore.contains(dependent) {
                continue;
            }
            let Some(manifest) = targets.get(dependent).or(node.installed.as_ref()) else {
                continue;
            };
            let Some(range) = manifest.peer_dependencies.get(name) else {
                continue;
            };
            let already_reported = report
                .conflicts
                .iter()
                .any(|c| c.dependent == *dependent && c.dependency == name);
            if already_reported {
                continue;
            }

            let group = self.group_name(name, graph, targets);
            let extended = self.rules.extend(&group, range);
            debug!("Checking reverse peer {dependent} -> {name} ({extended})");

            if !self.satisfies(version, &extended) {
                report.conflicts.push(PeerConflict {
                    dependent: dependent.clone(),
                    dependency: name.to_string(),
                    range: range.clone(),
                    extended: (extended != *range).then_some(extended),
                    version: version.to_string(),
                    direction: PeerDirection::Reverse,
                });
            }
        }
    }

    /// Package-group name of a peer (target metadata first, then installed)
    fn group_name(
        &self,
        name: &str,
        graph: &DependencyGraph,
        targets: &BTreeMap<String, PackageManifest>,
    ) -> String {
        targets
            .get(name)
            .or_else(|| graph.installed(name))
            .and_then(|m| m.update_metadata().metadata.package_group_name)
            .unwrap_or_else(|| name.to_string())
    }

    fn satisfies(&self, version: &str, range: &str) -> bool {
        match (parse_version(version), VersionRange::parse(range)) {
            (Some(version), Ok(range)) => range.satisfies(&version, self.include_prerelease),
            _ => false,
        }
    }
}

impl Default for PeerDependencyValidator {
    fn default() -> Self {
        Self::new(
            RangeRules::with_compat_guarantee(["@angular/core"]),
            DEFAULT_PEER_IGNORE.iter().map(|s| s.to_string()),
        )
    }
}
