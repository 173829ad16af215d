//! Batch expansion
//!
//! A requested package can pull more packages into the batch:
//! - installed members of its package group, at the group's version
//! - installed peers whose version does not satisfy the target's peer range

use crate::domain::{PackageIdentifier, PackageManifest};
use crate::version::{parse_version, VersionRange};
use crate::workspace::DependencyGraph;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Installed package-group members of `target` not yet in the batch
pub fn group_additions(
    target: &PackageManifest,
    graph: &DependencyGraph,
    seen: &BTreeSet<String>,
) -> Vec<PackageIdentifier> {
    let parsed = target.update_metadata();
    parsed.log_diagnostics();

    parsed
        .metadata
        .package_group
        .iter()
        .filter(|(name, _)| !seen.contains(*name))
        .filter(|(name, _)| graph.get(name).is_some())
        .filter_map(|(name, spec)| {
            debug!("{} pulls in group member {name}@{spec}", target.name);
            request(name, spec)
        })
        .collect()
}

/// Installed peers of `target` whose version falls outside the peer range
pub fn peer_additions(
    target: &PackageManifest,
    graph: &DependencyGraph,
    seen: &BTreeSet<String>,
) -> Vec<PackageIdentifier> {
    target
        .peer_dependencies
        .iter()
        .filter(|(peer, _)| !seen.contains(*peer))
        .filter_map(|(peer, range)| {
            let installed = graph.get(peer)?.installed_version()?;
            let satisfied = match (parse_version(installed), VersionRange::parse(range)) {
                (Some(version), Ok(range)) => range.satisfies(&version, false),
                _ => false,
            };
            if satisfied {
                return None;
            }
            debug!(
                "{} requires peer {peer}@{range}, {installed} is installed",
                target.name
            );
            request(peer, range)
        })
        .collect()
}

fn request(name: &str, spec: &str) -> Option<PackageIdentifier> {
    match PackageIdentifier::parse(&format!("{name}@{spec}")) {
        Ok(id) if id.registry => Some(id),
        _ => {
            warn!("Ignoring '{name}@{spec}': not a registry version request.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::DependencyNode;
    use serde_json::json;

    fn graph(installed: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (name, version) in installed {
            graph.nodes.insert(
                name.to_string(),
                DependencyNode {
                    name: name.to_string(),
                    declared_range: version.to_string(),
                    install_path: Default::default(),
                    installed: Some(PackageManifest {
                        name: name.to_string(),
                        version: version.to_string(),
                        ..Default::default()
                    }),
                },
            );
        }
        graph
    }

    fn seen(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_additions_only_installed_unrequested() {
        let target = PackageManifest::from_value(json!({
            "name": "@angular/core",
            "version": "13.0.1",
            "ng-update": {
                "packageGroup": ["@angular/core", "@angular/common", "@angular/router"]
            }
        }))
        .unwrap();
        let g = graph(&[
            ("@angular/core", "12.2.16"),
            ("@angular/common", "12.2.16"),
        ]);

        let added = group_additions(&target, &g, &seen(&["@angular/core"]));
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "@angular/common");
        assert_eq!(added[0].fetch_spec, "13.0.1");
    }

    #[test]
    fn test_peer_additions_for_unsatisfied_peers() {
        let target = PackageManifest::from_value(json!({
            "name": "@angular/core",
            "version": "13.0.1",
            "peerDependencies": {
                "rxjs": "^6.5.3 || ^7.4.0",
                "zone.js": "~0.11.4",
                "absent": "^1.0.0"
            }
        }))
        .unwrap();
        let g = graph(&[("rxjs", "6.6.7"), ("zone.js", "0.10.3")]);

        let added = peer_additions(&target, &g, &seen(&["@angular/core"]));
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "zone.js");
        assert_eq!(added[0].fetch_spec, "~0.11.4");
    }

    #[test]
    fn test_additions_skip_seen() {
        let target = PackageManifest::from_value(json!({
            "name": "lib",
            "version": "2.0.0",
            "peerDependencies": { "rxjs": "^7.0.0" }
        }))
        .unwrap();
        let g = graph(&[("rxjs", "6.6.7")]);
        assert!(peer_additions(&target, &g, &seen(&["lib", "rxjs"])).is_empty());
    }
}
