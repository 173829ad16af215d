//! Status report when no package is requested
//!
//! Lists installed packages that publish update metadata and have a newer
//! release, with the command that updates them.

use super::guard::MajorVersionGuard;
use crate::domain::classify_spec;
use crate::registry::{ManifestSnapshot, MetadataCache, PackageMetadata};
use crate::version::{cmp_precedence, parse_version};
use crate::workspace::DependencyGraph;
use colored::Colorize;
use semver::Version;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One updatable package (or package group)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub name: String,
    pub installed: String,
    pub available: String,
    pub command: String,
}

/// Packages that can be updated
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub lines: Vec<StatusLine>,
}

impl StatusReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the report as a table
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return "We analyzed your package.json and everything seems to be in order. Good work!"
                .to_string();
        }

        let name_width = self
            .lines
            .iter()
            .map(|l| l.name.len())
            .chain(std::iter::once(4))
            .max()
            .unwrap_or(4);
        let version_width = self
            .lines
            .iter()
            .map(|l| l.installed.len() + l.available.len() + 4)
            .chain(std::iter::once(7))
            .max()
            .unwrap_or(7);

        let mut out = String::from(
            "We analyzed your package.json, there are some packages to update:\n\n",
        );
        out.push_str(&format!(
            "  {}  {}  {}\n",
            format!("{:<name_width$}", "Name").bold(),
            format!("{:<version_width$}", "Version").bold(),
            "Command to update".bold()
        ));
        out.push_str(&format!(
            "  {}\n",
            "-".repeat(name_width + version_width + 24)
        ));
        for line in &self.lines {
            let version = format!("{} -> {}", line.installed, line.available);
            out.push_str(&format!(
                "  {:<name_width$}  {:<version_width$}  {}\n",
                line.name,
                version,
                line.command.cyan()
            ));
        }
        out.push_str(
            "\nThere might be additional packages which don't provide update metadata that are outdated.\n\
             You can update the additional packages by running the update command of your package manager.",
        );
        out
    }
}

/// Collect the status of every installed registry dependency
pub async fn collect_status(
    graph: &DependencyGraph,
    cache: &Arc<MetadataCache>,
    guard: &MajorVersionGuard,
    next: bool,
) -> StatusReport {
    let names: Vec<String> = graph
        .iter()
        .filter(|(_, node)| node.installed_version().is_some())
        .filter(|(_, node)| {
            matches!(classify_spec(&node.declared_range), Some((_, true)))
        })
        .map(|(name, _)| name.clone())
        .collect();

    let fetched = cache.fetch_all(names).await;

    let mut candidates = Vec::new();
    for (name, result) in &fetched {
        let Ok(metadata) = result else {
            tracing::debug!("skipping {name}: metadata unavailable");
            continue;
        };
        let Some(installed) = graph
            .get(name)
            .and_then(|n| n.installed_version())
            .and_then(parse_version)
        else {
            continue;
        };
        if let Some(candidate) = candidate(name, &installed, metadata, guard, next) {
            candidates.push(candidate);
        }
    }

    StatusReport {
        lines: collapse_groups(candidates),
    }
}

struct Candidate<'a> {
    name: String,
    installed: Version,
    target: &'a ManifestSnapshot,
    /// `None` when the version was capped below the tag
    tag: Option<&'static str>,
}

fn candidate<'a>(
    name: &str,
    installed: &Version,
    metadata: &'a PackageMetadata,
    guard: &MajorVersionGuard,
    next: bool,
) -> Option<Candidate<'a>> {
    let tag = if next && metadata.dist_tags.contains_key("next") {
        "next"
    } else {
        "latest"
    };
    let mut target = metadata.tagged(tag)?;
    let mut tag = Some(tag);

    if guard.is_first_party(name) && target.version.major > installed.major + 1 {
        if let Some(capped) = newest_of_major(metadata, installed.major + 1) {
            target = capped;
            tag = None;
        }
    }

    let has_metadata = target.manifest.update_block.is_some();
    let newer = cmp_precedence(installed, &target.version).is_lt();
    (has_metadata && newer).then(|| Candidate {
        name: name.to_string(),
        installed: installed.clone(),
        target,
        tag,
    })
}

/// Newest release of a major, stable releases first
fn newest_of_major(metadata: &PackageMetadata, major: u64) -> Option<&ManifestSnapshot> {
    let of_major = || metadata.versions.values().filter(move |s| s.version.major == major);
    of_major()
        .filter(|s| s.version.pre.is_empty())
        .max_by(|a, b| cmp_precedence(&a.version, &b.version))
        .or_else(|| of_major().max_by(|a, b| cmp_precedence(&a.version, &b.version)))
}

/// Replace group members by their group name, one line per group
fn collapse_groups(candidates: Vec<Candidate<'_>>) -> Vec<StatusLine> {
    let mut group_of: BTreeMap<String, String> = BTreeMap::new();
    let mut lines = Vec::new();

    for candidate in candidates {
        let parsed = candidate.target.manifest.update_metadata();
        let metadata = parsed.metadata;
        let mut name = candidate.name.clone();

        if !metadata.package_group.is_empty() {
            if let Some(group) = metadata.package_group_name.clone() {
                if group_of.contains_key(&candidate.name) {
                    continue;
                }
                for member in metadata.package_group.keys() {
                    group_of.insert(member.clone(), group.clone());
                }
                group_of.insert(group.clone(), group.clone());
                name = group;
            }
        }

        let command = match candidate.tag {
            None => format!("depmigrate {name}@{}", candidate.target.version.major),
            Some("next") => format!("depmigrate {name} --next"),
            Some(_) => format!("depmigrate {name}"),
        };

        lines.push(StatusLine {
            name,
            installed: candidate.installed.to_string(),
            available: candidate.target.version.to_string(),
            command,
        });
    }

    lines.sort_by(|a, b| a.name.cmp(&b.name));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PackageManifest;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> PackageManifest {
        PackageManifest::from_value(value).unwrap()
    }

    fn with_meta(version: &str) -> PackageManifest {
        manifest(json!({ "version": version, "ng-update": {} }))
    }

    #[test]
    fn test_candidate_requires_metadata_and_newer() {
        let guard = MajorVersionGuard::default();
        let plain = PackageMetadata::new("rxjs")
            .with_version(manifest(json!({ "version": "7.4.0" })))
            .with_tag("latest", "7.4.0");
        assert!(candidate("rxjs", &Version::new(6, 6, 7), &plain, &guard, false).is_none());

        let lib = PackageMetadata::new("lib")
            .with_version(with_meta("2.0.0"))
            .with_tag("latest", "2.0.0");
        assert!(candidate("lib", &Version::new(2, 0, 0), &lib, &guard, false).is_none());
        let found = candidate("lib", &Version::new(1, 0, 0), &lib, &guard, false).unwrap();
        assert_eq!(found.tag, Some("latest"));
    }

    #[test]
    fn test_candidate_caps_first_party_major() {
        let guard = MajorVersionGuard::default();
        let core = PackageMetadata::new("@angular/core")
            .with_version(with_meta("12.2.16"))
            .with_version(with_meta("13.3.0"))
            .with_version(with_meta("13.4.0-rc.0"))
            .with_version(with_meta("14.0.0"))
            .with_tag("latest", "14.0.0");
        let found =
            candidate("@angular/core", &Version::new(11, 2, 0), &core, &guard, false).unwrap();
        assert_eq!(found.target.version.to_string(), "12.2.16");

        let found =
            candidate("@angular/core", &Version::new(12, 2, 16), &core, &guard, false).unwrap();
        assert_eq!(found.target.version.to_string(), "13.3.0");
        assert_eq!(found.tag, None);
    }

    #[test]
    fn test_candidate_next_tag() {
        let guard = MajorVersionGuard::default();
        let lib = PackageMetadata::new("lib")
            .with_version(with_meta("1.0.0"))
            .with_version(with_meta("2.0.0-next.1"))
            .with_tag("latest", "1.0.0")
            .with_tag("next", "2.0.0-next.1");
        let found = candidate("lib", &Version::new(1, 0, 0), &lib, &guard, true).unwrap();
        assert_eq!(found.tag, Some("next"));
    }

    #[test]
    fn test_collapse_groups_and_commands() {
        let core_target = ManifestSnapshot {
            version: Version::new(13, 0, 1),
            manifest: manifest(json!({
                "name": "@angular/core",
                "version": "13.0.1",
                "ng-update": {
                    "packageGroup": ["@angular/core", "@angular/common"],
                    "packageGroupName": "@angular/core"
                }
            })),
        };
        let common_target = core_target.clone();
        let cli_target = ManifestSnapshot {
            version: Version::new(13, 0, 2),
            manifest: with_meta("13.0.2"),
        };

        let lines = collapse_groups(vec![
            Candidate {
                name: "@angular/common".to_string(),
                installed: Version::new(12, 2, 16),
                target: &common_target,
                tag: Some("latest"),
            },
            Candidate {
                name: "@angular/core".to_string(),
                installed: Version::new(12, 2, 16),
                target: &core_target,
                tag: Some("latest"),
            },
            Candidate {
                name: "@angular/cli".to_string(),
                installed: Version::new(11, 2, 0),
                target: &cli_target,
                tag: None,
            },
        ]);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "@angular/cli");
        assert_eq!(lines[0].command, "depmigrate @angular/cli@13");
        assert_eq!(lines[1].name, "@angular/core");
        assert_eq!(lines[1].command, "depmigrate @angular/core");
        assert_eq!(lines[1].installed, "12.2.16");
    }

    #[test]
    fn test_render_empty() {
        let report = StatusReport::default();
        assert!(report.render().contains("everything seems to be in order"));
    }
}
