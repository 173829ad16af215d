//! Package request parsing
//!
//! Turns command-line tokens such as `@angular/core`, `rxjs@^7.4.0` or
//! `@angular/cli@next` into a typed [`PackageIdentifier`].

use crate::error::RequestError;
use crate::version::{parse_version, VersionRange};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:@[^/@\s]{1,100}/)?[^@\s]{1,100})(?:@(.{1,100}))?$").unwrap()
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._-]*$").unwrap());

/// Spec prefixes that never resolve through a registry
const NON_REGISTRY_PREFIXES: [&str; 14] = [
    "file:",
    "link:",
    "workspace:",
    "portal:",
    "npm:",
    "git:",
    "git+",
    "github:",
    "gitlab:",
    "bitbucket:",
    "http:",
    "https:",
    "./",
    "../",
];

/// How the requested spec selects a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    /// A single exact version (`13.0.1`)
    Version,
    /// A semver range (`^13.0.0`, `13`)
    Range,
    /// A dist-tag (`latest`, `next`)
    Tag,
}

/// A parsed package request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentifier {
    /// Package name, including scope
    pub name: String,
    /// The spec exactly as typed after `@`, if any
    pub raw_spec: Option<String>,
    /// What is looked up in the registry (the default tag when no spec was given)
    pub fetch_spec: String,
    /// Meaningless when `registry` is false
    pub kind: SpecKind,
    /// Whether the spec resolves through a package registry
    pub registry: bool,
}

impl PackageIdentifier {
    /// Parse a raw request token
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let trimmed = raw.trim();
        let caps = REQUEST_RE
            .captures(trimmed)
            .ok_or_else(|| RequestError::MalformedPackage {
                raw: raw.to_string(),
            })?;

        let name = caps[1].to_string();
        let raw_spec = caps.get(2).map(|m| m.as_str().to_string());

        let Some(spec) = raw_spec.clone() else {
            return Ok(Self {
                name,
                raw_spec: None,
                fetch_spec: "latest".to_string(),
                kind: SpecKind::Tag,
                registry: true,
            });
        };

        let (kind, registry) = classify_spec(&spec).ok_or_else(|| RequestError::MalformedPackage {
            raw: raw.to_string(),
        })?;

        Ok(Self {
            name,
            raw_spec,
            fetch_spec: spec,
            kind,
            registry,
        })
    }

    /// True when the user supplied an explicit spec after `@`
    pub fn has_explicit_spec(&self) -> bool {
        self.raw_spec.is_some()
    }

    /// Use the `next` dist-tag when no explicit spec was given
    pub fn prefer_next(mut self) -> Self {
        if self.raw_spec.is_none() {
            self.fetch_spec = "next".to_string();
        }
        self
    }

    /// The request as originally typed
    pub fn raw(&self) -> String {
        match &self.raw_spec {
            Some(spec) => format!("{}@{}", self.name, spec),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.fetch_spec)
    }
}

/// Classify a spec string: `(kind, resolves through registry)`.
///
/// Returns `None` for specs that are neither a version, a range, a tag nor a
/// recognizable non-registry locator.
pub fn classify_spec(spec: &str) -> Option<(SpecKind, bool)> {
    let spec = spec.trim();

    if NON_REGISTRY_PREFIXES.iter().any(|p| spec.starts_with(p))
        || spec.starts_with('/')
        || spec.starts_with("~/")
        || is_hosted_shorthand(spec)
    {
        return Some((SpecKind::Range, false));
    }

    if parse_version(spec).is_some() {
        return Some((SpecKind::Version, true));
    }
    if VersionRange::parse(spec).is_ok() {
        return Some((SpecKind::Range, true));
    }
    if TAG_RE.is_match(spec) {
        return Some((SpecKind::Tag, true));
    }
    None
}

/// `user/repo` style git host shorthand
fn is_hosted_shorthand(spec: &str) -> bool {
    match spec.split_once('/') {
        Some((owner, repo)) => {
            !owner.is_empty()
                && !repo.is_empty()
                && !owner.starts_with('@')
                && !spec.contains(' ')
                && owner
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let id = PackageIdentifier::parse("@angular/core").unwrap();
        assert_eq!(id.name, "@angular/core");
        assert_eq!(id.raw_spec, None);
        assert_eq!(id.fetch_spec, "latest");
        assert_eq!(id.kind, SpecKind::Tag);
        assert!(id.registry);
        assert!(!id.has_explicit_spec());
    }

    #[test]
    fn test_parse_exact_version() {
        let id = PackageIdentifier::parse("@angular/core@13.0.1").unwrap();
        assert_eq!(id.name, "@angular/core");
        assert_eq!(id.fetch_spec, "13.0.1");
        assert_eq!(id.kind, SpecKind::Version);
    }

    #[test]
    fn test_parse_range() {
        let id = PackageIdentifier::parse("rxjs@^7.4.0").unwrap();
        assert_eq!(id.kind, SpecKind::Range);
        let id = PackageIdentifier::parse("@angular/cli@13").unwrap();
        assert_eq!(id.kind, SpecKind::Range);
    }

    #[test]
    fn test_parse_tag() {
        let id = PackageIdentifier::parse("@angular/cli@next").unwrap();
        assert_eq!(id.kind, SpecKind::Tag);
        assert_eq!(id.fetch_spec, "next");
        assert!(id.has_explicit_spec());
    }

    #[test]
    fn test_parse_non_registry() {
        for raw in [
            "lib@file:../lib",
            "lib@git+https://github.com/acme/lib.git",
            "lib@github:acme/lib",
            "lib@acme/lib",
            "lib@https://example.com/lib.tgz",
            "lib@workspace:*",
        ] {
            let id = PackageIdentifier::parse(raw).unwrap();
            assert!(!id.registry, "{raw} should not resolve through a registry");
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(PackageIdentifier::parse("").is_err());
        assert!(PackageIdentifier::parse("@angular/").is_err());
        assert!(PackageIdentifier::parse("foo@@bar").is_err());
        assert!(PackageIdentifier::parse("foo bar").is_err());
    }

    #[test]
    fn test_prefer_next_only_without_spec() {
        let id = PackageIdentifier::parse("@angular/core").unwrap().prefer_next();
        assert_eq!(id.fetch_spec, "next");

        let id = PackageIdentifier::parse("@angular/core@13")
            .unwrap()
            .prefer_next();
        assert_eq!(id.fetch_spec, "13");
    }

    #[test]
    fn test_raw_round_trip() {
        let id = PackageIdentifier::parse("@angular/core@^13.0.0").unwrap();
        assert_eq!(id.raw(), "@angular/core@^13.0.0");
        assert_eq!(id.to_string(), "@angular/core@^13.0.0");
    }
}
