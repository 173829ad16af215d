//! Version handling for npm-style packages
//!
//! This module provides:
//! - npm range parsing and satisfaction checks on top of `semver::Version`
//! - Coercion of loose migration versions (`13`, `13.1`) into full versions
//! - Precedence comparison that ignores build metadata

mod coerce;
mod range;

pub use coerce::coerce_version;
pub use range::{Comparator, Op, RangeParseError, VersionRange};

use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;

/// Compare two versions by semver precedence (build metadata is ignored)
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Parse a version as found in manifests and registries (`v` and `=` prefixes tolerated)
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

/// Leading integer of a version string, used for major comparisons
pub fn leading_major(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim()
        .trim_start_matches(['v', '='])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// The same version with its pre-release and build removed
pub fn base_version(version: &Version) -> Version {
    Version {
        major: version.major,
        minor: version.minor,
        patch: version.patch,
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
    }
}

/// Lowest pre-release of a base version (`1.2.3-0`)
pub fn prerelease_floor(version: &Version) -> Version {
    Version {
        pre: Prerelease::new("0").unwrap_or(Prerelease::EMPTY),
        ..base_version(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_prefixes() {
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("=1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version(" 1.2.3 "), Some(Version::new(1, 2, 3)));
        assert!(parse_version("1.2").is_none());
    }

    #[test]
    fn test_leading_major() {
        assert_eq!(leading_major("12.0.0"), Some(12));
        assert_eq!(leading_major("13.0.0-next.1"), Some(13));
        assert_eq!(leading_major("v9"), Some(9));
        assert_eq!(leading_major("latest"), None);
    }

    #[test]
    fn test_cmp_precedence_ignores_build() {
        let a = Version::parse("1.0.0+abc").unwrap();
        let b = Version::parse("1.0.0+def").unwrap();
        assert_eq!(cmp_precedence(&a, &b), Ordering::Equal);

        let rc = Version::parse("1.0.0-rc.1").unwrap();
        assert_eq!(cmp_precedence(&rc, &a), Ordering::Less);
    }

    #[test]
    fn test_prerelease_floor() {
        let v = Version::parse("12.1.0-rc.2").unwrap();
        assert_eq!(prerelease_floor(&v).to_string(), "12.1.0-0");
        assert_eq!(base_version(&v).to_string(), "12.1.0");
    }
}
