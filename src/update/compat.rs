//! Peer range extension rules
//!
//! Some package groups guarantee that code built against major `N` keeps
//! working with major `N + 1`. Peer ranges naming such a group are widened
//! before the reverse peer check.

use crate::version::VersionRange;
use semver::Version;
use std::collections::BTreeMap;

/// Highest major probed before a range is considered unbounded
const MAX_PROBED_MAJOR: u64 = 99;

/// Number of pre-release steps of the next major accepted
const PRERELEASE_STEPS: u64 = 20;

/// Widens a peer range
pub type RangeExtension = fn(&str) -> String;

/// Widen `range` to also accept the first major above it, pre-releases included.
///
/// Ranges that cannot be parsed, or that are still open at major 99, are
/// returned unchanged.
pub fn major_compat_guarantee(range: &str) -> String {
    let Ok(parsed) = VersionRange::parse(range) else {
        return range.to_string();
    };

    let mut major = 1;
    while !parsed.is_below(&Version::new(major, 0, 0)) {
        major += 1;
        if major >= MAX_PROBED_MAJOR {
            return range.to_string();
        }
    }

    let mut extended = range.trim().to_string();
    for step in 0..PRERELEASE_STEPS {
        extended.push_str(&format!(
            " || ^{major}.0.0-alpha.{step} || ^{major}.{step}.0-alpha.0"
        ));
    }
    extended
}

/// Extension rules keyed by package-group name
#[derive(Debug, Clone, Default)]
pub struct RangeRules {
    rules: BTreeMap<String, RangeExtension>,
}

impl RangeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the major compatibility guarantee to every named group
    pub fn with_compat_guarantee<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules = Self::new();
        for group in groups {
            rules.insert(group, major_compat_guarantee);
        }
        rules
    }

    pub fn insert(&mut self, group: impl Into<String>, rule: RangeExtension) {
        self.rules.insert(group.into(), rule);
    }

    /// Extend `range` if a rule exists for `group`
    pub fn extend(&self, group: &str, range: &str) -> String {
        match self.rules.get(group) {
            Some(rule) => rule(range),
            None => range.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfies(range: &str, version: &str, pre: bool) -> bool {
        VersionRange::parse(range)
            .unwrap()
            .satisfies(&Version::parse(version).unwrap(), pre)
    }

    #[test]
    fn test_extends_to_next_major() {
        let extended = major_compat_guarantee("^12.0.0");
        assert!(extended.starts_with("^12.0.0 || ^13.0.0-alpha.0"));
        assert!(satisfies(&extended, "13.0.0", false));
        assert!(satisfies(&extended, "13.3.0", false));
        assert!(satisfies(&extended, "13.0.0-next.4", false));
        assert!(!satisfies(&extended, "14.0.0", false));
    }

    #[test]
    fn test_extension_keeps_original_versions() {
        let original = "^11.0.0 || ^12.0.0";
        let extended = major_compat_guarantee(original);
        for version in ["11.0.0", "11.2.14", "12.0.0", "12.2.16"] {
            assert!(satisfies(original, version, false));
            assert!(satisfies(&extended, version, false), "{version}");
        }
        assert!(satisfies(&extended, "13.0.0", false));
    }

    #[test]
    fn test_unbounded_range_unchanged() {
        assert_eq!(major_compat_guarantee(">=5.0.0"), ">=5.0.0");
        assert_eq!(major_compat_guarantee("*"), "*");
    }

    #[test]
    fn test_unparsable_range_unchanged() {
        assert_eq!(major_compat_guarantee("not a range"), "not a range");
    }

    #[test]
    fn test_rules_keyed_by_group() {
        let rules = RangeRules::with_compat_guarantee(["@angular/core"]);
        assert_ne!(rules.extend("@angular/core", "^12.0.0"), "^12.0.0");
        assert_eq!(rules.extend("rxjs", "^6.5.0"), "^6.5.0");
    }
}
