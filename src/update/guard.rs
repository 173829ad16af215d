//! Major version skip protection for first-party packages

use crate::error::PolicyError;
use crate::version::leading_major;
use regex::Regex;
use std::sync::LazyLock;

/// Default first-party name pattern
pub const DEFAULT_FIRST_PARTY_PATTERN: &str = r"^@(?:angular|nguniversal|schematics|angular-devkit)/";

static FIRST_PARTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_FIRST_PARTY_PATTERN).unwrap());

/// Before this major, updates may not suggest an intermediate target
const SUGGESTION_MIN_MAJOR: u64 = 6;

/// Rejects updates that skip a major version of a first-party package
#[derive(Debug, Clone)]
pub struct MajorVersionGuard {
    first_party: Regex,
}

impl MajorVersionGuard {
    pub fn new(first_party: Regex) -> Self {
        Self { first_party }
    }

    pub fn is_first_party(&self, name: &str) -> bool {
        self.first_party.is_match(name)
    }

    /// Check one update; versions are compared by their leading integer
    pub fn check(&self, name: &str, installed: &str, target: &str) -> Result<(), PolicyError> {
        if !self.is_first_party(name) {
            return Ok(());
        }
        let (Some(installed_major), Some(target_major)) =
            (leading_major(installed), leading_major(target))
        else {
            return Ok(());
        };

        if target_major <= installed_major + 1 {
            return Ok(());
        }

        let mut message = format!(
            "Updating multiple major versions of '{name}' at once is not supported. \
             Please migrate each major version individually."
        );
        if installed_major >= SUGGESTION_MIN_MAJOR {
            let next = installed_major + 1;
            message.push_str(&format!(
                "\nRun 'depmigrate {name}@{next}' in your workspace directory \
                 to update to latest '{next}.x' version of '{name}'."
            ));
        }

        Err(PolicyError::MajorVersionSkip {
            package: name.to_string(),
            installed_major,
            target_major,
            message,
        })
    }
}

impl Default for MajorVersionGuard {
    fn default() -> Self {
        Self::new(FIRST_PARTY_RE.clone())
    }
}
