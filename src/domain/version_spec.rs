//! Declared dependency ranges as written in package.json
//!
//! Handles the forms that survive a rewrite with their prefix intact:
//! - `^1.2.3` (caret)
//! - `~1.2.3` (tilde)
//! - `>=1.2.3` (lower bound)
//! - `1.2.3` (exact pin)
//!
//! Any other range (`1.x`, `>=1 <2`, tags, urls) is rewritten as an exact pin.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSpecKind {
    /// Exact pin (`1.2.3`)
    Exact,
    /// Caret range (`^1.2.3`)
    Caret,
    /// Tilde range (`~1.2.3`)
    Tilde,
    /// Lower bound (`>=1.2.3`)
    GreaterOrEqual,
    /// Anything else
    Other,
}

impl VersionSpecKind {
    /// Prefix written back in front of the new version
    pub fn prefix(&self) -> &'static str {
        match self {
            VersionSpecKind::Caret => "^",
            VersionSpecKind::Tilde => "~",
            VersionSpecKind::GreaterOrEqual => ">=",
            VersionSpecKind::Exact | VersionSpecKind::Other => "",
        }
    }
}

/// A declared range with its original string representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub kind: VersionSpecKind,
    /// The range as it appears in the manifest
    pub raw: String,
}

impl VersionSpec {
    /// Classify a declared range
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let kind = if let Some(rest) = trimmed.strip_prefix(">=") {
            single_version(rest, VersionSpecKind::GreaterOrEqual)
        } else if let Some(rest) = trimmed.strip_prefix('^') {
            single_version(rest, VersionSpecKind::Caret)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            single_version(rest, VersionSpecKind::Tilde)
        } else {
            single_version(trimmed, VersionSpecKind::Exact)
        };

        Self {
            kind,
            raw: raw.to_string(),
        }
    }

    /// Format a new version while preserving the declared prefix
    pub fn format_updated(&self, new_version: &str) -> String {
        format!("{}{}", self.kind.prefix(), new_version)
    }
}

/// `kind` when the rest is a bare version, `Other` otherwise
fn single_version(rest: &str, kind: VersionSpecKind) -> VersionSpecKind {
    let rest = rest.trim();
    let looks_like_version = !rest.is_empty()
        && rest.starts_with(|c: char| c.is_ascii_digit())
        && !rest.contains(char::is_whitespace)
        && !rest.contains("||")
        && !rest.contains(['x', 'X', '*']);
    if looks_like_version {
        kind
    } else {
        VersionSpecKind::Other
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
