//! Coercion of loosely declared migration versions
//!
//! Migration collections often declare `"version": "13"` or `"13.1"`.
//! Those are padded to `13.0.0` / `13.1.0`; anything trailing the numeric
//! components (pre-release, build) is kept as-is.

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

static LEADING_NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,30}(?:\.\d{1,30}){0,2})(.*)$").unwrap());

/// Coerce a declared version into a full `major.minor.patch` version
pub fn coerce_version(raw: &str) -> Option<Version> {
    let caps = LEADING_NUMERIC_RE.captures(raw.trim())?;
    let numeric = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let padding = match numeric.split('.').count() {
        1 => ".0.0",
        2 => ".0",
        _ => "",
    };

    Version::parse(&format!("{numeric}{padding}{rest}")).ok()
}
