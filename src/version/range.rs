//! npm range syntax on top of `semver::Version`
//!
//! Handles:
//! - Alternatives: `^12.0.0 || ^13.0.0`
//! - Comparator sets: `>=1.2.3 <2.0.0`, `>= 1.2.3`
//! - Caret / tilde: `^1.2.3`, `~1.2`, `~>1.2`
//! - X-ranges: `*`, `1.x`, `1.2.*`, `1`, `1.2`
//! - Hyphen ranges: `1.2.3 - 2.3`
//!
//! Ranges desugar into `>=`/`<` comparators the same way npm does, with
//! exclusive upper bounds expressed as `X.Y.Z-0`.

use super::cmp_precedence;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static HYPHEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").unwrap());
static OPERATOR_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<=|>=|<|>|=|\^|~>?)\s+").unwrap());
static PARTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v?(\d+|[xX*])(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$",
    )
    .unwrap()
});

/// Comparison operator of a desugared comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

/// A single `op version` constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Check a version against this comparator alone
    pub fn matches(&self, version: &Version) -> bool {
        let ord = cmp_precedence(version, &self.version);
        match self.op {
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Eq => ord == Ordering::Equal,
        }
    }
}

/// Range could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version range '{0}'")]
pub struct RangeParseError(pub String);

/// A parsed npm version range
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    /// Alternatives; an empty set matches any version
    sets: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// Parse an npm range expression
    pub fn parse(raw: &str) -> Result<Self, RangeParseError> {
        let sets = raw
            .split("||")
            .map(parse_set)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RangeParseError(raw.to_string()))?;

        Ok(Self {
            raw: raw.trim().to_string(),
            sets,
        })
    }

    /// The range as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Desugared comparator sets
    pub fn sets(&self) -> &[Vec<Comparator>] {
        &self.sets
    }

    /// Check whether a version satisfies the range.
    ///
    /// Without `include_prerelease`, a pre-release version only matches a
    /// set that names a pre-release on the same `major.minor.patch`.
    pub fn satisfies(&self, version: &Version, include_prerelease: bool) -> bool {
        self.sets
            .iter()
            .any(|set| set_matches(set, version, include_prerelease))
    }

    /// True when `version` is greater than every version the range can match
    pub fn is_below(&self, version: &Version) -> bool {
        self.sets.iter().all(|set| {
            let upper = set
                .iter()
                .filter(|c| matches!(c.op, Op::Lt | Op::Le | Op::Eq))
                .fold(None::<&Comparator>, |tightest, c| match tightest {
                    None => Some(c),
                    Some(cur) => match cmp_precedence(&c.version, &cur.version) {
                        Ordering::Less => Some(c),
                        Ordering::Equal if c.op == Op::Lt => Some(c),
                        _ => Some(cur),
                    },
                });

            match upper {
                None => false,
                Some(c) if c.op == Op::Lt => {
                    cmp_precedence(version, &c.version) != Ordering::Less
                }
                Some(c) => cmp_precedence(version, &c.version) == Ordering::Greater,
            }
        })
    }

    /// Highest version satisfying the range (pre-releases only when named)
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions
            .into_iter()
            .filter(|v| self.satisfies(v, false))
            .max_by(|a, b| cmp_precedence(a, b))
    }
}

impl FromStr for VersionRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn set_matches(set: &[Comparator], version: &Version, include_prerelease: bool) -> bool {
    if !set.iter().all(|c| c.matches(version)) {
        return false;
    }

    if version.pre.is_empty() || include_prerelease {
        return true;
    }

    set.iter().any(|c| {
        !c.version.pre.is_empty()
            && c.version.major == version.major
            && c.version.minor == version.minor
            && c.version.patch == version.patch
    })
}

/// A possibly incomplete version (`1`, `1.2`, `1.x`)
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(s: &str) -> Option<Self> {
        let caps = PARTIAL_RE.captures(s)?;
        let component = |i: usize| -> Option<u64> { caps.get(i)?.as_str().parse().ok() };

        let major = component(1);
        let minor = major.and(component(2));
        let patch = minor.and(component(3));
        let pre = match (patch, caps.get(4)) {
            (Some(_), Some(m)) => Prerelease::new(m.as_str()).ok()?,
            _ => Prerelease::EMPTY,
        };

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    fn full(&self) -> Option<Version> {
        Some(Version {
            major: self.major?,
            minor: self.minor?,
            patch: self.patch?,
            pre: self.pre.clone(),
            build: BuildMetadata::EMPTY,
        })
    }
}

fn release(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

/// Exclusive upper bound that also excludes pre-releases of the bound
fn floor(major: u64, minor: u64, patch: u64) -> Version {
    Version {
        pre: Prerelease::new("0").unwrap_or(Prerelease::EMPTY),
        ..release(major, minor, patch)
    }
}

fn nothing() -> Vec<Comparator> {
    vec![Comparator::new(Op::Lt, floor(0, 0, 0))]
}

fn parse_set(alternative: &str) -> Option<Vec<Comparator>> {
    let trimmed = alternative.trim();

    if let Some(caps) = HYPHEN_RE.captures(trimmed) {
        let from = Partial::parse(&caps[1])?;
        let to = Partial::parse(&caps[2])?;
        let mut set = ge(&from);
        set.extend(le(&to));
        return Some(set);
    }

    let normalized = OPERATOR_SPACE_RE.replace_all(trimmed, "$1");
    let mut set = Vec::new();
    for token in normalized.split_whitespace() {
        set.extend(parse_token(token)?);
    }
    Some(set)
}

fn parse_token(token: &str) -> Option<Vec<Comparator>> {
    const OPERATORS: [&str; 8] = ["<=", ">=", "~>", "<", ">", "=", "^", "~"];

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token));
    let partial = Partial::parse(rest)?;

    Some(match op {
        "^" => caret(&partial),
        "~" | "~>" => tilde(&partial),
        ">" => gt(&partial),
        ">=" => ge(&partial),
        "<" => lt(&partial),
        "<=" => le(&partial),
        _ => exact(&partial),
    })
}

fn exact(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        return vec![Comparator::new(Op::Eq, v)];
    }
    match (p.major, p.minor) {
        (Some(major), Some(minor)) => vec![
            Comparator::new(Op::Ge, release(major, minor, 0)),
            Comparator::new(Op::Lt, floor(major, minor + 1, 0)),
        ],
        (Some(major), None) => vec![
            Comparator::new(Op::Ge, release(major, 0, 0)),
            Comparator::new(Op::Lt, floor(major + 1, 0, 0)),
        ],
        _ => Vec::new(),
    }
}

fn caret(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        let upper = match (v.major, v.minor) {
            (0, 0) => floor(0, 0, v.patch + 1),
            (0, minor) => floor(0, minor + 1, 0),
            (major, _) => floor(major + 1, 0, 0),
        };
        return vec![
            Comparator::new(Op::Ge, v),
            Comparator::new(Op::Lt, upper),
        ];
    }
    match (p.major, p.minor) {
        (Some(0), Some(minor)) => vec![
            Comparator::new(Op::Ge, release(0, minor, 0)),
            Comparator::new(Op::Lt, floor(0, minor + 1, 0)),
        ],
        (Some(major), Some(minor)) => vec![
            Comparator::new(Op::Ge, release(major, minor, 0)),
            Comparator::new(Op::Lt, floor(major + 1, 0, 0)),
        ],
        _ => exact(p),
    }
}

fn tilde(p: &Partial) -> Vec<Comparator> {
    match p.full() {
        Some(v) => {
            let upper = floor(v.major, v.minor + 1, 0);
            vec![Comparator::new(Op::Ge, v), Comparator::new(Op::Lt, upper)]
        }
        None => exact(p),
    }
}

fn gt(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        return vec![Comparator::new(Op::Gt, v)];
    }
    match (p.major, p.minor) {
        (Some(major), Some(minor)) => vec![Comparator::new(Op::Ge, release(major, minor + 1, 0))],
        (Some(major), None) => vec![Comparator::new(Op::Ge, release(major + 1, 0, 0))],
        _ => nothing(),
    }
}

fn ge(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        return vec![Comparator::new(Op::Ge, v)];
    }
    match (p.major, p.minor) {
        (Some(major), Some(minor)) => vec![Comparator::new(Op::Ge, release(major, minor, 0))],
        (Some(major), None) => vec![Comparator::new(Op::Ge, release(major, 0, 0))],
        _ => Vec::new(),
    }
}

fn lt(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        return vec![Comparator::new(Op::Lt, v)];
    }
    match (p.major, p.minor) {
        (Some(major), Some(minor)) => vec![Comparator::new(Op::Lt, floor(major, minor, 0))],
        (Some(major), None) => vec![Comparator::new(Op::Lt, floor(major, 0, 0))],
        _ => nothing(),
    }
}

fn le(p: &Partial) -> Vec<Comparator> {
    if let Some(v) = p.full() {
        return vec![Comparator::new(Op::Le, v)];
    }
    match (p.major, p.minor) {
        (Some(major), Some(minor)) => vec![Comparator::new(Op::Lt, floor(major, minor + 1, 0))],
        (Some(major), None) => vec![Comparator::new(Op::Lt, floor(major + 1, 0, 0))],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn sat(range: &str, version: &str) -> bool {
        VersionRange::parse(range)
            .unwrap()
            .satisfies(&v(version), false)
    }

    #[test]
    fn test_caret() {
        assert!(sat("^12.0.0", "12.0.0"));
        assert!(sat("^12.0.0", "12.9.1"));
        assert!(!sat("^12.0.0", "13.0.0"));
        assert!(!sat("^12.1.0", "12.0.5"));
    }

    #[test]
    fn test_caret_zero_major() {
        assert!(sat("^0.2.3", "0.2.9"));
        assert!(!sat("^0.2.3", "0.3.0"));
        assert!(sat("^0.0.3", "0.0.3"));
        assert!(!sat("^0.0.3", "0.0.4"));
    }

    #[test]
    fn test_tilde() {
        assert!(sat("~1.2.3", "1.2.9"));
        assert!(!sat("~1.2.3", "1.3.0"));
        assert!(sat("~1.2", "1.2.0"));
        assert!(sat("~>1.2", "1.2.4"));
    }

    #[test]
    fn test_x_ranges() {
        assert!(sat("*", "3.1.4"));
        assert!(sat("", "3.1.4"));
        assert!(sat("1.x", "1.9.9"));
        assert!(!sat("1.x", "2.0.0"));
        assert!(sat("1.2.*", "1.2.7"));
        assert!(sat("12", "12.4.0"));
    }

    #[test]
    fn test_comparator_sets_and_spacing() {
        assert!(sat(">=1.0.0 <2.0.0", "1.5.0"));
        assert!(!sat(">=1.0.0 <2.0.0", "2.0.0"));
        assert!(sat(">= 1.0.0", "1.0.0"));
        assert!(sat("<=1.2", "1.2.9"));
        assert!(!sat(">1", "1.9.0"));
        assert!(sat(">1", "2.0.0"));
    }

    #[test]
    fn test_alternatives() {
        assert!(sat("^12.0.0 || ^13.0.0", "13.1.0"));
        assert!(!sat("^12.0.0 || ^13.0.0", "14.0.0"));
    }

    #[test]
    fn test_hyphen() {
        assert!(sat("1.2.3 - 2.3", "2.3.9"));
        assert!(!sat("1.2.3 - 2.3", "2.4.0"));
        assert!(sat("1.2.3 - 2.3.4", "2.3.4"));
    }

    #[test]
    fn test_prerelease_exclusion() {
        assert!(!sat("^13.0.0", "13.1.0-next.0"));
        assert!(sat("^13.0.0-next.0", "13.0.0-next.3"));
        assert!(!sat("^13.0.0-next.0", "13.1.0-next.0"));

        let range = VersionRange::parse("^13.0.0").unwrap();
        assert!(range.satisfies(&v("13.1.0-next.0"), true));
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse("not a range").is_err());
        assert!(VersionRange::parse("^1.2.3.4").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }

    #[test]
    fn test_is_below() {
        let range = VersionRange::parse("^12.0.0").unwrap();
        assert!(range.is_below(&v("13.0.0")));
        assert!(!range.is_below(&v("12.5.0")));
        assert!(!range.is_below(&v("11.0.0")));

        let unbounded = VersionRange::parse(">=5.0.0").unwrap();
        assert!(!unbounded.is_below(&v("99.0.0")));

        let exact = VersionRange::parse("4.1.0").unwrap();
        assert!(exact.is_below(&v("4.1.1")));
        assert!(!exact.is_below(&v("4.1.0")));
    }

    #[test]
    fn test_max_satisfying() {
        let versions = [v("1.0.0"), v("1.4.2"), v("2.0.0"), v("1.5.0-beta.1")];
        let range = VersionRange::parse("^1.0.0").unwrap();
        assert_eq!(range.max_satisfying(versions.iter()), Some(&versions[1]));

        let none = VersionRange::parse("^3.0.0").unwrap();
        assert!(none.max_satisfying(versions.iter()).is_none());
    }

    #[test]
    fn test_display_keeps_raw() {
        let range = VersionRange::parse(" ^12.0.0 ").unwrap();
        assert_eq!(range.to_string(), "^12.0.0");
    }
}
