//! Migrations collections
//!
//! A collection is a JSON file mapping unit names to their description:
//!
//! ```json
//! { "schematics": { "migration-v13": {
//!     "version": "13.0.0",
//!     "description": "Updates lazy routes. Also removes the old syntax.",
//!     "factory": "./v13/index#migrate"
//! } } }
//! ```

use crate::error::MigrationError;
use crate::version::coerce_version;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(alias = "migrations", default)]
    schematics: BTreeMap<String, RawUnit>,
}

#[derive(Debug, Deserialize)]
struct RawUnit {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    factory: Option<String>,
    #[serde(default)]
    optional: bool,
}

/// One transformation unit of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnitDescription {
    pub name: String,
    /// Path of the collection file the unit belongs to
    pub collection_id: PathBuf,
    /// Version exactly as declared
    pub declared_version: Option<String>,
    /// `None` when the declared version cannot be coerced
    pub version: Option<Version>,
    pub description: String,
    /// Optional units never run as part of a range
    pub optional: bool,
    /// Entry point, `path[#export]` relative to the collection
    pub factory: Option<String>,
}

impl MigrationUnitDescription {
    /// First sentence of the description, always ending with a period
    pub fn title(&self) -> String {
        let first = self
            .description
            .split(". ")
            .next()
            .unwrap_or_default()
            .trim();
        if first.is_empty() || first.ends_with('.') {
            first.to_string()
        } else {
            format!("{first}.")
        }
    }

    /// Remaining sentences of the description
    pub fn details(&self) -> Vec<String> {
        self.description
            .split(". ")
            .skip(1)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Resolved entry point: (file, export)
    pub fn entry_point(&self) -> Option<(PathBuf, Option<String>)> {
        let factory = self.factory.as_deref()?;
        let (path, export) = match factory.split_once('#') {
            Some((path, export)) => (path, Some(export.to_string())),
            None => (factory, None),
        };
        let dir = self.collection_id.parent().unwrap_or(Path::new("."));
        Some((dir.join(path), export))
    }
}

/// A loaded migrations collection
#[derive(Debug, Clone)]
pub struct MigrationCollection {
    pub path: PathBuf,
    pub units: Vec<MigrationUnitDescription>,
}

impl MigrationCollection {
    /// Load and parse a collection file
    pub fn load(path: &Path) -> Result<Self, MigrationError> {
        let content = fs::read_to_string(path).map_err(|e| MigrationError::InvalidCollection {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    /// Parse collection content
    pub fn parse(path: &Path, content: &str) -> Result<Self, MigrationError> {
        let raw: RawCollection =
            serde_json::from_str(content).map_err(|e| MigrationError::InvalidCollection {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let units = raw
            .schematics
            .into_iter()
            .map(|(name, unit)| {
                let version = unit.version.as_deref().and_then(coerce_version);
                if version.is_none() {
                    debug!("migration {name} has no usable version ({:?})", unit.version);
                }
                MigrationUnitDescription {
                    name,
                    collection_id: path.to_path_buf(),
                    declared_version: unit.version,
                    version,
                    description: unit.description,
                    optional: unit.optional,
                    factory: unit.factory,
                }
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            units,
        })
    }

    /// Display name of the collection
    pub fn id(&self) -> String {
        self.path.display().to_string()
    }
}
