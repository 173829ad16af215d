//! Selection of migration units

use super::collection::{MigrationCollection, MigrationUnitDescription};
use crate::error::MigrationError;
use crate::version::{base_version, cmp_precedence, prerelease_floor};
use semver::Version;
use std::cmp::Ordering;

/// Units selected for a version range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangePlan {
    /// Units run automatically, in execution order
    pub required: Vec<MigrationUnitDescription>,
    /// Units that only run when requested by name
    pub optional: Vec<MigrationUnitDescription>,
}

impl RangePlan {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// Look up one unit by exact name
pub fn find_named<'a>(
    collection: &'a MigrationCollection,
    name: &str,
) -> Result<&'a MigrationUnitDescription, MigrationError> {
    collection
        .units
        .iter()
        .find(|unit| unit.name == name)
        .ok_or_else(|| MigrationError::UnitNotFound {
            name: name.to_string(),
            collection: collection.id(),
        })
}

/// Whether `version` lies in `(from, to]`.
///
/// A pre-release `from` is widened to its `-0` floor, and `to` is compared
/// by its release version so that its own pre-releases are included.
pub fn in_range(version: &Version, from: &Version, to: &Version) -> bool {
    let lower = if from.pre.is_empty() {
        from.clone()
    } else {
        prerelease_floor(from)
    };
    let upper = base_version(to);

    cmp_precedence(version, &lower) == Ordering::Greater
        && cmp_precedence(version, &upper) != Ordering::Greater
}

/// Select every versioned unit in `(from, to]`, ordered by version then name
pub fn plan_range(collection: &MigrationCollection, from: &Version, to: &Version) -> RangePlan {
    let mut selected: Vec<&MigrationUnitDescription> = collection
        .units
        .iter()
        .filter(|unit| {
            unit.version
                .as_ref()
                .is_some_and(|version| in_range(version, from, to))
        })
        .collect();

    selected.sort_by(|a, b| {
        let (Some(va), Some(vb)) = (&a.version, &b.version) else {
            return Ordering::Equal;
        };
        cmp_precedence(va, vb).then_with(|| a.name.cmp(&b.name))
    });

    let (optional, required): (Vec<_>, Vec<_>) =
        selected.into_iter().cloned().partition(|unit| unit.optional);
    RangePlan { required, optional }
}
