//! The plan handed from planning to execution

use semver::Version;

/// One package that passed resolution, the major guard and peer validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    /// Version currently installed in the workspace
    pub installed: Version,
    /// Version the manifest is rewritten to
    pub target: Version,
    /// Migrations collection path declared by the target version
    pub migrations: Option<String>,
}

impl PlanEntry {
    pub fn new(name: impl Into<String>, installed: Version, target: Version) -> Self {
        Self {
            name: name.into(),
            installed,
            target,
            migrations: None,
        }
    }

    pub fn with_migrations(mut self, path: Option<String>) -> Self {
        self.migrations = path;
        self
    }
}

/// Ordered `(package, target)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    entries: Vec<PlanEntry>,
}

impl UpdatePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing an earlier entry for the same package
    pub fn push(&mut self, entry: PlanEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries whose target declares a migrations collection
    pub fn with_migrations(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.migrations.is_some())
    }

    /// Commit message summarizing the manifest update
    pub fn commit_message(&self) -> String {
        let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        format!("Update packages - {}", names.join(", "))
    }
}
