//! Migration runner boundary
//!
//! The runner receives a unit's entry point and the workspace root and
//! reports whether the unit succeeded and which files it touched. How the
//! entry point is loaded and isolated is up to the runner.

use super::collection::MigrationUnitDescription;
use crate::error::MigrationError;
use crate::workspace::check_in_package;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

/// Stdout prefix a unit uses to report a touched file
pub const TOUCH_PREFIX: &str = "touch:";

/// Default command prefix for running an entry point
pub const DEFAULT_RUNNER_COMMAND: &str = "node";

/// Result of running one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    pub success: bool,
    pub files_touched: Vec<PathBuf>,
}

impl UnitOutcome {
    pub fn succeeded(files_touched: Vec<PathBuf>) -> Self {
        Self {
            success: true,
            files_touched,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    /// `No changes made` / `1 file modified` / `N files modified`
    pub fn summary(&self) -> String {
        match self.files_touched.len() {
            0 => "No changes made".to_string(),
            1 => "1 file modified".to_string(),
            n => format!("{n} files modified"),
        }
    }
}

/// Runs migration units
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn run(
        &self,
        unit: &MigrationUnitDescription,
        workspace: &Path,
    ) -> Result<UnitOutcome, MigrationError>;
}

/// Runs each unit as a child process: `<command...> <entry>`
pub struct ProcessMigrationRunner {
    command: Vec<String>,
}

impl ProcessMigrationRunner {
    pub fn new(command: Vec<String>) -> Self {
        let command = if command.is_empty() {
            vec![DEFAULT_RUNNER_COMMAND.to_string()]
        } else {
            command
        };
        Self { command }
    }

    /// Validated entry point of a unit
    fn entry(unit: &MigrationUnitDescription) -> Result<(PathBuf, Option<String>), MigrationError> {
        let factory = unit
            .factory
            .as_deref()
            .ok_or_else(|| MigrationError::MissingFactory {
                name: unit.name.clone(),
            })?;
        let relative = factory.split('#').next().unwrap_or_default();
        check_in_package(relative).map_err(|reason| MigrationError::RunnerFailed {
            name: unit.name.clone(),
            message: format!("factory '{factory}': {reason}"),
        })?;
        unit.entry_point().ok_or_else(|| MigrationError::MissingFactory {
            name: unit.name.clone(),
        })
    }
}

impl Default for ProcessMigrationRunner {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl MigrationRunner for ProcessMigrationRunner {
    async fn run(
        &self,
        unit: &MigrationUnitDescription,
        workspace: &Path,
    ) -> Result<UnitOutcome, MigrationError> {
        let (entry, export) = Self::entry(unit)?;
        let (program, prefix_args) = self
            .command
            .split_first()
            .ok_or_else(|| MigrationError::RunnerFailed {
                name: unit.name.clone(),
                message: "empty runner command".to_string(),
            })?;

        debug!("running {} via {program} {}", unit.name, entry.display());
        let output = Command::new(program)
            .args(prefix_args)
            .arg(&entry)
            .current_dir(workspace)
            .env("DEPMIGRATE_UNIT", &unit.name)
            .env("DEPMIGRATE_EXPORT", export.as_deref().unwrap_or("default"))
            .env("DEPMIGRATE_WORKSPACE", workspace)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MigrationError::RunnerFailed {
                name: unit.name.clone(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let files_touched = parse_touched(&stdout);
        for line in stdout.lines().filter(|l| !l.starts_with(TOUCH_PREFIX)) {
            debug!("[{}] {line}", unit.name);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            for line in stderr.lines() {
                debug!("[{}] {line}", unit.name);
            }
            Ok(UnitOutcome::succeeded(files_touched))
        } else {
            for line in stderr.lines() {
                error!("[{}] {line}", unit.name);
            }
            Ok(UnitOutcome::failed())
        }
    }
}

/// Paths reported on `touch:` lines, deduplicated in order
pub fn parse_touched(stdout: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in stdout
        .lines()
        .filter_map(|line| line.strip_prefix(TOUCH_PREFIX))
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let path = PathBuf::from(path);
        if !files.contains(&path) {
            files.push(path);
        }
    }
    files
}
