//! Sequential execution of migration units
//!
//! Units run strictly in order. A failing unit stops the batch; with
//! per-step commits enabled, every unit that changed the tree is committed
//! before the next one starts.

use super::collection::MigrationUnitDescription;
use super::runner::{MigrationRunner, UnitOutcome};
use crate::error::{AppError, MigrationError, VcsError};
use crate::vcs::VersionControl;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What happened to each executed unit
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<(String, UnitOutcome)>,
    /// Short hashes of the commits created
    pub commits: Vec<String>,
}

impl ExecutionReport {
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().map(|(name, _)| name.as_str())
    }

    pub fn merge(&mut self, other: ExecutionReport) {
        self.outcomes.extend(other.outcomes);
        self.commits.extend(other.commits);
    }
}

/// Commit message of a migration step
pub fn commit_message(package: &str, unit: &MigrationUnitDescription) -> String {
    format!("{package} migration - {}\n\n{}", unit.name, unit.description)
}

/// Runs units through a [`MigrationRunner`]
pub struct MigrationExecutor<'a> {
    runner: &'a dyn MigrationRunner,
    workspace: &'a Path,
    vcs: Option<&'a dyn VersionControl>,
    log_file: Option<PathBuf>,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(runner: &'a dyn MigrationRunner, workspace: &'a Path) -> Self {
        Self {
            runner,
            workspace,
            vcs: None,
            log_file: None,
        }
    }

    /// Commit after every unit that changed the tree
    pub fn with_commits(mut self, vcs: &'a dyn VersionControl) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Log file referenced by failure messages
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    /// Run `units` of `package` in order
    pub async fn execute(
        &self,
        package: &str,
        units: &[MigrationUnitDescription],
    ) -> Result<ExecutionReport, AppError> {
        let mut report = ExecutionReport::default();
        if units.is_empty() {
            return Ok(report);
        }

        println!(
            "{}",
            format!("** Executing migrations of package '{package}' **").cyan()
        );

        for unit in units {
            announce(unit);

            let outcome = match self.runner.run(unit, self.workspace).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{e}");
                    UnitOutcome::failed()
                }
            };
            if !outcome.success {
                println!("  {} Migration failed.", "✖".red());
                error!("migration '{}' of '{package}' failed", unit.name);
                return Err(MigrationError::UnitFailed {
                    package: package.to_string(),
                    name: unit.name.clone(),
                    log_file: self.log_file.clone(),
                }
                .into());
            }

            println!("  {}", outcome.summary().green());
            report.outcomes.push((unit.name.clone(), outcome));

            if let Some(vcs) = self.vcs {
                if let Some(hash) = self.commit_step(vcs, package, unit)? {
                    println!(
                        "  Committed migration step ({}): {}",
                        hash.yellow(),
                        unit.title()
                    );
                    report.commits.push(hash);
                }
            }
            println!();
        }

        Ok(report)
    }

    fn commit_step(
        &self,
        vcs: &dyn VersionControl,
        package: &str,
        unit: &MigrationUnitDescription,
    ) -> Result<Option<String>, VcsError> {
        let message = commit_message(package, unit);
        if !vcs.has_changes_to_commit(self.workspace)? {
            info!("no changes to commit for {}", unit.name);
            return Ok(None);
        }
        vcs.commit(self.workspace, &message)
            .map(Some)
            .map_err(|e| VcsError::CommitFailed {
                message: unit.name.clone(),
                reason: e.to_string(),
            })
    }
}

fn announce(unit: &MigrationUnitDescription) {
    println!("  {} {}", "❯".cyan(), unit.title().bold());
    for detail in unit.details() {
        println!("    {detail}");
    }
}

/// Tell the user how to run optional units by name
pub fn report_optional(package: &str, optional: &[MigrationUnitDescription]) {
    if optional.is_empty() {
        return;
    }
    println!(
        "This package has {} optional migration(s) that can be executed separately:",
        optional.len()
    );
    for unit in optional {
        println!("  {} {}", "❯".cyan(), unit.title());
        println!(
            "    depmigrate {package} --migrate-only --name {}",
            unit.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedRunner {
        fail: &'static str,
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MigrationRunner for ScriptedRunner {
        async fn run(
            &self,
            unit: &MigrationUnitDescription,
            _workspace: &Path,
        ) -> Result<UnitOutcome, MigrationError> {
            self.ran.lock().unwrap().push(unit.name.clone());
            if unit.factory.is_none() {
                return Err(MigrationError::MissingFactory {
                    name: unit.name.clone(),
                });
            }
            if unit.name == self.fail {
                Ok(UnitOutcome::failed())
            } else {
                Ok(UnitOutcome::succeeded(vec![PathBuf::from(format!(
                    "{}.ts",
                    unit.name
                ))]))
            }
        }
    }

    #[derive(Default)]
    struct RecordingVcs {
        commits: Mutex<Vec<String>>,
        fail_commit: bool,
    }

    impl VersionControl for RecordingVcs {
        fn is_clean(&self, _workspace: &Path) -> Result<bool, VcsError> {
            Ok(true)
        }

        fn has_changes_to_commit(&self, _workspace: &Path) -> Result<bool, VcsError> {
            Ok(true)
        }

        fn commit(&self, _workspace: &Path, message: &str) -> Result<String, VcsError> {
            if self.fail_commit {
                return Err(VcsError::CommandFailed {
                    command: "git commit".to_string(),
                    stderr: "hook failed".to_string(),
                });
            }
            let mut commits = self.commits.lock().unwrap();
            commits.push(message.to_string());
            Ok(format!("{:09}", commits.len()))
        }
    }

    fn unit(name: &str, description: &str) -> MigrationUnitDescription {
        MigrationUnitDescription {
            name: name.to_string(),
            collection_id: PathBuf::from("/pkg/migrations.json"),
            declared_version: None,
            version: None,
            description: description.to_string(),
            optional: false,
            factory: Some(format!("./{name}.js")),
        }
    }

    fn units() -> Vec<MigrationUnitDescription> {
        vec![
            unit("one", "First step."),
            unit("two", "Second step."),
            unit("three", "Third step."),
        ]
    }

    #[tokio::test]
    async fn test_failure_stops_batch_after_committing_previous() {
        let runner = ScriptedRunner {
            fail: "two",
            ran: Mutex::new(Vec::new()),
        };
        let vcs = RecordingVcs::default();
        let workspace = PathBuf::from("/ws");
        let executor = MigrationExecutor::new(&runner, &workspace)
            .with_commits(&vcs)
            .with_log_file(Some(PathBuf::from("/tmp/run.log")));

        let err = executor.execute("lib", &units()).await.unwrap_err();
        assert!(err.to_string().contains("/tmp/run.log"));
        assert_eq!(*runner.ran.lock().unwrap(), vec!["one", "two"]);

        let commits = vcs.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0], "lib migration - one\n\nFirst step.");
    }

    #[tokio::test]
    async fn test_runner_error_reported_as_unit_failure() {
        let runner = ScriptedRunner {
            fail: "",
            ran: Mutex::new(Vec::new()),
        };
        let mut broken = units();
        broken[1].factory = None;
        let workspace = PathBuf::from("/ws");
        let executor = MigrationExecutor::new(&runner, &workspace)
            .with_log_file(Some(PathBuf::from("/tmp/run.log")));

        let err = executor.execute("lib", &broken).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Migration(MigrationError::UnitFailed { ref name, .. }) if name == "two"
        ));
        assert!(err.to_string().contains("/tmp/run.log"));
        assert_eq!(*runner.ran.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_all_units_run_without_commits() {
        let runner = ScriptedRunner {
            fail: "",
            ran: Mutex::new(Vec::new()),
        };
        let workspace = PathBuf::from("/ws");
        let report = MigrationExecutor::new(&runner, &workspace)
            .execute("lib", &units())
            .await
            .unwrap();
        assert_eq!(report.executed().collect::<Vec<_>>(), vec!["one", "two", "three"]);
        assert!(report.commits.is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_aborts() {
        let runner = ScriptedRunner {
            fail: "",
            ran: Mutex::new(Vec::new()),
        };
        let vcs = RecordingVcs {
            fail_commit: true,
            ..Default::default()
        };
        let workspace = PathBuf::from("/ws");
        let err = MigrationExecutor::new(&runner, &workspace)
            .with_commits(&vcs)
            .execute("lib", &units())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Vcs(VcsError::CommitFailed { .. })));
        assert_eq!(runner.ran.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_message_format() {
        let u = unit("migration-v13", "Updates lazy routes.");
        assert_eq!(
            commit_message("@angular/core", &u),
            "@angular/core migration - migration-v13\n\nUpdates lazy routes."
        );
    }
}
