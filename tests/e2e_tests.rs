//! End-to-end tests for the depmigrate binary
//!
//! These tests verify:
//! - Exit codes for argument errors, failures and the dirty-repository check
//! - Config file handling
//! - A migrate-only run through the child-process runner

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Unreachable registry, so an accidental fetch fails fast instead of going online
const OFFLINE_REGISTRY: &str = "http://127.0.0.1:9";

fn depmigrate() -> Command {
    let mut cmd = Command::cargo_bin("depmigrate").unwrap();
    cmd.env("DEPMIGRATE_DISABLE_VERSION_CHECK", "1")
        .env_remove("DEPMIGRATE_LOG")
        .env_remove("NPM_CONFIG_REGISTRY");
    cmd
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_test_project() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    write(
        &temp_dir.path().join("package.json"),
        r#"{
  "name": "test-project",
  "version": "1.0.0",
  "dependencies": {
    "rxjs": "^7.4.0"
  }
}"#,
    );
    temp_dir
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok()
}

mod arguments {
    use super::*;

    #[test]
    fn test_help_exits_zero() {
        depmigrate()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--migrate-only"));
    }

    #[test]
    fn test_version_exits_zero() {
        depmigrate()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_name_conflicts_with_from() {
        depmigrate()
            .args(["lib", "--migrate-only", "--name", "m", "--from", "1"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_to_requires_migrate_only() {
        depmigrate().args(["lib", "--to", "2.0.0"]).assert().code(1);
    }

    #[test]
    fn test_unknown_flag() {
        depmigrate().arg("--dry-run").assert().code(1);
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_missing_workspace_path() {
        depmigrate()
            .args(["rxjs", "--path", "/definitely/not/a/workspace"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("invalid path"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        depmigrate()
            .args(["rxjs", "--allow-dirty", "--registry", OFFLINE_REGISTRY])
            .arg("--path")
            .arg(dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("manifest file not found"));
    }

    #[test]
    fn test_duplicate_packages() {
        let project = create_test_project();
        depmigrate()
            .args(["rxjs,rxjs@7", "--allow-dirty"])
            .arg("--path")
            .arg(project.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("duplicate package 'rxjs'"));
    }

    #[test]
    fn test_invalid_config() {
        let project = create_test_project();
        write(&project.path().join("depmigrate.toml"), "install = \"sometimes\"\n");
        depmigrate()
            .args(["rxjs", "--allow-dirty"])
            .arg("--path")
            .arg(project.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("failed to parse config"));
    }

    #[test]
    fn test_dirty_repository_exits_two() {
        if !git_available() {
            return;
        }
        let project = create_test_project();
        let init = std::process::Command::new("git")
            .current_dir(project.path())
            .args(["init", "-q"])
            .status()
            .unwrap();
        assert!(init.success());

        depmigrate()
            .args(["rxjs", "--registry", OFFLINE_REGISTRY])
            .arg("--path")
            .arg(project.path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("repository is not clean"));
    }
}

#[cfg(unix)]
mod migrate_only {
    use super::*;

    #[test]
    fn test_runs_units_through_process_runner() {
        let project = create_test_project();
        let root = project.path();
        write(
            &root.join("depmigrate.toml"),
            "migration-runner = [\"sh\"]\ninstall = false\n",
        );
        write(
            &root.join("node_modules/lib/package.json"),
            r#"{ "name": "lib", "version": "2.1.0", "ng-update": { "migrations": "./migrations.json" } }"#,
        );
        write(
            &root.join("node_modules/lib/migrations.json"),
            r#"{ "schematics": {
                "rename-config": {
                    "version": "2.0.0",
                    "description": "Renames the config file. Old names are kept as aliases.",
                    "factory": "./rename.sh"
                },
                "future": { "version": "3.0.0", "description": "Not yet.", "factory": "./future.sh" }
            } }"#,
        );
        write(
            &root.join("node_modules/lib/rename.sh"),
            "echo renamed > app.config\necho touch:app.config\n",
        );

        depmigrate()
            .args(["lib", "--migrate-only", "--from", "1", "--allow-dirty"])
            .arg("--path")
            .arg(root)
            .assert()
            .success()
            .stdout(predicate::str::contains("Renames the config file."))
            .stdout(predicate::str::contains("1 file modified"))
            .stdout(predicate::str::contains("Not yet.").not());

        assert_eq!(
            fs::read_to_string(root.join("app.config")).unwrap().trim(),
            "renamed"
        );
    }

    #[test]
    fn test_failing_unit_exits_one_with_log_pointer() {
        let project = create_test_project();
        let root = project.path();
        write(&root.join("depmigrate.toml"), "migration-runner = [\"sh\"]\n");
        write(
            &root.join("node_modules/lib/package.json"),
            r#"{ "name": "lib", "version": "2.0.0", "ng-update": { "migrations": "./migrations.json" } }"#,
        );
        write(
            &root.join("node_modules/lib/migrations.json"),
            r#"{ "schematics": { "broken": { "version": "2.0.0", "description": "Breaks.", "factory": "./broken.sh" } } }"#,
        );
        write(&root.join("node_modules/lib/broken.sh"), "exit 4\n");

        depmigrate()
            .args(["lib", "--migrate-only", "--name", "broken", "--allow-dirty"])
            .arg("--path")
            .arg(root)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("migration 'broken' of package 'lib' failed"))
            .stderr(predicate::str::contains("depmigrate-"));
    }
}
