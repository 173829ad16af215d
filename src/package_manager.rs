//! Package manager integration
//!
//! This module provides:
//! - Detection of the workspace package manager from its lockfile
//! - Reinstalling workspace dependencies after the manifest is rewritten
//! - Installing a single package into a scratch directory

use crate::error::InstallError;
use crate::workspace::MANIFEST_FILE;
use std::fmt;
use std::path::Path;
use std::process::{Command, Output};
use tracing::{debug, info};

/// Node.js package managers, detected by lockfile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// Detect the package manager of a workspace.
    ///
    /// Lockfiles are checked in order of preference; a workspace with only a
    /// `package.json` uses npm.
    pub fn detect(working_dir: &Path) -> Option<Self> {
        if working_dir.join("pnpm-lock.yaml").exists() {
            return Some(Self::Pnpm);
        }
        if working_dir.join("yarn.lock").exists() {
            return Some(Self::Yarn);
        }
        if working_dir.join("bun.lockb").exists() || working_dir.join("bun.lock").exists() {
            return Some(Self::Bun);
        }
        if working_dir.join("package-lock.json").exists() {
            return Some(Self::Npm);
        }
        if working_dir.join(MANIFEST_FILE).exists() {
            return Some(Self::Npm);
        }
        None
    }

    pub fn program(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
        }
    }

    /// Command reinstalling every dependency of the workspace
    pub fn install_command(&self) -> Vec<&'static str> {
        vec![self.program(), "install"]
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Result of a package manager invocation
#[derive(Debug, Clone)]
pub struct InstallResult {
    /// The command that was executed
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl InstallResult {
    /// Create a skipped result (no package manager found)
    pub fn skipped() -> Self {
        Self {
            command: String::new(),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.command.is_empty()
    }

    /// Turn a failed invocation into an error
    pub fn into_result(self) -> Result<Self, InstallError> {
        if self.success {
            Ok(self)
        } else {
            Err(InstallError::Failed {
                command: self.command,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs package manager installs
pub trait Installer: Send + Sync {
    /// Reinstall the dependencies of `workspace`
    fn install(&self, workspace: &Path) -> Result<InstallResult, InstallError>;

    /// Install `spec` (`name@version`) under `prefix`
    fn install_into(&self, spec: &str, prefix: &Path) -> Result<InstallResult, InstallError>;
}

/// [`Installer`] that executes the real package manager
#[derive(Debug, Default, Clone)]
pub struct SystemInstaller {
    registry: Option<String>,
}

impl SystemInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass a registry URL to the package manager
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    fn run_command(&self, command: &[&str], working_dir: &Path) -> Result<Output, InstallError> {
        let (program, args) = command.split_first().ok_or_else(|| InstallError::Spawn {
            command: String::new(),
            message: "empty command".to_string(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(working_dir);
        if let Some(registry) = &self.registry {
            cmd.env("npm_config_registry", registry);
        }
        debug!("running {} in {}", command.join(" "), working_dir.display());
        cmd.output().map_err(|e| InstallError::Spawn {
            command: command.join(" "),
            message: e.to_string(),
        })
    }

    fn execute(&self, command: &[&str], working_dir: &Path) -> Result<InstallResult, InstallError> {
        let output = self.run_command(command, working_dir)?;
        Ok(InstallResult {
            command: command.join(" "),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Installer for SystemInstaller {
    fn install(&self, workspace: &Path) -> Result<InstallResult, InstallError> {
        let Some(manager) = PackageManager::detect(workspace) else {
            return Ok(InstallResult::skipped());
        };
        info!("installing packages with {manager}");
        self.execute(&manager.install_command(), workspace)?
            .into_result()
    }

    fn install_into(&self, spec: &str, prefix: &Path) -> Result<InstallResult, InstallError> {
        let prefix_str = prefix.to_string_lossy();
        let command = [
            "npm",
            "install",
            "--prefix",
            prefix_str.as_ref(),
            "--no-save",
            "--no-audit",
            "--no-fund",
            spec,
        ];
        self.execute(&command, prefix)?.into_result()
    }
}

/// [`Installer`] that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstaller;

impl Installer for NoopInstaller {
    fn install(&self, _workspace: &Path) -> Result<InstallResult, InstallError> {
        Ok(InstallResult::skipped())
    }

    fn install_into(&self, _spec: &str, _prefix: &Path) -> Result<InstallResult, InstallError> {
        Ok(InstallResult::skipped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_result_failure_into_error() {
        let result = InstallResult {
            command: "npm install".to_string(),
            success: false,
            stdout: String::new(),
            stderr: "ERESOLVE\n".to_string(),
        };
        let err = result.into_result().unwrap_err();
        assert_eq!(err.to_string(), "'npm install' failed: ERESOLVE");
    }

    #[test]
    fn test_install_result_skipped() {
        let result = InstallResult::skipped();
        assert!(result.success);
        assert!(result.is_skipped());
    }

    #[test]
    fn test_install_command() {
        assert_eq!(PackageManager::Npm.install_command(), vec!["npm", "install"]);
        assert_eq!(PackageManager::Pnpm.install_command(), vec!["pnpm", "install"]);
        assert_eq!(PackageManager::Yarn.to_string(), "yarn");
    }

    #[test]
    fn test_detect_npm_lockfile() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("package-lock.json"), "{}").unwrap();
        assert_eq!(
            PackageManager::detect(temp_dir.path()),
            Some(PackageManager::Npm)
        );
    }

    #[test]
    fn test_detect_yarn() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(
            PackageManager::detect(temp_dir.path()),
            Some(PackageManager::Yarn)
        );
    }

    #[test]
    fn test_detect_prefers_pnpm() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("pnpm-lock.yaml"), "").unwrap();
        std::fs::write(temp_dir.path().join("package-lock.json"), "{}").unwrap();
        assert_eq!(
            PackageManager::detect(temp_dir.path()),
            Some(PackageManager::Pnpm)
        );
    }

    #[test]
    fn test_detect_bun() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("bun.lockb"), "").unwrap();
        assert_eq!(
            PackageManager::detect(temp_dir.path()),
            Some(PackageManager::Bun)
        );
    }

    #[test]
    fn test_detect_default_npm() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(
            PackageManager::detect(temp_dir.path()),
            Some(PackageManager::Npm)
        );
    }

    #[test]
    fn test_detect_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(PackageManager::detect(temp_dir.path()), None);
    }

    #[test]
    fn test_install_skipped_without_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = SystemInstaller::new().install(temp_dir.path()).unwrap();
        assert!(result.is_skipped());
    }

    #[test]
    fn test_noop_installer() {
        let result = NoopInstaller.install(Path::new(".")).unwrap();
        assert!(result.is_skipped());
    }
}
