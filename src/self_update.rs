//! Self-version check
//!
//! Migrations of a first-party major are written against the tool of the
//! same major. Before updating, the version of this tool matching the
//! request is resolved in the registry; when it differs from the running
//! build, that version is installed into a scratch directory and run with
//! the same arguments instead.

use crate::config::{Settings, DISABLE_VERSION_CHECK_ENV};
use crate::domain::PackageIdentifier;
use crate::error::{AppError, InstallError};
use crate::package_manager::Installer;
use crate::registry::MetadataCache;
use crate::update::{MajorVersionGuard, VersionResolver};
use crate::version::{cmp_precedence, coerce_version, parse_version};
use semver::Version;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Outcome of the version check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    /// Keep going with the running build
    Current,
    /// Another build ran in our place and exited with this code
    Reexecuted(i32),
}

/// Spec of the tool version that should run for `requests`.
///
/// `next` with `--next`; otherwise the major of the first first-party
/// request (`latest` when its spec has no usable version); otherwise the
/// major of the running build.
pub fn runner_spec(
    requests: &[PackageIdentifier],
    next: bool,
    guard: &MajorVersionGuard,
    current: &Version,
) -> String {
    if next {
        return "next".to_string();
    }
    match requests.iter().find(|r| guard.is_first_party(&r.name)) {
        Some(request) => request
            .raw_spec
            .as_deref()
            .and_then(coerce_version)
            .map(|v| v.major.to_string())
            .unwrap_or_else(|| "latest".to_string()),
        None => current.major.to_string(),
    }
}

/// Resolves and, when needed, runs another build of this tool
pub struct SelfUpdater<'a> {
    settings: &'a Settings,
    cache: &'a MetadataCache,
    installer: &'a dyn Installer,
    current: Version,
}

impl<'a> SelfUpdater<'a> {
    pub fn new(settings: &'a Settings, cache: &'a MetadataCache, installer: &'a dyn Installer) -> Self {
        let current = parse_version(env!("CARGO_PKG_VERSION")).unwrap_or_else(|| Version::new(0, 0, 0));
        Self {
            settings,
            cache,
            installer,
            current,
        }
    }

    /// Pretend to be another build
    pub fn with_current(mut self, current: Version) -> Self {
        self.current = current;
        self
    }

    /// Version to switch to, or `None` to keep the running build.
    ///
    /// Registry problems never block the update; they only skip the check.
    pub async fn target_version(
        &self,
        self_package: &str,
        requests: &[PackageIdentifier],
    ) -> Option<Version> {
        let guard = MajorVersionGuard::new(self.settings.first_party.clone());
        let spec = runner_spec(requests, self.settings.next, &guard, &self.current);
        let request = match PackageIdentifier::parse(&format!("{self_package}@{spec}")) {
            Ok(request) => request,
            Err(e) => {
                warn!("skipping version check: {e}");
                return None;
            }
        };

        let metadata = match self.cache.fetch(self_package).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("skipping version check: {e}");
                return None;
            }
        };
        let resolved = match VersionResolver::new().resolve(&request, &metadata) {
            Ok(snapshot) => snapshot.version.clone(),
            Err(e) => {
                warn!("skipping version check: {e}");
                return None;
            }
        };

        debug!("runner version for {request}: {resolved} (running {})", self.current);
        if cmp_precedence(&resolved, &self.current).is_eq() {
            None
        } else {
            Some(resolved)
        }
    }

    /// Run the version check; re-executes when another version should run
    pub async fn check(&self, requests: &[PackageIdentifier]) -> Result<VersionCheck, AppError> {
        let Some(self_package) = self.settings.self_package.as_deref() else {
            return Ok(VersionCheck::Current);
        };
        if !self.settings.version_check {
            debug!("version check disabled");
            return Ok(VersionCheck::Current);
        }

        let Some(version) = self.target_version(self_package, requests).await else {
            return Ok(VersionCheck::Current);
        };

        info!("Using package manager to install {self_package}@{version} temporarily.");
        let code = self.reexec(self_package, &version)?;
        Ok(VersionCheck::Reexecuted(code))
    }

    fn reexec(&self, self_package: &str, version: &Version) -> Result<i32, InstallError> {
        let prefix = scratch_dir();
        fs::create_dir_all(&prefix).map_err(|e| InstallError::Spawn {
            command: format!("mkdir {}", prefix.display()),
            message: e.to_string(),
        })?;

        let result = self.install_and_run(self_package, version, &prefix);
        if let Err(e) = fs::remove_dir_all(&prefix) {
            debug!("failed to remove {}: {e}", prefix.display());
        }
        result
    }

    fn install_and_run(
        &self,
        self_package: &str,
        version: &Version,
        prefix: &Path,
    ) -> Result<i32, InstallError> {
        self.installer
            .install_into(&format!("{self_package}@{version}"), prefix)?;

        let binary = prefix
            .join("node_modules")
            .join(".bin")
            .join(&self.settings.self_binary);
        if !binary.exists() {
            return Err(InstallError::Exec {
                binary,
                message: "binary not found after install".to_string(),
            });
        }

        let status = Command::new(&binary)
            .args(&self.settings.args)
            .current_dir(&self.settings.root)
            .env(DISABLE_VERSION_CHECK_ENV, "true")
            .status()
            .map_err(|e| InstallError::Exec {
                binary: binary.clone(),
                message: e.to_string(),
            })?;
        Ok(status.code().unwrap_or(1))
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("depmigrate-runner-{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests(raw: &[&str]) -> Vec<PackageIdentifier> {
        raw.iter()
            .map(|r| PackageIdentifier::parse(r).unwrap())
            .collect()
    }

    #[test]
    fn test_runner_spec_next() {
        let guard = MajorVersionGuard::default();
        let spec = runner_spec(&requests(&["@angular/core@13"]), true, &guard, &Version::new(12, 0, 0));
        assert_eq!(spec, "next");
    }

    #[test]
    fn test_runner_spec_first_party_major() {
        let guard = MajorVersionGuard::default();
        let spec = runner_spec(
            &requests(&["rxjs@7", "@angular/core@13.1", "@angular/cli@14"]),
            false,
            &guard,
            &Version::new(12, 0, 0),
        );
        assert_eq!(spec, "13");
    }

    #[test]
    fn test_runner_spec_first_party_without_version() {
        let guard = MajorVersionGuard::default();
        let current = Version::new(12, 0, 0);
        assert_eq!(
            runner_spec(&requests(&["@angular/core"]), false, &guard, &current),
            "latest"
        );
        assert_eq!(
            runner_spec(&requests(&["@angular/core@beta"]), false, &guard, &current),
            "latest"
        );
    }

    #[test]
    fn test_runner_spec_defaults_to_current_major() {
        let guard = MajorVersionGuard::default();
        let spec = runner_spec(&requests(&["rxjs@7"]), false, &guard, &Version::new(4, 2, 1));
        assert_eq!(spec, "4");
    }
}
