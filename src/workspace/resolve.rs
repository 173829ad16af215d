//! Ordered module resolution
//!
//! A request is tried against each strategy in turn; the first `Found`
//! wins. `NotFound` moves on to the next strategy, `Error` is remembered and
//! reported only if no later strategy finds the request.

use std::path::{Component, Path, PathBuf};

/// Outcome of one resolution strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    NotFound,
    Error(String),
}

/// A way of turning a request into a file on disk
pub trait ResolveStrategy {
    fn resolve(&self, request: &str) -> Resolution;
}

/// Looks for `node_modules/<request>` in `start` and every ancestor
pub struct NodeModulesLookup {
    start: PathBuf,
}

impl NodeModulesLookup {
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
        }
    }
}

impl ResolveStrategy for NodeModulesLookup {
    fn resolve(&self, request: &str) -> Resolution {
        if request.is_empty() || Path::new(request).is_absolute() {
            return Resolution::Error(format!("'{request}' is not a module request"));
        }

        for dir in self.start.ancestors() {
            let candidate = dir.join("node_modules").join(request);
            if candidate.is_file() {
                return Resolution::Found(candidate);
            }
        }
        Resolution::NotFound
    }
}

/// Resolves a path relative to a package directory, never leaving it
pub struct PackageLocal {
    package_dir: PathBuf,
}

impl PackageLocal {
    pub fn new(package_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_dir: package_dir.into(),
        }
    }
}

impl ResolveStrategy for PackageLocal {
    fn resolve(&self, request: &str) -> Resolution {
        if let Err(reason) = check_in_package(request) {
            return Resolution::Error(reason);
        }
        let candidate = self.package_dir.join(request);
        if candidate.is_file() {
            Resolution::Found(candidate)
        } else {
            Resolution::NotFound
        }
    }
}

/// Reject absolute paths and paths that climb out of their package
pub fn check_in_package(request: &str) -> Result<(), String> {
    let path = Path::new(request);
    if path.is_absolute() || request.starts_with('/') || request.starts_with('\\') {
        return Err("absolute paths are not permitted".to_string());
    }

    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err("absolute paths are not permitted".to_string());
            }
        }
        if depth < 0 {
            return Err("paths outside the package are not permitted".to_string());
        }
    }
    Ok(())
}

/// Try each strategy in order
pub fn resolve_first(strategies: &[&dyn ResolveStrategy], request: &str) -> Resolution {
    let mut last_error = None;
    for strategy in strategies {
        match strategy.resolve(request) {
            Resolution::Found(path) => return Resolution::Found(path),
            Resolution::NotFound => {}
            Resolution::Error(reason) => last_error = Some(reason),
        }
    }
    match last_error {
        Some(reason) => Resolution::Error(reason),
        None => Resolution::NotFound,
    }
}
