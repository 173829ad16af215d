//! Configuration
//!
//! An optional `depmigrate.toml` at the workspace root supplies defaults;
//! command line flags take precedence. [`Settings`] is the resolved result.
//!
//! ```toml
//! registry = "https://registry.example.com"
//! install = false
//! first-party-pattern = "^@acme/"
//! compat-guarantee = ["@acme/core"]
//! migration-runner = ["node", "--enable-source-maps"]
//! ```

use crate::cli::CliArgs;
use crate::error::ConfigError;
use crate::migration::DEFAULT_RUNNER_COMMAND;
use crate::registry::{DEFAULT_CONCURRENCY, DEFAULT_REGISTRY_URL};
use crate::update::{DEFAULT_FIRST_PARTY_PATTERN, DEFAULT_PEER_IGNORE};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the workspace root
pub const CONFIG_FILE: &str = "depmigrate.toml";

/// Registry URL taken from the environment when nothing else is set
pub const REGISTRY_ENV: &str = "NPM_CONFIG_REGISTRY";

/// Set to skip the self-version check
pub const DISABLE_VERSION_CHECK_ENV: &str = "DEPMIGRATE_DISABLE_VERSION_CHECK";

/// Package that gets the major compatibility rule by default
const DEFAULT_COMPAT_GUARANTEE: &str = "@angular/core";

/// Binary name used when re-executing another build
const DEFAULT_SELF_BINARY: &str = "depmigrate";

/// Contents of `depmigrate.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub registry: Option<String>,
    pub install: Option<bool>,
    pub first_party_pattern: Option<String>,
    pub compat_guarantee: Option<Vec<String>>,
    pub peer_ignore: Option<Vec<String>>,
    pub migration_runner: Option<Vec<String>>,
    pub self_package: Option<String>,
    pub self_binary: Option<String>,
    pub concurrency: Option<usize>,
}

impl FileConfig {
    /// Parse config content; `path` is only used in errors
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `depmigrate.toml` from `root`; a missing file yields defaults
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        debug!("loading config from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&path, &content)
    }
}

/// Values read from the process environment
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub registry: Option<String>,
    pub version_check_disabled: bool,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            registry: std::env::var(REGISTRY_ENV).ok().filter(|v| !v.is_empty()),
            version_check_disabled: std::env::var_os(DISABLE_VERSION_CHECK_ENV).is_some(),
        }
    }
}

/// Resolved configuration of one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub packages: Vec<String>,
    pub force: bool,
    pub next: bool,
    pub migrate_only: bool,
    pub name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub allow_dirty: bool,
    pub verbose: bool,
    pub create_commits: bool,
    pub registry: String,
    pub install: bool,
    pub first_party: Regex,
    pub compat_guarantee: Vec<String>,
    pub peer_ignore: Vec<String>,
    pub migration_runner: Vec<String>,
    pub self_package: Option<String>,
    pub self_binary: String,
    pub concurrency: usize,
    pub version_check: bool,
    /// Arguments replayed when another build is re-executed
    pub args: Vec<String>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Resolve CLI arguments against the workspace config and the environment
    pub fn load(args: CliArgs) -> Result<Self, ConfigError> {
        let file = FileConfig::load(&args.path)?;
        Self::resolve(args, file, Environment::from_process())
    }

    pub fn resolve(args: CliArgs, file: FileConfig, env: Environment) -> Result<Self, ConfigError> {
        let root = args
            .path
            .canonicalize()
            .map_err(|e| ConfigError::InvalidPath {
                path: args.path.clone(),
                message: e.to_string(),
            })?;
        if !root.is_dir() {
            return Err(ConfigError::InvalidPath {
                path: args.path.clone(),
                message: "not a directory".to_string(),
            });
        }

        let pattern = file
            .first_party_pattern
            .unwrap_or_else(|| DEFAULT_FIRST_PARTY_PATTERN.to_string());
        let first_party = Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        let registry = args
            .registry
            .clone()
            .or(file.registry)
            .or(env.registry)
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());

        let migration_runner = file
            .migration_runner
            .filter(|cmd| !cmd.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_RUNNER_COMMAND.to_string()]);

        Ok(Self {
            root,
            args: args.to_args(),
            packages: args.packages,
            force: args.force,
            next: args.next,
            migrate_only: args.migrate_only,
            name: args.name,
            from: args.from,
            to: args.to,
            allow_dirty: args.allow_dirty,
            verbose: args.verbose,
            create_commits: args.create_commits,
            registry,
            install: file.install.unwrap_or(true),
            first_party,
            compat_guarantee: file
                .compat_guarantee
                .unwrap_or_else(|| vec![DEFAULT_COMPAT_GUARANTEE.to_string()]),
            peer_ignore: file
                .peer_ignore
                .unwrap_or_else(|| DEFAULT_PEER_IGNORE.iter().map(|s| s.to_string()).collect()),
            migration_runner,
            self_package: file.self_package,
            self_binary: file
                .self_binary
                .unwrap_or_else(|| DEFAULT_SELF_BINARY.to_string()),
            concurrency: file.concurrency.filter(|c| *c > 0).unwrap_or(DEFAULT_CONCURRENCY),
            version_check: !env.version_check_disabled,
            log_file: None,
        })
    }

    /// Record the detailed log file of this run
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }
}
