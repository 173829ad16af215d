//! Application error types using thiserror
//!
//! Error hierarchy:
//! - RequestError: malformed or unsupported user input
//! - PolicyError: upgrade-safety and peer dependency violations
//! - ManifestError: workspace and package manifest problems
//! - RegistryError: package registry communication
//! - MigrationError: migration collections and unit execution
//! - VcsError: version-control status and commit failures
//! - InstallError: package manager invocations
//! - ConfigError: configuration file problems

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a run rejected because the repository has uncommitted changes
pub const EXIT_DIRTY_WORKSPACE: u8 = 2;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unsupported user input
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Upgrade policy violations
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Manifest file related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Package registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Migration related errors
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Version-control related errors
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Package manager related errors
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Request(RequestError::DirtyWorkspace) => EXIT_DIRTY_WORKSPACE,
            _ => 1,
        }
    }
}

/// Errors caused by user input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Token is not expressible as `name[@spec]`
    #[error("invalid package argument: '{raw}'")]
    MalformedPackage { raw: String },

    /// Spec does not resolve through a registry (path, git, tarball...)
    #[error("package '{raw}' is not a registry package identifier")]
    NotRegistry { raw: String },

    /// Same package requested twice
    #[error("duplicate package '{name}' specified")]
    DuplicatePackage { name: String },

    /// Requested package is not declared in the workspace manifest
    #[error("package '{name}' is not a dependency")]
    NotADependency { name: String },

    /// Package has no readable installed manifest
    #[error("package '{name}' is not installed")]
    NotInstalled { name: String },

    /// migrate-only takes exactly one package
    #[error("a single package must be specified when using the 'migrate-only' option")]
    SinglePackageRequired,

    /// A range of migrations was requested without `from`
    #[error("\"from\" is required when running migrations without '--name'")]
    MissingFrom,

    /// `from` cannot be coerced into a version
    #[error("\"from\" value [{value}] is not a valid version")]
    InvalidFrom { value: String },

    /// `to` cannot be coerced into a version
    #[error("\"to\" value [{value}] is not a valid version")]
    InvalidTo { value: String },

    /// Migrations field points outside the package
    #[error("package '{package}' contains an invalid migrations field: {reason}")]
    InvalidMigrationsPath { package: String, reason: String },

    /// Working tree has uncommitted changes
    #[error("repository is not clean, please commit or stash any changes before updating")]
    DirtyWorkspace,
}

/// Upgrade-safety policy violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Update would skip at least one major version
    #[error("{message}")]
    MajorVersionSkip {
        package: String,
        installed_major: u64,
        target_major: u64,
        message: String,
    },

    /// Peer dependency validation failed without --force
    #[error(
        "incompatible peer dependencies found ({count} conflict(s)); \
         use '--force' to ignore them and address the warnings later"
    )]
    PeerConflicts { count: usize },
}

/// Errors related to manifest file operations
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write manifest file
    #[error("failed to write manifest file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("failed to parse JSON in {path}: {message}")]
    JsonParseError { path: PathBuf, message: String },

    /// Dependency entry could not be rewritten
    #[error("could not update '{package}' in {path}: {message}")]
    UpdateFailed {
        path: PathBuf,
        package: String,
        message: String,
    },
}

/// Errors related to package registry communication
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// No version of the package matches the request
    #[error("package specified by '{request}' does not exist within the registry")]
    TargetNotFound { request: String },
}

/// Errors related to migration collections and execution
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Package does not declare a migrations collection
    #[error("package '{package}' does not provide migrations")]
    NoMigrations { package: String },

    /// Migrations collection could not be located
    #[error("migrations for package '{package}' were not found: {reason}")]
    CollectionNotFound { package: String, reason: String },

    /// Migrations collection could not be parsed
    #[error("failed to load migrations collection {path}: {message}")]
    InvalidCollection { path: PathBuf, message: String },

    /// Named unit does not exist in the collection
    #[error("cannot find migration '{name}' in '{collection}'")]
    UnitNotFound { name: String, collection: String },

    /// Unit has no entry point
    #[error("migration '{name}' does not declare a factory")]
    MissingFactory { name: String },

    /// The runner could not be started
    #[error("failed to start migration '{name}': {message}")]
    RunnerFailed { name: String, message: String },

    /// A unit reported failure; remaining units were not executed
    #[error(
        "migration '{name}' of package '{package}' failed; \
         the workspace may be partially migrated{}",
        log_hint(.log_file)
    )]
    UnitFailed {
        package: String,
        name: String,
        log_file: Option<PathBuf>,
    },
}

fn log_hint(log_file: &Option<PathBuf>) -> String {
    match log_file {
        Some(path) => format!(", see \"{}\" for further details", path.display()),
        None => String::new(),
    }
}

/// Errors related to version control
#[derive(Error, Debug)]
pub enum VcsError {
    /// Git could not be executed
    #[error("failed to execute git command '{command}': {message}")]
    Spawn { command: String, message: String },

    /// Git returned a non-zero status
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Commit of a completed step failed
    #[error("failed to commit update ({message}): {reason}")]
    CommitFailed { message: String, reason: String },
}

/// Errors related to package manager invocations
#[derive(Error, Debug)]
pub enum InstallError {
    /// The package manager could not be executed
    #[error("failed to execute '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The package manager returned a non-zero status
    #[error("'{command}' failed: {stderr}")]
    Failed { command: String, stderr: String },

    /// A freshly installed binary could not be found or started
    #[error("cannot run {binary}: {message}")]
    Exec { binary: PathBuf, message: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file is not valid TOML for the expected schema
    #[error("failed to parse config {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// Regex option does not compile
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Workspace path is unusable
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: PathBuf, message: String },
}

impl ManifestError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new JsonParseError
    pub fn json_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::JsonParseError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}
