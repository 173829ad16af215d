//! Update orchestrator for coordinating the entire update workflow
//!
//! Update flow:
//! parse requests → clean-tree check → self-version check → load graph →
//! resolve batch → major-version guard → peer validation → rewrite manifest →
//! reinstall → optional commit → migrations of every updated package.
//!
//! With no requested packages the run ends after loading the graph with a
//! status report. `--migrate-only` skips resolution and runs migrations of
//! one installed package.

use crate::config::Settings;
use crate::domain::{PackageIdentifier, PackageManifest, UpdatePlan};
use crate::error::{AppError, MigrationError, RequestError, VcsError};
use crate::migration::{
    find_named, plan_range, report_optional, ExecutionReport, MigrationCollection,
    MigrationExecutor, MigrationRunner, MigrationUnitDescription, ProcessMigrationRunner,
};
use crate::package_manager::{Installer, SystemInstaller};
use crate::progress::Progress;
use crate::registry::{HttpClient, MetadataCache, NpmAdapter, RegistryAdapter};
use crate::self_update::{SelfUpdater, VersionCheck};
use crate::update::{
    collect_status, resolve_batch, MajorVersionGuard, PeerDependencyValidator, RangeRules,
    StatusReport, VersionResolver,
};
use crate::vcs::{GitAgent, VersionControl};
use crate::version::{coerce_version, parse_version};
use crate::workspace::{
    apply_plan, check_in_package, load_dependency_graph, resolve_first, DependencyGraph,
    NodeModulesLookup, PackageLocal, Resolution, MANIFEST_FILE,
};
use colored::Colorize;
use semver::Version;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// External systems the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn RegistryAdapter>,
    pub runner: Arc<dyn MigrationRunner>,
    pub vcs: Arc<dyn VersionControl>,
    pub installer: Arc<dyn Installer>,
}

impl Collaborators {
    /// Real registry, child-process runner, git and package manager
    pub fn system(settings: &Settings) -> Result<Self, AppError> {
        let client = HttpClient::new()?;
        Ok(Self {
            registry: Arc::new(NpmAdapter::with_registry(client, &settings.registry)),
            runner: Arc::new(ProcessMigrationRunner::new(settings.migration_runner.clone())),
            vcs: Arc::new(GitAgent::new()),
            installer: Arc::new(SystemInstaller::new().with_registry(&settings.registry)),
        })
    }
}

/// What a run did
#[derive(Debug)]
pub enum RunReport {
    /// Nothing was requested; the packages that could be updated
    Status(StatusReport),
    /// Manifest update followed by migrations
    Updated {
        plan: UpdatePlan,
        up_to_date: Vec<String>,
        migrations: ExecutionReport,
    },
    /// `--migrate-only`
    Migrated(ExecutionReport),
    /// Another build of the tool ran instead and exited with this code
    Reexecuted(i32),
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunReport::Reexecuted(code) => u8::try_from(*code).unwrap_or(1),
            _ => 0,
        }
    }
}

/// Orchestrator for coordinating the update workflow
pub struct Orchestrator {
    settings: Settings,
    collaborators: Collaborators,
    cache: Arc<MetadataCache>,
}

impl Orchestrator {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let cache = Arc::new(MetadataCache::with_concurrency(
            Arc::clone(&collaborators.registry),
            settings.concurrency,
        ));
        Self {
            settings,
            collaborators,
            cache,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the workflow
    pub async fn run(&self) -> Result<RunReport, AppError> {
        let requests = self.parse_requests()?;
        self.ensure_clean()?;

        let updater = SelfUpdater::new(
            &self.settings,
            &self.cache,
            self.collaborators.installer.as_ref(),
        );
        if let VersionCheck::Reexecuted(code) = updater.check(&requests).await? {
            return Ok(RunReport::Reexecuted(code));
        }

        if self.settings.migrate_only {
            return self.migrate_only(requests).await;
        }

        let graph = load_dependency_graph(&self.settings.root)?;
        if requests.is_empty() {
            return Ok(RunReport::Status(self.status(&graph).await));
        }
        self.update(requests, &graph).await
    }

    /// Parse request tokens, rejecting duplicates and non-registry specs
    pub fn parse_requests(&self) -> Result<Vec<PackageIdentifier>, RequestError> {
        let mut seen = BTreeSet::new();
        let mut requests = Vec::new();
        for raw in &self.settings.packages {
            let mut request = PackageIdentifier::parse(raw)?;
            if !request.registry {
                return Err(RequestError::NotRegistry { raw: raw.clone() });
            }
            if !seen.insert(request.name.clone()) {
                return Err(RequestError::DuplicatePackage { name: request.name });
            }
            if self.settings.next {
                request = request.prefer_next();
            }
            requests.push(request);
        }
        Ok(requests)
    }

    fn ensure_clean(&self) -> Result<(), AppError> {
        if self.settings.allow_dirty {
            return Ok(());
        }
        match self.collaborators.vcs.is_clean(&self.settings.root) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RequestError::DirtyWorkspace.into()),
            Err(VcsError::Spawn { message, .. }) => {
                debug!("git unavailable ({message}), skipping clean check");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn status(&self, graph: &DependencyGraph) -> StatusReport {
        let guard = MajorVersionGuard::new(self.settings.first_party.clone());
        let mut progress = Progress::new(!self.settings.verbose);
        progress.spinner("Collecting installed dependencies...");
        let report = collect_status(graph, &self.cache, &guard, self.settings.next).await;
        progress.finish_and_clear();

        println!("{}", report.render());
        report
    }

    async fn update(
        &self,
        requests: Vec<PackageIdentifier>,
        graph: &DependencyGraph,
    ) -> Result<RunReport, AppError> {
        let mut progress = Progress::new(!self.settings.verbose);
        progress.spinner("Fetching dependency metadata from registry...");
        let batch = resolve_batch(requests, graph, &self.cache, &VersionResolver::new()).await;
        progress.finish_and_clear();
        let batch = batch?;

        if batch.is_empty() {
            println!("{}", "Nothing to be done.".green());
            return Ok(RunReport::Updated {
                plan: UpdatePlan::new(),
                up_to_date: batch.up_to_date,
                migrations: ExecutionReport::default(),
            });
        }

        let guard = MajorVersionGuard::new(self.settings.first_party.clone());
        for entry in &batch.entries {
            guard.check(
                &entry.request.name,
                &entry.installed.to_string(),
                &entry.target.version.to_string(),
            )?;
        }

        let validator = PeerDependencyValidator::new(
            RangeRules::with_compat_guarantee(self.settings.compat_guarantee.clone()),
            self.settings.peer_ignore.clone(),
        )
        .include_prerelease(self.settings.next);
        validator
            .validate(graph, &batch.targets())
            .enforce(self.settings.force)?;

        let plan = batch.plan();
        for entry in plan.entries() {
            println!(
                "  {} {} {} -> {}",
                "UPDATE".cyan(),
                entry.name,
                entry.installed,
                entry.target.to_string().green()
            );
        }
        apply_plan(&self.settings.root, &plan)?;

        if self.settings.install {
            let result = self.collaborators.installer.install(&self.settings.root)?;
            if !result.is_skipped() {
                println!("{} Packages installed successfully.", "✔".green());
            }
        }

        if self.settings.create_commits {
            self.commit(&plan.commit_message())?;
        }

        let migrations = self.run_plan_migrations(&plan, graph).await?;
        Ok(RunReport::Updated {
            plan,
            up_to_date: batch.up_to_date,
            migrations,
        })
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        let root = &self.settings.root;
        let vcs = &self.collaborators.vcs;
        if !vcs.has_changes_to_commit(root)? {
            info!("no changes to commit");
            return Ok(());
        }
        let hash = vcs
            .commit(root, message)
            .map_err(|e| VcsError::CommitFailed {
                message: message.lines().next().unwrap_or_default().to_string(),
                reason: e.to_string(),
            })?;
        println!("  Committed update ({})", hash.yellow());
        Ok(())
    }

    /// Run range migrations of every plan entry that declares a collection
    async fn run_plan_migrations(
        &self,
        plan: &UpdatePlan,
        graph: &DependencyGraph,
    ) -> Result<ExecutionReport, AppError> {
        let mut report = ExecutionReport::default();
        for entry in plan.with_migrations() {
            let Some(migrations) = entry.migrations.as_deref() else {
                continue;
            };
            let package_dir = graph
                .get(&entry.name)
                .map(|node| node.install_path.clone())
                .ok_or_else(|| RequestError::NotInstalled {
                    name: entry.name.clone(),
                })?;
            let collection = locate_collection(&entry.name, &package_dir, migrations)?;
            let executed = self
                .run_range(&entry.name, &collection, &entry.installed, &entry.target)
                .await?;
            report.merge(executed);
        }
        Ok(report)
    }

    async fn run_range(
        &self,
        package: &str,
        collection: &MigrationCollection,
        from: &Version,
        to: &Version,
    ) -> Result<ExecutionReport, AppError> {
        let range = plan_range(collection, from, to);
        if range.required.is_empty() {
            info!("No migrations to execute for {package} ({from} -> {to}).");
        }
        let report = self.execute(package, &range.required).await?;
        report_optional(package, &range.optional);
        Ok(report)
    }

    async fn execute(
        &self,
        package: &str,
        units: &[MigrationUnitDescription],
    ) -> Result<ExecutionReport, AppError> {
        let mut executor =
            MigrationExecutor::new(self.collaborators.runner.as_ref(), &self.settings.root)
                .with_log_file(self.settings.log_file.clone());
        if self.settings.create_commits {
            executor = executor.with_commits(self.collaborators.vcs.as_ref());
        }
        executor.execute(package, units).await
    }

    async fn migrate_only(
        &self,
        requests: Vec<PackageIdentifier>,
    ) -> Result<RunReport, AppError> {
        let [request] = <[PackageIdentifier; 1]>::try_from(requests)
            .map_err(|_| RequestError::SinglePackageRequired)?;
        if request.has_explicit_spec() {
            warn!("Package specifier has no effect when using the 'migrate-only' option.");
        }

        let (package_dir, manifest) = locate_installed(&self.settings.root, &request.name)?;
        let parsed = manifest.update_metadata();
        parsed.log_diagnostics();
        let migrations = parsed
            .metadata
            .migrations
            .ok_or_else(|| MigrationError::NoMigrations {
                package: request.name.clone(),
            })?;
        let collection = locate_collection(&request.name, &package_dir, &migrations)?;

        if let Some(name) = &self.settings.name {
            let unit = find_named(&collection, name)?.clone();
            let report = self.execute(&request.name, &[unit]).await?;
            return Ok(RunReport::Migrated(report));
        }

        let from_raw = self.settings.from.as_deref().ok_or(RequestError::MissingFrom)?;
        let from = coerce_version(from_raw).ok_or_else(|| RequestError::InvalidFrom {
            value: from_raw.to_string(),
        })?;
        let to = match self.settings.to.as_deref() {
            Some(raw) => coerce_version(raw).ok_or_else(|| RequestError::InvalidTo {
                value: raw.to_string(),
            })?,
            None => parse_version(&manifest.version)
                .or_else(|| coerce_version(&manifest.version))
                .ok_or_else(|| RequestError::InvalidTo {
                    value: manifest.version.clone(),
                })?,
        };

        let report = self.run_range(&request.name, &collection, &from, &to).await?;
        Ok(RunReport::Migrated(report))
    }
}

/// Installed directory and manifest of a package, direct or transitive
fn locate_installed(root: &Path, name: &str) -> Result<(PathBuf, PackageManifest), AppError> {
    let lookup = NodeModulesLookup::new(root);
    let not_installed = || RequestError::NotInstalled {
        name: name.to_string(),
    };
    let manifest_path = match resolve_first(&[&lookup], &format!("{name}/{MANIFEST_FILE}")) {
        Resolution::Found(path) => path,
        Resolution::NotFound => return Err(not_installed().into()),
        Resolution::Error(reason) => {
            debug!("cannot resolve {name}: {reason}");
            return Err(not_installed().into());
        }
    };
    let content = fs::read_to_string(&manifest_path).map_err(|_| not_installed())?;
    let manifest = PackageManifest::from_json(&content).map_err(|_| not_installed())?;
    let dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((dir, manifest))
}

/// Load the migrations collection a package declares.
///
/// The path must stay inside the package. It is resolved relative to the
/// package first, then as a module request from the package directory.
pub fn locate_collection(
    package: &str,
    package_dir: &Path,
    migrations: &str,
) -> Result<MigrationCollection, AppError> {
    check_in_package(migrations).map_err(|reason| RequestError::InvalidMigrationsPath {
        package: package.to_string(),
        reason,
    })?;

    let local = PackageLocal::new(package_dir);
    let modules = NodeModulesLookup::new(package_dir);
    let path = match resolve_first(&[&local, &modules], migrations) {
        Resolution::Found(path) => path,
        Resolution::NotFound => {
            return Err(MigrationError::CollectionNotFound {
                package: package.to_string(),
                reason: format!("'{migrations}' does not exist"),
            }
            .into())
        }
        Resolution::Error(reason) => {
            return Err(MigrationError::CollectionNotFound {
                package: package.to_string(),
                reason,
            }
            .into())
        }
    };
    debug!("migrations of {package}: {}", path.display());
    Ok(MigrationCollection::load(&path)?)
}
