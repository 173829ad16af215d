//! CLI argument parsing module for depmigrate

use clap::Parser;
use std::path::PathBuf;

/// Updates workspace dependencies and runs the migrations they ship
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "depmigrate",
    version,
    about = "Updates workspace dependencies and runs the migrations they ship"
)]
pub struct CliArgs {
    /// Packages to update, as `name[@version|@tag]` (comma-separated or repeated)
    #[arg(value_delimiter = ',')]
    pub packages: Vec<String>,

    /// Ignore peer dependency mismatches
    #[arg(long)]
    pub force: bool,

    /// Use the `next` dist-tag and include pre-releases
    #[arg(long)]
    pub next: bool,

    /// Only run migrations of an already installed package
    #[arg(long)]
    pub migrate_only: bool,

    /// Run a single migration by name (with --migrate-only)
    #[arg(long, requires = "migrate_only", conflicts_with_all = ["from", "to"])]
    pub name: Option<String>,

    /// Version to migrate from (with --migrate-only)
    #[arg(long, requires = "migrate_only")]
    pub from: Option<String>,

    /// Version to migrate to; defaults to the installed version (with --migrate-only)
    #[arg(long, requires = "migrate_only")]
    pub to: Option<String>,

    /// Allow running with uncommitted changes
    #[arg(long)]
    pub allow_dirty: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Commit the update and every migration step
    #[arg(long)]
    pub create_commits: bool,

    /// Workspace root
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Registry URL overriding config and environment
    #[arg(long)]
    pub registry: Option<String>,
}

impl CliArgs {
    /// Arguments as given, for re-executing another build
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.packages.clone();
        let flags = [
            (self.force, "--force"),
            (self.next, "--next"),
            (self.migrate_only, "--migrate-only"),
            (self.allow_dirty, "--allow-dirty"),
            (self.verbose, "--verbose"),
            (self.create_commits, "--create-commits"),
        ];
        args.extend(
            flags
                .into_iter()
                .filter(|(set, _)| *set)
                .map(|(_, flag)| flag.to_string()),
        );
        let options = [
            ("--name", &self.name),
            ("--from", &self.from),
            ("--to", &self.to),
            ("--registry", &self.registry),
        ];
        for (flag, value) in options {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args.push("--path".to_string());
        args.push(self.path.display().to_string());
        args
    }
}
