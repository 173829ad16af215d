//! depmigrate - workspace dependency updater CLI tool
//!
//! Exit codes: 0 on success, 1 on failure, 2 when the repository has
//! uncommitted changes.

use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use depmigrate::cli::CliArgs;
use depmigrate::config::Settings;
use depmigrate::error::AppError;
use depmigrate::logging;
use depmigrate::orchestrator::{Collaborators, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let log_file = logging::init(args.verbose);
    match run(args, log_file).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{} {:#}", "✖".red(), e);
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

/// Main application logic
async fn run(args: CliArgs, log_file: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    debug!("depmigrate v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &log_file {
        debug!("detailed log: {}", path.display());
    }

    let settings = Settings::load(args)
        .map_err(AppError::from)?
        .with_log_file(log_file);
    let collaborators = Collaborators::system(&settings)?;
    let orchestrator = Orchestrator::new(settings, collaborators);

    let report = orchestrator.run().await?;
    Ok(ExitCode::from(report.exit_code()))
}
