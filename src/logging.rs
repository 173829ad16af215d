//! Tracing setup
//!
//! Two layers are installed: a compact stderr layer for the user and a
//! DEBUG-level file layer kept in the temp directory. The file is the
//! detailed log referenced when a migration fails.

use chrono::Local;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable overriding the stderr filter
pub const LOG_ENV: &str = "DEPMIGRATE_LOG";

/// Path of a new log file in the temp directory
pub fn log_file_path() -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    std::env::temp_dir().join(format!("depmigrate-{stamp}-{}.log", std::process::id()))
}

fn stderr_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber; returns the log file path when one was created
pub fn init(verbose: bool) -> Option<PathBuf> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(verbose));

    let path = log_file_path();
    let file_layer = match File::create(&path) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG),
        ),
        Err(e) => {
            eprintln!("warning: cannot create log file {}: {e}", path.display());
            None
        }
    };
    let path = file_layer.as_ref().map(|_| path);

    // a subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    path
}
