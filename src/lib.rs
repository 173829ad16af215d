//! depmigrate - workspace dependency updater library
//!
//! Updates npm-style dependencies of a workspace and runs the migrations
//! that updated packages ship for the versions crossed:
//! - Target resolution against the registry, with group and peer expansion
//! - Major version and peer dependency safety checks
//! - In-place manifest rewrites followed by a reinstall
//! - Sequential migration execution with optional per-step commits

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod migration;
pub mod orchestrator;
pub mod package_manager;
pub mod progress;
pub mod registry;
pub mod self_update;
pub mod update;
pub mod vcs;
pub mod version;
pub mod workspace;
