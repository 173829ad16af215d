//! Migrations
//!
//! This module provides:
//! - Loading of migrations collections shipped by packages
//! - Selection of units by name or by version range
//! - The runner boundary and a child-process runner
//! - Sequential execution with optional per-unit commits

mod collection;
mod executor;
mod planner;
mod runner;

pub use collection::{MigrationCollection, MigrationUnitDescription};
pub use executor::{commit_message, report_optional, ExecutionReport, MigrationExecutor};
pub use planner::{find_named, in_range, plan_range, RangePlan};
pub use runner::{
    parse_touched, MigrationRunner, ProcessMigrationRunner, UnitOutcome, DEFAULT_RUNNER_COMMAND,
    TOUCH_PREFIX,
};
