//! CLI command implementations

pub mod auth;
pub mod config;
pub mod logs;
pub mod task;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use taskline_core::config::Config;
use taskline_core::services::{EntryPoint, LogEvent, LoggingService};
use taskline_core::TasklineContext;

/// Open the event log in `taskline_dir`
///
/// Returns None when the event log is disabled or fails to initialize
/// (logging should never block a command)
fn open_logger(taskline_dir: &Path) -> Option<LoggingService> {
    std::fs::create_dir_all(taskline_dir).ok()?;
    let config = Config::load(taskline_dir).unwrap_or_default();
    if !config.event_log {
        return None;
    }
    LoggingService::new(taskline_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Record an event in `taskline_dir`'s event log, ignoring any errors.
///
/// The log database is closed again before returning, so no connection
/// to logs.duckdb outlives the call.
pub fn record_in(taskline_dir: &Path, event: LogEvent) {
    let Some(logger) = open_logger(taskline_dir) else {
        return;
    };
    if let Err(e) = logger.log(event) {
        tracing::debug!(error = %e, "failed to write event log");
    }
}

/// Record an event in the default data directory's event log
pub fn record(event: LogEvent) {
    if let Ok(taskline_dir) = get_taskline_dir() {
        record_in(&taskline_dir, event);
    }
}

/// Get the taskline directory from environment or default
pub fn get_taskline_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKLINE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".taskline"))
        .ok_or_else(|| anyhow!("Could not find home directory; set TASKLINE_DIR"))
}

/// Open the taskline context for the data directory
pub fn get_context() -> Result<TasklineContext> {
    let taskline_dir = get_taskline_dir()?;
    TasklineContext::new(&taskline_dir).context("Failed to initialize taskline context")
}
