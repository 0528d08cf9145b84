//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "app": { "defaultFilter": "active", "collection": "tasks", "eventLog": true }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::TaskFilter;
use crate::services::DEFAULT_COLLECTION;

const SETTINGS_FILENAME: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_log: Option<bool>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Taskline configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Filter a new task list starts with
    pub default_filter: TaskFilter,
    /// Document store collection holding tasks
    pub collection: String,
    /// Whether commands are recorded in logs.duckdb
    pub event_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_filter: TaskFilter::All,
            collection: DEFAULT_COLLECTION.to_string(),
            event_log: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

fn parse_filter(value: &str) -> Option<TaskFilter> {
    match value.parse() {
        Ok(filter) => Some(filter),
        Err(e) => {
            tracing::warn!(value, error = %e, "ignoring invalid default filter");
            None
        }
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILENAME);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable settings.json, using defaults");
        SettingsFile::default()
    }))
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides (for CI/testing):
    /// `TASKLINE_DEFAULT_FILTER`, `TASKLINE_EVENT_LOG`
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        Ok(Self::resolve(&raw, |key| std::env::var(key).ok()))
    }

    fn resolve(raw: &SettingsFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_filter = env("TASKLINE_DEFAULT_FILTER")
            .as_deref()
            .and_then(parse_filter)
            .or_else(|| raw.app.default_filter.as_deref().and_then(parse_filter))
            .unwrap_or(defaults.default_filter);

        let event_log = env("TASKLINE_EVENT_LOG")
            .as_deref()
            .and_then(parse_bool)
            .or(raw.app.event_log)
            .unwrap_or(defaults.event_log);

        let collection = raw
            .app
            .collection
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(defaults.collection);

        Self {
            default_filter,
            collection,
            event_log,
        }
    }

    /// Keys accepted by [`Config::set`]
    pub const KEYS: [&'static str; 3] = ["default-filter", "collection", "event-log"];

    /// Change one setting from its command-line spelling
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "default-filter" => {
                self.default_filter = value.parse()?;
            }
            "collection" => {
                if value.trim().is_empty() {
                    bail!("collection must not be empty");
                }
                self.collection = value.trim().to_string();
            }
            "event-log" => {
                self.event_log = parse_bool(value)
                    .ok_or_else(|| anyhow!("expected true or false, got '{}'", value))?;
            }
            other => bail!(
                "unknown setting '{}' (expected one of: {})",
                other,
                Self::KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save config to the data directory, preserving settings we don't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILENAME);
        let mut settings = read_settings(data_dir)?;

        settings.app.default_filter = Some(self.default_filter.to_string());
        settings.app.collection = Some(self.collection.clone());
        settings.app.event_log = Some(self.event_log);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }
}
