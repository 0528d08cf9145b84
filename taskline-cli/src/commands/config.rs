//! Config command - view and change settings.json

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use super::get_taskline_dir;
use crate::output;
use taskline_core::config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one setting (default-filter, collection, event-log)
    Set {
        key: String,
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn settings_json(config: &Config) -> serde_json::Value {
    json!({
        "default-filter": config.default_filter.to_string(),
        "collection": config.collection,
        "event-log": config.event_log,
    })
}

pub fn run(command: ConfigCommands) -> Result<()> {
    run_in(&get_taskline_dir()?, command)
}

/// Run a config subcommand against the settings in `taskline_dir`
pub fn run_in(taskline_dir: &Path, command: ConfigCommands) -> Result<()> {
    let mut config = Config::load(taskline_dir)?;
    match command {
        ConfigCommands::Show { json } => {
            if json {
                return output::print_json(&settings_json(&config));
            }
            println!("{:16}{}", "default-filter".dimmed(), config.default_filter);
            println!("{:16}{}", "collection".dimmed(), config.collection);
            println!("{:16}{}", "event-log".dimmed(), config.event_log);
        }
        ConfigCommands::Set { key, value, json } => {
            config.set(&key, &value)?;
            std::fs::create_dir_all(taskline_dir)?;
            config.save(taskline_dir)?;
            if json {
                output::print_json(&settings_json(&config))?;
            } else {
                output::success(&format!("{} updated", key));
            }
        }
    }
    Ok(())
}
