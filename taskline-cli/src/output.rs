//! Output formatting utilities

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde::Serialize;

/// Length of the id prefix shown to users
const SHORT_ID_LEN: usize = 8;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message to stderr
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print a hint line, dimmed
pub fn hint(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Abbreviated task id for display
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Checkbox column for a task
pub fn status_mark(completed: bool) -> String {
    if completed {
        "✓".green().to_string()
    } else {
        "·".dimmed().to_string()
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
