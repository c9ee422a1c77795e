use anyhow::Result;
use chrono::{Local, TimeZone};
use colored::Colorize;
use std::path::PathBuf;

use crate::gamelog::discovery::LogDiscovery;
use crate::store::Store;

/// Print the log directories in use and every log file found in them.
pub fn list_sources(store: &Store, directories: Vec<PathBuf>, json: bool) -> Result<()> {
    let directories = if directories.is_empty() {
        store.game_log_directories()
    } else {
        directories
    };
    let sources = LogDiscovery::new().find_sources(&directories, None, None);

    if json {
        let output = serde_json::json!({
            "directories": directories,
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Game log directories".bold());
    if directories.is_empty() {
        println!("  {}", "none configured and no default directory exists".yellow());
    }
    for directory in &directories {
        let marker = if directory.is_dir() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {}", marker, directory.display());
    }

    println!();
    println!("{} ({})", "Log files".bold(), sources.len());
    for source in &sources {
        let modified = Local
            .timestamp_millis_opt(source.last_modified_ms)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let kind = if source.is_compressed() {
            "history".dimmed()
        } else {
            "plain".normal()
        };
        println!("  {}  {:>7}  {}", modified.bright_white(), kind, source.path.display());
    }
    Ok(())
}
