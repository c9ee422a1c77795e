use crate::models::GameLogSource;
use chrono::{DateTime, Utc};
use glob::{glob, Pattern};
use std::collections::HashSet;
use std::fs::metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Plain logs and gzip-rotated history.
const LOG_PATTERNS: [&str; 2] = ["*.log", "*.log.gz"];

/// Handles file system traversal and discovery of game log files
#[derive(Debug, Default, Clone)]
pub struct LogDiscovery;

impl LogDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// Platform locations where vanilla and Lunar Client write their logs.
    ///
    /// Only directories that currently exist are returned.
    pub fn default_directories() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(
                home.join("Library")
                    .join("Application Support")
                    .join("minecraft")
                    .join("logs"),
            );
            candidates.push(home.join(".minecraft").join("logs"));
            candidates.push(home.join(".lunarclient").join("logs").join("game"));
        }
        if let Some(roaming) = dirs::config_dir() {
            candidates.push(roaming.join(".minecraft").join("logs"));
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|dir| dir.is_dir())
            .filter(|dir| seen.insert(dir.clone()))
            .collect()
    }

    /// Find every log in `directories`, filtered to the modification window
    /// and sorted oldest first.
    pub fn find_sources(
        &self,
        directories: &[PathBuf],
        since: Option<&DateTime<Utc>>,
        until: Option<&DateTime<Utc>>,
    ) -> Vec<GameLogSource> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for directory in directories {
            if !directory.is_dir() {
                warn!(directory = %directory.display(), "Skipping missing game log directory");
                continue;
            }

            let escaped = PathBuf::from(Pattern::escape(&directory.to_string_lossy()));
            for pattern in LOG_PATTERNS {
                let pattern = escaped.join(pattern);
                let entries = match glob(&pattern.to_string_lossy()) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(pattern = %pattern.display(), error = %e, "Invalid log glob pattern");
                        continue;
                    }
                };

                for entry in entries {
                    let path = match entry {
                        Ok(path) => path,
                        Err(e) => {
                            warn!(error = %e, "Failed to read game log directory entry");
                            continue;
                        }
                    };
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    match Self::modified_ms(&path) {
                        Some(last_modified_ms) => sources.push(GameLogSource {
                            path,
                            last_modified_ms,
                        }),
                        None => debug!(path = %path.display(), "Skipping log without modification time"),
                    }
                }
            }
        }

        sources.retain(|source| Self::within_window(source, since, until));
        sources.sort_by(|a, b| {
            a.last_modified_ms
                .cmp(&b.last_modified_ms)
                .then_with(|| a.path.cmp(&b.path))
        });
        sources
    }

    fn within_window(
        source: &GameLogSource,
        since: Option<&DateTime<Utc>>,
        until: Option<&DateTime<Utc>>,
    ) -> bool {
        if let Some(since) = since {
            if source.last_modified_ms < since.timestamp_millis() {
                return false;
            }
        }
        if let Some(until) = until {
            if source.last_modified_ms > until.timestamp_millis() {
                return false;
            }
        }
        true
    }

    fn modified_ms(path: &Path) -> Option<i64> {
        let modified = metadata(path).ok()?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        Some(since_epoch.as_millis() as i64)
    }
}
