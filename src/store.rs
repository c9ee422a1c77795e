//! Persisted key/value store.
//!
//! A single JSON object on disk. Every `set` rewrites the file. Typed accessors
//! fall back to defaults when a key is absent and skip malformed list entries
//! instead of failing the whole read.

use crate::analytics::pattern::{
    compile_patterns, default_patterns, AnalyticsPattern, AnalyticsPatternConfig,
};
use crate::gamelog::discovery::LogDiscovery;
use crate::models::{GameInstall, Waypoint};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const GAME_LOG_DIRECTORIES: &str = "gameLogDirectories";
pub const ANALYTICS_PATTERNS: &str = "analyticsPatterns";
pub const GAME_INSTALLS: &str = "gameInstalls";
pub const WAYPOINTS: &str = "waypoints";

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Store {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let values = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => Map::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse store: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file not found, starting empty");
                Map::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read store: {}", path.display()))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .with_context(|| format!("Invalid value stored under '{key}'"))
            })
            .transpose()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize value for '{key}'"))?;
        self.values.insert(key.to_string(), value);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        fs::write(&temp, content)
            .with_context(|| format!("Failed to write store: {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace store: {}", self.path.display()))?;
        Ok(())
    }

    /// Deserialize each element of a stored list on its own, skipping bad ones.
    fn list<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        let items = match self.values.get(key)? {
            Value::Array(items) => items,
            _ => {
                warn!(key, "Stored value is not a list, ignoring it");
                return None;
            }
        };
        Some(
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!(key, index, error = %e, "Skipping malformed stored entry");
                        None
                    }
                })
                .collect(),
        )
    }

    pub fn game_log_directories(&self) -> Vec<PathBuf> {
        self.list(GAME_LOG_DIRECTORIES)
            .unwrap_or_else(LogDiscovery::default_directories)
    }

    pub fn set_game_log_directories(&mut self, directories: &[PathBuf]) -> Result<()> {
        self.set(GAME_LOG_DIRECTORIES, &directories)
    }

    pub fn analytics_pattern_configs(&self) -> Vec<AnalyticsPatternConfig> {
        self.list(ANALYTICS_PATTERNS).unwrap_or_else(default_patterns)
    }

    /// Compiled patterns. Entries that fail validation are skipped.
    pub fn analytics_patterns(&self) -> Vec<AnalyticsPattern> {
        compile_patterns(&self.analytics_pattern_configs())
    }

    pub fn set_analytics_patterns(&mut self, patterns: &[AnalyticsPatternConfig]) -> Result<()> {
        self.set(ANALYTICS_PATTERNS, &patterns)
    }

    pub fn game_installs(&self) -> Vec<GameInstall> {
        self.list(GAME_INSTALLS).unwrap_or_default()
    }

    /// Look an install up by uuid first, then by name.
    pub fn find_install(&self, name_or_uuid: &str) -> Option<GameInstall> {
        let installs = self.game_installs();
        installs
            .iter()
            .find(|install| install.uuid.as_deref() == Some(name_or_uuid))
            .or_else(|| installs.iter().find(|install| install.name == name_or_uuid))
            .cloned()
    }

    /// Insert or replace `install`, matching on uuid when it has one.
    pub fn upsert_install(&mut self, install: &GameInstall) -> Result<()> {
        let mut installs = self.game_installs();
        let existing = installs.iter().position(|candidate| match &install.uuid {
            Some(uuid) => candidate.uuid.as_deref() == Some(uuid.as_str()),
            None => candidate.uuid.is_none() && candidate.name == install.name,
        });
        match existing {
            Some(index) => installs[index] = install.clone(),
            None => installs.push(install.clone()),
        }
        self.set(GAME_INSTALLS, &installs)
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.list(WAYPOINTS).unwrap_or_default()
    }

    pub fn add_waypoint(&mut self, waypoint: Waypoint) -> Result<()> {
        let mut waypoints = self.waypoints();
        waypoints.push(waypoint);
        self.set(WAYPOINTS, &waypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.json")).unwrap();
        assert!(store.game_installs().is_empty());
        assert_eq!(store.analytics_pattern_configs(), default_patterns());
    }

    #[test]
    fn test_set_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let mut store = Store::open(&path).unwrap();
        store
            .set_game_log_directories(&[PathBuf::from("/logs/a")])
            .unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.game_log_directories(), vec![PathBuf::from("/logs/a")]);
        let raw: Option<Vec<String>> = reopened.get(GAME_LOG_DIRECTORIES).unwrap();
        assert_eq!(raw, Some(vec!["/logs/a".to_string()]));
    }

    #[test]
    fn test_malformed_patterns_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(
            &path,
            r#"{"analyticsPatterns":[
                {"name":"ok","pattern":"sold (\\d+)","valueIndex":1},
                {"name":"no-pattern"},
                {"name":"bad-regex","pattern":"(("}
            ]}"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.analytics_pattern_configs().len(), 2);
        let compiled = store.analytics_patterns();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].name, "ok");
    }

    #[test]
    fn test_upsert_install() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(&dir.path().join("store.json")).unwrap();
        let mut install = GameInstall {
            name: "Survival".to_string(),
            uuid: Some("u1".to_string()),
            ..Default::default()
        };
        store.upsert_install(&install).unwrap();
        install.extra_arguments = vec!["--fullscreen".to_string()];
        store.upsert_install(&install).unwrap();

        assert_eq!(store.game_installs().len(), 1);
        assert_eq!(
            store.find_install("Survival").unwrap().extra_arguments,
            vec!["--fullscreen".to_string()]
        );
        assert!(store.find_install("u1").is_some());
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();
        assert!(Store::open(&path).is_err());
    }
}
