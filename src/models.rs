//! Core Data Models
//!
//! This module defines the data structures shared between the log analytics
//! pipeline, the persisted store and the launcher.
//!
//! ## Data Flow
//!
//! 1. **Discovery**: [`GameLogSource`] - one physical log file found on disk
//! 2. **Parsing**: [`ParsedLogLine`] - one log line with its player/server context
//! 3. **Matching**: [`SeriesSample`] - a timed value destined for a timeseries bucket
//!
//! Independently, the launcher consumes a [`GameInstall`] and reports progress
//! through [`LaunchStatusMessage`].
//!
//! All public types support serde so they can be persisted or printed as JSON.

use crate::launcher::manifest::VersionManifestEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// A log file discovered during a scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLogSource {
    pub path: PathBuf,
    pub last_modified_ms: i64,
}

impl GameLogSource {
    /// Rotated history is stored as `YYYY-MM-DD-N.log.gz`.
    pub fn is_compressed(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false)
    }
}

/// One log line that carried content, tagged with the context it was read in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLogLine {
    pub user_name: String,
    pub server_name: String,
    pub content: String,
    pub timestamp_ms: i64,
    pub source: String,
}

/// A value observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSample {
    pub time_ms: i64,
    pub value: f64,
}

impl SeriesSample {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

/// Mod loader selection for an install. A missing version means "latest".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A downloadable mod jar plus any companion files it needs inside the install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModFile {
    pub url: String,
    /// Install-relative path to URL
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderPack {
    pub url: String,
}

/// A configured game installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInstall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_manifest: Option<VersionManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<LoaderSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mods: Vec<ModFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shaderpacks: Vec<ShaderPack>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_arguments: Vec<String>,
    /// Start through the launcher's main class wrapper jar.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrap_main_class: bool,
}

/// A saved in-game location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Waypoint {
    /// Read coordinates from a pasted `/tp @s x y z yaw` command or a Lunar
    /// Client `X: 1 Y: 2 Z: 3` readout.
    pub fn parse_coordinates(text: &str) -> Option<(i64, i64, i64)> {
        static VANILLA: OnceLock<Regex> = OnceLock::new();
        static LUNAR: OnceLock<Regex> = OnceLock::new();
        let vanilla = VANILLA.get_or_init(|| {
            Regex::new(r"tp @s (-?\d+\.\d+) (-?\d+\.\d+) (-?\d+\.\d+) (-?\d+\.\d+)")
                .expect("valid regex")
        });
        let lunar = LUNAR
            .get_or_init(|| Regex::new(r"X: (-?\d+) Y: (-?\d+) Z: (-?\d+)").expect("valid regex"));

        let captures = vanilla.captures(text).or_else(|| lunar.captures(text))?;
        let axis = |index: usize| -> Option<i64> {
            captures[index].parse::<f64>().ok().map(|value| value.trunc() as i64)
        };
        Some((axis(1)?, axis(2)?, axis(3)?))
    }
}

/// Phases a launch moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchStatus {
    Idle,
    Launching,
    Authenticating,
    Starting,
    Running,
    Finished,
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchStatus::Idle => "idle",
            LaunchStatus::Launching => "launching",
            LaunchStatus::Authenticating => "authenticating",
            LaunchStatus::Starting => "starting",
            LaunchStatus::Running => "running",
            LaunchStatus::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Progress event streamed to whoever started a launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchStatusMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LaunchStatus>,
}

impl LaunchStatusMessage {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn status(status: LaunchStatus, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn process(process_id: u32) -> Self {
        Self {
            process_id: Some(process_id),
            status: Some(LaunchStatus::Running),
            ..Default::default()
        }
    }

    /// Status text carries failures inline as `Error <phase>: ...`.
    pub fn is_error(&self) -> bool {
        self.message
            .as_deref()
            .map(|m| m.starts_with("Error "))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_source_detection() {
        let source = GameLogSource {
            path: PathBuf::from("/logs/2024-05-01-1.log.gz"),
            last_modified_ms: 0,
        };
        assert!(source.is_compressed());

        let source = GameLogSource {
            path: PathBuf::from("/logs/latest.log"),
            last_modified_ms: 0,
        };
        assert!(!source.is_compressed());
    }

    #[test]
    fn test_status_message_serialization() {
        let message = LaunchStatusMessage::process(42);
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"processId":42,"status":"running"}"#);
    }

    #[test]
    fn test_parse_pasted_coordinates() {
        assert_eq!(
            Waypoint::parse_coordinates("/execute in minecraft:overworld run tp @s -120.70 64.00 355.30 -90.0 12.0"),
            Some((-120, 64, 355))
        );
        assert_eq!(Waypoint::parse_coordinates("X: 10 Y: -5 Z: 7"), Some((10, -5, 7)));
        assert_eq!(Waypoint::parse_coordinates("hello"), None);
    }

    #[test]
    fn test_error_messages_are_flagged() {
        assert!(LaunchStatusMessage::message("Error launching: boom").is_error());
        assert!(!LaunchStatusMessage::message("Updating install").is_error());
    }
}
