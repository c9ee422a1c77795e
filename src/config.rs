//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Longest accepted analytics bucket, one day.
pub const MAX_BUCKET_DURATION_SECS: u64 = 86_400;

/// Most buckets kept per series, one week of minutes.
pub const MAX_BUCKET_SAMPLES: usize = 10_080;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Paths configuration
    pub paths: PathsConfig,

    /// Game log analytics configuration
    pub analytics: AnalyticsConfig,

    /// Install and launch configuration
    pub launcher: LauncherConfig,

    /// Remote metadata endpoints
    pub meta: MetaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for installs, libraries and the persisted store
    pub data_directory: PathBuf,
    /// Where our own log files go when file logging is enabled
    pub log_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub bucket_duration_secs: u64,
    pub bucket_samples: usize,
    pub keep_alive_secs: u64,
    /// Plain log files modified within this window are tailed live
    pub tail_recency_secs: u64,
    pub tail_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub java_path: String,
    pub download_concurrency: usize,
    pub launcher_name: String,
    pub launcher_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub version_manifest_url: String,
    pub loader_meta_url: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_directory = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("empire-utils");
        Self {
            logging: LoggingConfig {
                level: "WARN".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            paths: PathsConfig {
                log_directory: data_directory.join("logs"),
                data_directory,
            },
            analytics: AnalyticsConfig::default(),
            launcher: LauncherConfig::default(),
            meta: MetaConfig::default(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bucket_duration_secs: 60,
            bucket_samples: 60,
            keep_alive_secs: 30,
            tail_recency_secs: 10 * 60,
            tail_poll_interval_ms: 1000,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            java_path: "java".to_string(),
            download_concurrency: 8,
            launcher_name: "Empire Utils".to_string(),
            launcher_version: "1.0.0".to_string(),
        }
    }
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            version_manifest_url: "https://launchermeta.mojang.com/mc/game/version_manifest.json"
                .to_string(),
            loader_meta_url: "https://meta.fabricmc.net/v2/versions/loader".to_string(),
        }
    }
}

impl AnalyticsConfig {
    pub fn bucket_duration_ms(&self) -> i64 {
        i64::try_from(self.bucket_duration_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    pub fn tail_recency(&self) -> Duration {
        Duration::from_secs(self.tail_recency_secs)
    }

    pub fn tail_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tail_poll_interval_ms)
    }
}

impl PathsConfig {
    pub fn installs_directory(&self) -> PathBuf {
        self.data_directory.join("installs")
    }

    pub fn libraries_directory(&self) -> PathBuf {
        self.data_directory.join("libraries")
    }

    pub fn store_file(&self) -> PathBuf {
        self.data_directory.join("store.json")
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("empire-utils.toml"),
            PathBuf::from(".empire-utils.toml"),
            dirs::config_dir()
                .map(|d| d.join("empire-utils").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("EMPIRE_DATA_DIR") {
            self.paths.data_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("EMPIRE_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        if let Ok(val) = env::var("EMPIRE_BUCKET_SECONDS") {
            self.analytics.bucket_duration_secs =
                val.parse().context("Invalid EMPIRE_BUCKET_SECONDS")?;
        }
        if let Ok(val) = env::var("EMPIRE_BUCKET_SAMPLES") {
            self.analytics.bucket_samples = val.parse().context("Invalid EMPIRE_BUCKET_SAMPLES")?;
        }

        if let Ok(val) = env::var("EMPIRE_JAVA") {
            self.launcher.java_path = val;
        }
        if let Ok(val) = env::var("EMPIRE_DOWNLOAD_CONCURRENCY") {
            self.launcher.download_concurrency = val
                .parse()
                .context("Invalid EMPIRE_DOWNLOAD_CONCURRENCY")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.analytics.bucket_duration_secs == 0 {
            return Err(anyhow::anyhow!("Bucket duration must be greater than 0"));
        }

        if self.analytics.bucket_duration_secs > MAX_BUCKET_DURATION_SECS {
            return Err(anyhow::anyhow!(
                "Bucket duration must be at most {MAX_BUCKET_DURATION_SECS} seconds"
            ));
        }

        if self.analytics.bucket_samples == 0 {
            return Err(anyhow::anyhow!("Bucket samples must be greater than 0"));
        }

        if self.analytics.bucket_samples > MAX_BUCKET_SAMPLES {
            return Err(anyhow::anyhow!(
                "Bucket samples must be at most {MAX_BUCKET_SAMPLES}"
            ));
        }

        if self.analytics.tail_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Tail poll interval must be greater than 0"));
        }

        if self.launcher.download_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "Download concurrency must be greater than 0"
            ));
        }

        if self.launcher.download_concurrency > 64 {
            warn!(
                download_concurrency = self.launcher.download_concurrency,
                "Download concurrency is very high, remote hosts may throttle"
            );
        }

        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        })
    })
}
