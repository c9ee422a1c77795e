//! Install resolution and game launching.
//!
//! - [`manifest`] - version descriptor documents and the loader merge
//! - [`resolver`] - install setup, merge and artifact downloads
//! - [`download`] - checksum-gated bounded-concurrency downloads
//! - [`template`] - rule evaluation, argument templating and classpath
//! - [`auth`] - account provider boundary
//! - [`process`] - single-flight process launcher with status streaming

pub mod auth;
pub mod download;
pub mod manifest;
pub mod process;
pub mod resolver;
pub mod template;

pub use auth::{AuthProvider, GameAccount, OfflineAuth};
pub use download::{DownloadReport, DownloadTask, Downloader};
pub use manifest::{merge_loader, VersionDetails, VersionManifestEntry, VersionManifestIndex};
pub use process::{LaunchOutcome, LaunchRegistry, Launcher, StatusSender};
pub use resolver::{InstallManager, ResolvedInstall};
pub use template::PlatformContext;
