//! Empire Utils Library
//!
//! Companion tooling for Minecraft players: live analytics over the game's own
//! log files, and an install manager/launcher that resolves game versions with
//! an optional mod loader overlay.
//!
//! ## Core Features
//!
//! - **Log analytics**: Discovers vanilla and Lunar Client logs (plain and
//!   gzip-rotated), replays their history and follows live files, folding
//!   pattern matches into per-session sliding timeseries
//! - **Scan cycles**: Re-scanning cancels every tail from the previous scan so
//!   stale lines are never delivered
//! - **Install resolution**: Version descriptors merged with loader profiles,
//!   checksum-gated downloads with bounded concurrency
//! - **Launching**: Rule-aware argument templating and a single-flight process
//!   launcher streaming status messages
//!
//! ## Architecture Overview
//!
//! - [`timeseries`] - Fixed-width sliding bucket windows
//! - [`gamelog`] - Log discovery, line parsing and live tailing
//! - [`analytics`] - Analytics patterns and per-session aggregation
//! - [`launcher`] - Manifests, downloads, templating and process supervision
//! - [`store`] - Persisted key/value settings
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Example
//!
//! ```rust
//! use empire_utils::models::SeriesSample;
//! use empire_utils::timeseries::TimeSeries;
//!
//! let mut series = TimeSeries::new(60_000, 3);
//! let changed = series.add_samples(&[SeriesSample::new(30_000, 8.0)], Some(90_000));
//! assert!(changed);
//! assert_eq!(series.total(), 8.0);
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod gamelog;
pub mod launcher;
pub mod logging;
pub mod models;
pub mod store;
pub mod timeseries;
pub mod timestamp_parser;

// Command modules
pub mod commands;

pub use error::LaunchError;
pub use models::*;
