//! Command module for the empire-utils CLI
//!
//! Each subcommand lives in its own module. They share the persisted
//! [`Store`](crate::store::Store) and the loaded [`Config`](crate::config::Config).

pub mod analytics;
pub mod installs;
pub mod launch;
pub mod sources;
pub mod waypoints;

pub use analytics::{run_analytics, AnalyticsOptions};
pub use installs::{add_install, list_installs, resolve_install, AddInstallOptions};
pub use launch::run_launch;
pub use sources::list_sources;
pub use waypoints::{add_waypoint, list_waypoints};

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Parse an inclusive `YYYY-MM-DD` range into UTC bounds.
pub fn parse_date_range(
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let parse = |raw: &str, label: &str| -> Result<NaiveDate> {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Ok(date),
            Err(_) => bail!("Invalid {} date format: {}. Use YYYY-MM-DD", label, raw),
        }
    };

    let since = since
        .map(|raw| parse(raw, "since"))
        .transpose()?
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc());
    let until = until
        .map(|raw| parse(raw, "until"))
        .transpose()?
        .and_then(|date| date.and_hms_milli_opt(23, 59, 59, 999))
        .map(|naive| naive.and_utc());

    if let (Some(since), Some(until)) = (since, until) {
        if since > until {
            bail!("--since must not be after --until");
        }
    }
    Ok((since, until))
}
