//! Analytics command implementation
//!
//! Replays the configured game logs through the analytics patterns and either
//! prints one snapshot or keeps following the live logs until Ctrl+C.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::analytics::SessionStore;
use crate::config::Config;
use crate::gamelog::{channel_sink, GameLogWatcher, TailerOptions};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct AnalyticsOptions {
    pub directories: Vec<PathBuf>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub snapshot: bool,
    pub json: bool,
}

pub async fn run_analytics(config: &Config, store: &Store, options: AnalyticsOptions) -> Result<()> {
    let patterns = store.analytics_patterns();
    let directories = if options.directories.is_empty() {
        store.game_log_directories()
    } else {
        options.directories.clone()
    };
    info!(
        directories = directories.len(),
        patterns = patterns.len(),
        snapshot = options.snapshot,
        "Starting analytics"
    );

    let mut sessions = SessionStore::new(
        config.analytics.bucket_duration_ms(),
        config.analytics.bucket_samples,
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = GameLogWatcher::new(TailerOptions::from(&config.analytics));
    let mut handle = watcher.watch(directories, channel_sink(tx), options.since, options.until);

    if options.snapshot {
        handle.history_replayed().await;
        watcher.unwatch(&handle);
        while let Ok(batch) = rx.try_recv() {
            sessions.apply(&patterns, &batch);
        }
        return print_sessions(&sessions, options.json);
    }

    if !options.json {
        println!("{}", "Following game logs, press Ctrl+C to stop".dimmed());
    }

    let mut keep_alive =
        tokio::time::interval(Duration::from_secs(config.analytics.keep_alive_secs.max(1)));
    let mut replayed = false;
    loop {
        tokio::select! {
            Some(batch) = rx.recv() => {
                if sessions.apply(&patterns, &batch) && replayed {
                    print_sessions(&sessions, options.json)?;
                }
            }
            done = handle.history_replayed(), if !replayed => {
                replayed = true;
                if done {
                    // flush whatever history is still queued before the first render
                    while let Ok(batch) = rx.try_recv() {
                        sessions.apply(&patterns, &batch);
                    }
                    print_sessions(&sessions, options.json)?;
                }
            }
            _ = keep_alive.tick() => {
                if sessions.keep_alive(Utc::now().timestamp_millis()) && replayed {
                    print_sessions(&sessions, options.json)?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.unwatch(&handle);
    info!("Analytics stopped");
    Ok(())
}

fn print_sessions(sessions: &SessionStore, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&sessions.snapshot())?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found".yellow());
        return Ok(());
    }

    for (key, session) in sessions.sessions() {
        println!(
            "{} {}",
            key.bright_white().bold(),
            format!("({} log files)", session.gamelogs.len()).dimmed()
        );
        if session.series.is_empty() {
            println!("  {}", "no matching events".dimmed());
        }
        for (name, series) in &session.series {
            println!(
                "  {:<12} total {:>12}  rate {:>10}/min",
                name,
                format!("{:.2}", series.total()).bright_green(),
                format!("{:.2}", series.rate_per_minute()).cyan()
            );
        }
    }
    println!();
    Ok(())
}
