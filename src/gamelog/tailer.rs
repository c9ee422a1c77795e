//! Replay and live-follow of game log files.
//!
//! Every call to [`GameLogWatcher::watch`] starts a new scan cycle: the
//! generation counter is bumped, the previous cycle's task (and with it its
//! file system watcher) is aborted, and a fresh task discovers sources, replays
//! their history oldest first and then follows the recently modified plain
//! logs. Every delivery re-checks the generation, so nothing from a superseded
//! cycle reaches the sink.

use crate::config::AnalyticsConfig;
use crate::gamelog::discovery::LogDiscovery;
use crate::gamelog::parser::{parse_line, ParseContext};
use crate::models::{GameLogSource, ParsedLogLine};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives parsed lines. Batches always hold at least one line.
pub type LineSink = Arc<dyn Fn(Vec<ParsedLogLine>) + Send + Sync>;

/// Forward batches into a channel.
pub fn channel_sink(tx: mpsc::UnboundedSender<Vec<ParsedLogLine>>) -> LineSink {
    Arc::new(move |batch| {
        if tx.send(batch).is_err() {
            debug!("Game log receiver dropped");
        }
    })
}

#[derive(Debug, Clone)]
pub struct TailerOptions {
    /// Plain logs modified within this window of the scan are followed live
    pub recency: Duration,
    /// Fallback re-read interval when file system notifications are missed
    pub poll_interval: Duration,
}

impl Default for TailerOptions {
    fn default() -> Self {
        (&AnalyticsConfig::default()).into()
    }
}

impl From<&AnalyticsConfig> for TailerOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            recency: config.tail_recency(),
            poll_interval: config.tail_poll_interval(),
        }
    }
}

/// Handle to one scan cycle.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    cycle: u64,
    replayed: watch::Receiver<bool>,
}

impl WatchHandle {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Wait until every discovered source has been replayed.
    ///
    /// Returns `false` if the cycle was torn down first.
    pub async fn history_replayed(&mut self) -> bool {
        self.replayed.wait_for(|done| *done).await.is_ok()
    }
}

struct ActiveCycle {
    cycle: u64,
    task: JoinHandle<()>,
}

/// Owns the scan-cycle generation and the task of the current cycle.
pub struct GameLogWatcher {
    options: TailerOptions,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveCycle>>,
}

impl Default for GameLogWatcher {
    fn default() -> Self {
        Self::new(TailerOptions::default())
    }
}

impl GameLogWatcher {
    pub fn new(options: TailerOptions) -> Self {
        Self {
            options,
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// The generation of the newest cycle.
    pub fn current_cycle(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new scan cycle over `directories`, tearing down the previous one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch(
        &self,
        directories: Vec<PathBuf>,
        sink: LineSink,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> WatchHandle {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        let cycle = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = active.take() {
            debug!(cycle = previous.cycle, "Stopping previous game log scan cycle");
            previous.task.abort();
        }

        let (replayed_tx, replayed_rx) = watch::channel(false);
        let gate = CycleGate {
            cycle,
            generation: Arc::clone(&self.generation),
            sink,
        };
        let options = self.options.clone();
        let task = tokio::spawn(async move {
            run_cycle(gate, directories, since, until, options, replayed_tx).await;
        });

        *active = Some(ActiveCycle { cycle, task });
        info!(cycle, "Started game log scan cycle");

        WatchHandle {
            cycle,
            replayed: replayed_rx,
        }
    }

    /// Stop the cycle behind `handle` if it is still the current one.
    pub fn unwatch(&self, handle: &WatchHandle) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map(|a| a.cycle) != Some(handle.cycle) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = active.take() {
            previous.task.abort();
            info!(cycle = previous.cycle, "Stopped game log scan cycle");
        }
    }
}

impl Drop for GameLogWatcher {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let active = self.active.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.task.abort();
        }
    }
}

/// Publishes lines only while its cycle is still the current generation.
struct CycleGate {
    cycle: u64,
    generation: Arc<AtomicU64>,
    sink: LineSink,
}

impl CycleGate {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.cycle
    }

    fn deliver(&self, line: ParsedLogLine) -> bool {
        if !self.is_current() {
            return false;
        }
        (self.sink)(vec![line]);
        true
    }

    fn publish(&self, context: &mut ParseContext, raw_lines: &[String], source: &Path) -> bool {
        for raw in raw_lines {
            let now_ms = Utc::now().timestamp_millis();
            if let Some(parsed) = parse_line(context, raw, source, now_ms) {
                if !self.deliver(parsed) {
                    return false;
                }
            }
        }
        true
    }
}

/// Read position of a live-followed plain log.
#[derive(Debug)]
struct TailState {
    path: PathBuf,
    offset: u64,
}

async fn run_cycle(
    gate: CycleGate,
    directories: Vec<PathBuf>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    options: TailerOptions,
    replayed_tx: watch::Sender<bool>,
) {
    let scan_ms = Utc::now().timestamp_millis();
    let sources = match tokio::task::spawn_blocking(move || {
        LogDiscovery::new().find_sources(&directories, since.as_ref(), until.as_ref())
    })
    .await
    {
        Ok(sources) => sources,
        Err(e) => {
            warn!(error = %e, "Game log discovery task failed");
            return;
        }
    };
    debug!(cycle = gate.cycle, sources = sources.len(), "Discovered game logs");

    let recency_ms = options.recency.as_millis() as i64;
    let mut context = ParseContext::new(gate.cycle);
    let mut tails = Vec::new();

    for source in &sources {
        if !gate.is_current() {
            return;
        }
        let follow = !source.is_compressed() && scan_ms - source.last_modified_ms <= recency_ms;
        match replay_source(&gate, &mut context, source, follow).await {
            Ok(Some(offset)) if follow => tails.push(TailState {
                path: source.path.clone(),
                offset,
            }),
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => warn!(path = %source.path.display(), error = %e, "Failed to replay game log"),
        }
    }

    let _ = replayed_tx.send(true);

    if tails.is_empty() || !gate.is_current() {
        return;
    }
    follow_tails(&gate, &mut context, tails, options.poll_interval).await;
}

/// Replay one source through the parser.
///
/// Returns the byte offset consumed, or `None` once the cycle went stale.
async fn replay_source(
    gate: &CycleGate,
    context: &mut ParseContext,
    source: &GameLogSource,
    follow: bool,
) -> Result<Option<u64>> {
    let (lines, offset) = if source.is_compressed() {
        let path = source.path.clone();
        let lines = tokio::task::spawn_blocking(move || read_compressed_lines(&path))
            .await
            .context("Decompression task failed")??;
        (lines, 0)
    } else {
        read_plain_lines(&source.path, 0, !follow).await?
    };

    if !gate.publish(context, &lines, &source.path) {
        return Ok(None);
    }
    Ok(Some(offset))
}

fn read_compressed_lines(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(GzDecoder::new(file));
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to decompress {}", path.display()))?;
        if read == 0 {
            break;
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(lines)
}

/// Read lines from `offset`. A trailing line without a newline is only
/// consumed when `include_partial` is set, so a live file is never split
/// mid-write.
async fn read_plain_lines(
    path: &Path,
    offset: u64,
    include_partial: bool,
) -> Result<(Vec<String>, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut reader = tokio::io::BufReader::new(file);
    let mut lines = Vec::new();
    let mut consumed = offset;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') && !include_partial {
            break;
        }
        consumed += read as u64;
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok((lines, consumed))
}

async fn follow_tails(
    gate: &CycleGate,
    context: &mut ParseContext,
    mut tails: Vec<TailState>,
    poll_interval: Duration,
) {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Event>();
    let _watcher = start_fs_watcher(&tails, notify_tx);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(cycle = gate.cycle, files = tails.len(), "Following game logs");

    while !tails.is_empty() {
        let touched: Option<HashSet<PathBuf>> = tokio::select! {
            Some(event) = notify_rx.recv() => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                Some(event.paths.into_iter().collect())
            }
            _ = ticker.tick() => None,
        };

        let mut abandoned = Vec::new();
        for (index, tail) in tails.iter_mut().enumerate() {
            if let Some(paths) = &touched {
                if !paths.contains(&tail.path) {
                    continue;
                }
            }
            match read_appended(tail).await {
                Ok(lines) => {
                    if !gate.publish(context, &lines, &tail.path) {
                        return;
                    }
                }
                Err(e) => {
                    warn!(path = %tail.path.display(), error = %e, "Abandoning game log tail");
                    abandoned.push(index);
                }
            }
        }
        for index in abandoned.into_iter().rev() {
            tails.remove(index);
        }
    }
}

async fn read_appended(tail: &mut TailState) -> Result<Vec<String>> {
    let len = tokio::fs::metadata(&tail.path)
        .await
        .with_context(|| format!("Failed to stat {}", tail.path.display()))?
        .len();
    if len < tail.offset {
        debug!(path = %tail.path.display(), "Game log truncated, restarting from the beginning");
        tail.offset = 0;
    }
    if len == tail.offset {
        return Ok(Vec::new());
    }

    let (lines, offset) = read_plain_lines(&tail.path, tail.offset, false).await?;
    tail.offset = offset;
    Ok(lines)
}

fn start_fs_watcher(
    tails: &[TailState],
    tx: mpsc::UnboundedSender<Event>,
) -> Option<notify::RecommendedWatcher> {
    let mut watcher = match notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!(error = %e, "Game log watcher error"),
        }
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "File system notifications unavailable, polling game logs");
            return None;
        }
    };

    let parents: HashSet<&Path> = tails.iter().filter_map(|t| t.path.parent()).collect();
    for parent in parents {
        if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
            warn!(directory = %parent.display(), error = %e, "Failed to watch game log directory");
        }
    }
    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_partial_lines_wait_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");
        std::fs::write(&path, "[10:00:00] [main/INFO]: one\n[10:00:01] [main/INFO]: tw").unwrap();

        let (lines, offset) = read_plain_lines(&path, 0, false).await.unwrap();
        assert_eq!(lines.len(), 1);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "o").unwrap();

        let mut tail = TailState { path, offset };
        let lines = read_appended(&mut tail).await.unwrap();
        assert_eq!(lines, vec!["[10:00:01] [main/INFO]: two\n".to_string()]);
    }

    #[tokio::test]
    async fn test_truncated_file_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");
        std::fs::write(&path, "x: new\n").unwrap();

        let mut tail = TailState { path, offset: 1_000 };
        let lines = read_appended(&mut tail).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(tail.offset, 7);
    }
}
