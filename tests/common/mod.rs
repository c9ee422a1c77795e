#![allow(dead_code)]

use anyhow::Result;
use empire_utils::models::ParsedLogLine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn write_log(dir: &Path, filename: &str, lines: &[&str]) -> Result<PathBuf> {
    let path = dir.join(filename);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&path, content)?;
    Ok(path)
}

pub fn write_gz_log(dir: &Path, filename: &str, lines: &[&str]) -> Result<PathBuf> {
    let path = dir.join(filename);
    let mut encoder = GzEncoder::new(fs::File::create(&path)?, Compression::default());
    for line in lines {
        writeln!(encoder, "{line}")?;
    }
    encoder.finish()?;
    Ok(path)
}

pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Backdate a file's modification time.
pub fn set_modified_ago(path: &Path, age: Duration) -> Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::now() - age)?;
    Ok(())
}

/// Everything already queued, flattened.
pub fn drain(rx: &mut UnboundedReceiver<Vec<ParsedLogLine>>) -> Vec<ParsedLogLine> {
    let mut lines = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        assert!(!batch.is_empty());
        lines.extend(batch);
    }
    lines
}

/// Wait until a line with `content` arrives or `timeout` passes.
pub async fn wait_for_content(
    rx: &mut UnboundedReceiver<Vec<ParsedLogLine>>,
    content: &str,
    timeout: Duration,
) -> Option<ParsedLogLine> {
    tokio::time::timeout(timeout, async {
        while let Some(batch) = rx.recv().await {
            if let Some(line) = batch.into_iter().find(|l| l.content == content) {
                return Some(line);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

pub fn parsed(user: &str, server: &str, content: &str, timestamp_ms: i64) -> ParsedLogLine {
    ParsedLogLine {
        user_name: user.to_string(),
        server_name: server.to_string(),
        content: content.to_string(),
        timestamp_ms,
        source: "/logs/latest.log".to_string(),
    }
}
