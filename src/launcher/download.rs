//! HTTP downloads gated by checksum or existence.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// Expected hex digest. Without one, an existing file is trusted.
    pub sha1: Option<String>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, sha1: Option<String>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            sha1: sha1.filter(|digest| !digest.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub url: String,
    pub destination: PathBuf,
    pub error: String,
}

/// Settled results of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Hex SHA-1 of a file, or `None` if it cannot be read.
pub async fn sha1_file(path: &Path) -> Option<String> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await.ok()?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Some(format!("{:x}", hasher.finalize()))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "Fetching JSON");
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("Bad response from {url}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON from {url}"))
    }

    /// Stream `url` into `destination` through a temporary sibling file.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("Bad response from {url}"))?;

        let mut partial = destination.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;

        let written: Result<()> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.context(format!("Failed to download {url}")));
        }

        tokio::fs::rename(&partial, destination)
            .await
            .with_context(|| format!("Failed to move download into {}", destination.display()))?;
        Ok(())
    }

    /// Fetch `task` unless a matching file is already in place.
    pub async fn download_if_missing(&self, task: &DownloadTask) -> Result<DownloadOutcome> {
        let present = match &task.sha1 {
            Some(expected) => sha1_file(&task.destination).await.as_deref() == Some(expected.as_str()),
            None => is_file(&task.destination).await,
        };
        if present {
            return Ok(DownloadOutcome::Skipped);
        }

        self.download(&task.url, &task.destination).await?;

        if let Some(expected) = &task.sha1 {
            let actual = sha1_file(&task.destination).await.unwrap_or_default();
            if &actual != expected {
                let _ = tokio::fs::remove_file(&task.destination).await;
                bail!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    task.url,
                    expected,
                    actual
                );
            }
        }
        Ok(DownloadOutcome::Downloaded)
    }

    /// Run every task with at most `concurrency` in flight. Failures are
    /// collected and never cancel sibling downloads.
    pub async fn download_all(&self, tasks: Vec<DownloadTask>, concurrency: usize) -> DownloadReport {
        let total = tasks.len();
        let results: Vec<(DownloadTask, Result<DownloadOutcome>)> = stream::iter(tasks)
            .map(|task| async move {
                let result = self.download_if_missing(&task).await;
                (task, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = DownloadReport::default();
        for (task, result) in results {
            match result {
                Ok(DownloadOutcome::Downloaded) => report.downloaded += 1,
                Ok(DownloadOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(url = %task.url, error = %e, "Download failed");
                    report.failures.push(DownloadFailure {
                        url: task.url,
                        destination: task.destination,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            total,
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Downloads settled"
        );
        report
    }
}
