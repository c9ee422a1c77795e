//! Install setup and dependency resolution.
//!
//! [`InstallManager::update_install`] is safe to call before every launch:
//! version documents are only fetched when missing and every artifact download
//! is gated by its checksum or by file existence.

use crate::config::{Config, MetaConfig};
use crate::error::LaunchError;
use crate::launcher::download::{DownloadReport, DownloadTask, Downloader};
use crate::launcher::manifest::{
    merge_loader, LoaderDetails, LoaderVersionEntry, VersionDetails, VersionManifestIndex,
};
use crate::launcher::template::{allow_rules, client_jar_path, PlatformContext};
use crate::models::GameInstall;
use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of resolving an install.
#[derive(Debug, Clone)]
pub struct ResolvedInstall {
    pub install_path: PathBuf,
    /// Base descriptor with the loader overlay applied
    pub details: VersionDetails,
    pub report: DownloadReport,
}

#[derive(Debug, Clone)]
pub struct InstallManager {
    installs_dir: PathBuf,
    libraries_dir: PathBuf,
    meta: MetaConfig,
    concurrency: usize,
    platform: PlatformContext,
    downloader: Downloader,
}

impl InstallManager {
    pub fn new(config: &Config) -> Self {
        Self {
            installs_dir: config.paths.installs_directory(),
            libraries_dir: config.paths.libraries_directory(),
            meta: config.meta.clone(),
            concurrency: config.launcher.download_concurrency,
            platform: PlatformContext::current(),
            downloader: Downloader::new(),
        }
    }

    pub fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    pub fn platform(&self) -> &PlatformContext {
        &self.platform
    }

    pub async fn fetch_version_index(&self) -> Result<VersionManifestIndex> {
        self.downloader
            .fetch_json(&self.meta.version_manifest_url)
            .await
            .context("Failed to load the version index")
    }

    pub fn version_json_path(install_path: &Path, version: &str) -> PathBuf {
        install_path.join(format!("{version}.json"))
    }

    pub fn loader_json_path(install_path: &Path, loader_version: &str) -> PathBuf {
        install_path.join(format!("loader-{loader_version}.json"))
    }

    /// Validate `install`, assign its identity and directory, and fetch its
    /// version documents if they are not on disk yet.
    pub async fn setup_install(&self, install: &mut GameInstall) -> Result<PathBuf> {
        if install.name.trim().is_empty() {
            return Err(LaunchError::MissingInstallName.into());
        }
        let manifest = install
            .version_manifest
            .clone()
            .ok_or(LaunchError::MissingVersionManifest)?;

        let uuid = install
            .uuid
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let install_path = install
            .path
            .get_or_insert_with(|| self.installs_dir.join(&uuid))
            .clone();

        tokio::fs::create_dir_all(&install_path)
            .await
            .with_context(|| format!("Failed to create directory: {}", install_path.display()))?;

        let version_json = Self::version_json_path(&install_path, &manifest.id);
        if !version_json.is_file() {
            info!(version = %manifest.id, "Fetching version descriptor");
            self.downloader.download(&manifest.url, &version_json).await?;
        }

        if install.loader.is_some() {
            self.setup_loader(install, &install_path, &manifest.id).await?;
        }
        Ok(install_path)
    }

    async fn setup_loader(
        &self,
        install: &mut GameInstall,
        install_path: &Path,
        game_version: &str,
    ) -> Result<()> {
        let Some(loader) = install.loader.as_mut() else {
            return Ok(());
        };

        let loader_version = match &loader.version {
            Some(version) => version.clone(),
            None => {
                let url = format!("{}/{}", self.meta.loader_meta_url.trim_end_matches('/'), game_version);
                let entries: Vec<LoaderVersionEntry> = self.downloader.fetch_json(&url).await?;
                let chosen = entries
                    .iter()
                    .find(|entry| entry.loader.stable)
                    .or_else(|| entries.first())
                    .ok_or_else(|| LaunchError::NoLoaderVersions(game_version.to_string()))?;
                info!(game_version, loader = %chosen.loader.version, "Selected loader version");
                loader.version = Some(chosen.loader.version.clone());
                chosen.loader.version.clone()
            }
        };

        let profile = Self::loader_json_path(install_path, &loader_version);
        if !profile.is_file() {
            let url = format!(
                "{}/{}/{}/profile/json",
                self.meta.loader_meta_url.trim_end_matches('/'),
                game_version,
                loader_version
            );
            self.downloader.download(&url, &profile).await?;
        }
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Set up `install`, merge its loader and download everything it needs.
    pub async fn update_install(&self, install: &mut GameInstall) -> Result<ResolvedInstall> {
        let install_path = self.setup_install(install).await?;
        let manifest = install
            .version_manifest
            .as_ref()
            .ok_or(LaunchError::MissingVersionManifest)?;

        let mut details: VersionDetails =
            Self::read_json(&Self::version_json_path(&install_path, &manifest.id)).await?;

        if let Some(version) = install.loader.as_ref().and_then(|l| l.version.as_deref()) {
            let loader: LoaderDetails =
                Self::read_json(&Self::loader_json_path(&install_path, version)).await?;
            debug!(loader = %loader.id, libraries = loader.libraries.len(), "Merging loader profile");
            merge_loader(&mut details, &loader);
        }

        let tasks = self.download_tasks(install, &install_path, &details);
        let report = self.downloader.download_all(tasks, self.concurrency).await;

        Ok(ResolvedInstall {
            install_path,
            details,
            report,
        })
    }

    fn download_tasks(
        &self,
        install: &GameInstall,
        install_path: &Path,
        details: &VersionDetails,
    ) -> Vec<DownloadTask> {
        let mut tasks = Vec::new();

        for library in &details.libraries {
            if !allow_rules(&self.platform, library.rules.as_deref()) {
                continue;
            }
            if let Some(artifact) = &library.downloads.artifact {
                tasks.push(DownloadTask::new(
                    artifact.url.clone(),
                    self.libraries_dir.join(&artifact.path),
                    artifact.sha1.clone(),
                ));
            }
        }

        let client = &details.downloads.client;
        tasks.push(DownloadTask::new(
            client.url.clone(),
            client_jar_path(&self.libraries_dir, &details.id),
            Some(client.sha1.clone()),
        ));

        let mods_dir = install_path.join("mods");
        for mod_file in &install.mods {
            match url_file_name(&mod_file.url) {
                Ok(name) => tasks.push(DownloadTask::new(mod_file.url.clone(), mods_dir.join(name), None)),
                Err(e) => warn!(url = %mod_file.url, error = %e, "Skipping mod"),
            }
            for (relative, url) in &mod_file.extra_files {
                match install_relative(install_path, relative) {
                    Some(destination) => tasks.push(DownloadTask::new(url.clone(), destination, None)),
                    None => warn!(path = %relative, "Skipping mod file outside the install"),
                }
            }
        }

        let shaderpacks_dir = install_path.join("shaderpacks");
        for pack in &install.shaderpacks {
            match url_file_name(&pack.url) {
                Ok(name) => tasks.push(DownloadTask::new(pack.url.clone(), shaderpacks_dir.join(name), None)),
                Err(e) => warn!(url = %pack.url, error = %e, "Skipping shader pack"),
            }
        }

        tasks
    }
}

/// Last path segment of `url`.
pub fn url_file_name(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .with_context(|| format!("URL has no file name: {url}"))
}

/// Resolve `relative` inside `root`, refusing absolute paths and `..`.
fn install_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(relative))
}
