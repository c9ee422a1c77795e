//! Single-flight game launches with streamed status.

use crate::config::Config;
use crate::error::LaunchError;
use crate::launcher::auth::{AuthProvider, GameAccount};
use crate::launcher::resolver::{InstallManager, ResolvedInstall};
use crate::launcher::template::{
    build_classpath, client_jar_path, render_command, TemplateValues, WRAPPED_MAIN_CLASS_ENV,
};
use crate::models::{GameInstall, LaunchStatus, LaunchStatusMessage};
use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type StatusSender = mpsc::UnboundedSender<LaunchStatusMessage>;

fn send(status: &StatusSender, message: LaunchStatusMessage) {
    if status.send(message).is_err() {
        debug!("Launch status receiver dropped");
    }
}

/// Launch ids that currently own a launch, with the phase each one is in.
#[derive(Debug, Default)]
pub struct LaunchRegistry {
    running: DashMap<String, LaunchStatus>,
}

impl LaunchRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `launch_id`. Returns `None` while another launch holds it.
    pub fn try_acquire(self: &Arc<Self>, launch_id: &str) -> Option<LaunchGuard> {
        match self.running.entry(launch_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(LaunchStatus::Launching);
                Some(LaunchGuard {
                    registry: Arc::clone(self),
                    launch_id: launch_id.to_string(),
                })
            }
        }
    }

    pub fn is_running(&self, launch_id: &str) -> bool {
        self.running.contains_key(launch_id)
    }

    /// Current phase of `launch_id`. Unclaimed ids are idle.
    pub fn phase(&self, launch_id: &str) -> LaunchStatus {
        self.running
            .get(launch_id)
            .map(|phase| *phase)
            .unwrap_or(LaunchStatus::Idle)
    }

    fn set_phase(&self, launch_id: &str, phase: LaunchStatus) {
        if let Some(mut current) = self.running.get_mut(launch_id) {
            *current = phase;
        }
    }
}

/// Releases its launch id when dropped.
#[derive(Debug)]
pub struct LaunchGuard {
    registry: Arc<LaunchRegistry>,
    launch_id: String,
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        self.registry.running.remove(&self.launch_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Another launch with the same id was in flight; nothing happened
    AlreadyRunning,
    /// The game ran and exited with this code
    Exited(Option<i32>),
}

pub struct Launcher {
    manager: InstallManager,
    registry: Arc<LaunchRegistry>,
    auth: Arc<dyn AuthProvider>,
    java: String,
    launcher_name: String,
    launcher_version: String,
}

impl Launcher {
    pub fn new(config: &Config, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            manager: InstallManager::new(config),
            registry: LaunchRegistry::new(),
            auth,
            java: config.launcher.java_path.clone(),
            launcher_name: config.launcher.launcher_name.clone(),
            launcher_version: config.launcher.launcher_version.clone(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<LaunchRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<LaunchRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &InstallManager {
        &self.manager
    }

    /// Send `message`, recording its phase against `launch_id` first.
    fn emit(&self, launch_id: &str, status: &StatusSender, message: LaunchStatusMessage) {
        if let Some(phase) = message.status {
            self.registry.set_phase(launch_id, phase);
        }
        send(status, message);
    }

    /// Resolve, authenticate and run `install`, streaming progress to `status`.
    ///
    /// The launch id stays claimed until the game exits. Failures are reported
    /// as an `Error launching: ...` status before being returned.
    pub async fn launch(
        &self,
        launch_id: &str,
        install: &mut GameInstall,
        status: &StatusSender,
    ) -> Result<LaunchOutcome> {
        let Some(guard) = self.registry.try_acquire(launch_id) else {
            info!(launch_id, phase = %self.registry.phase(launch_id), "Launch already running");
            return Ok(LaunchOutcome::AlreadyRunning);
        };

        let result = self.run(launch_id, install, status).await;
        drop(guard);

        match result {
            Ok(code) => Ok(LaunchOutcome::Exited(code)),
            Err(e) => {
                error!(launch_id, error = %e, "Launch failed");
                send(
                    status,
                    LaunchStatusMessage::status(LaunchStatus::Finished, format!("Error launching: {e:#}")),
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        launch_id: &str,
        install: &mut GameInstall,
        status: &StatusSender,
    ) -> Result<Option<i32>> {
        self.emit(launch_id, status, LaunchStatusMessage::status(LaunchStatus::Launching, "Updating install"));
        let resolved = self.manager.update_install(install).await?;
        for failure in &resolved.report.failures {
            send(
                status,
                LaunchStatusMessage::message(format!("Error downloading {}: {}", failure.url, failure.error)),
            );
        }

        self.emit(launch_id, status, LaunchStatusMessage::status(LaunchStatus::Authenticating, "Authenticating"));
        let account = match self.auth.authenticate().await {
            Ok(account) => {
                send(status, LaunchStatusMessage::message(format!("Logged in as: {}", account.player_name)));
                Some(account)
            }
            Err(e) => {
                warn!(error = %e, "Authentication failed");
                send(status, LaunchStatusMessage::message(format!("Error authenticating: {e:#}")));
                None
            }
        };

        let client_jar = client_jar_path(self.manager.libraries_dir(), &resolved.details.id);
        if !client_jar.is_file() {
            return Err(LaunchError::MissingArtifact(client_jar).into());
        }

        let values = self.template_values(install, &resolved, account.as_ref());
        let command = render_command(
            &self.java,
            &resolved.details,
            self.manager.platform(),
            &values,
            &install.extra_arguments,
            install.wrap_main_class,
        );
        self.emit(
            launch_id,
            status,
            LaunchStatusMessage::status(
                LaunchStatus::Starting,
                format!("Launching install: {}", command.join(" ")),
            ),
        );

        self.spawn(launch_id, &command, &resolved, status).await
    }

    fn template_values(
        &self,
        install: &GameInstall,
        resolved: &ResolvedInstall,
        account: Option<&GameAccount>,
    ) -> TemplateValues {
        let details = &resolved.details;
        let install_path = resolved.install_path.to_string_lossy().into_owned();
        let libraries_dir = self.manager.libraries_dir();
        let classpath = build_classpath(
            self.manager.platform(),
            libraries_dir,
            &details.libraries,
            install.wrap_main_class,
            &client_jar_path(libraries_dir, &details.id),
        );
        let version_name = install
            .version_manifest
            .as_ref()
            .map(|m| m.id.clone())
            .unwrap_or_else(|| details.id.clone());

        let (player_name, uuid, access_token, user_type) = match account {
            Some(a) => (
                a.player_name.clone(),
                a.uuid.clone(),
                a.access_token.clone(),
                a.user_type.clone(),
            ),
            None => (String::new(), String::new(), "0".to_string(), String::new()),
        };

        [
            ("auth_player_name", player_name),
            ("version_name", version_name),
            ("game_directory", install_path),
            ("assets_root", String::new()),
            ("assets_index_name", details.assets_index_name().to_string()),
            ("auth_uuid", uuid),
            ("auth_access_token", access_token),
            ("clientid", String::new()),
            ("auth_xuid", String::new()),
            ("user_type", user_type),
            ("version_type", details.kind.clone()),
            (
                "natives_directory",
                resolved.install_path.join("natives").to_string_lossy().into_owned(),
            ),
            ("launcher_name", self.launcher_name.clone()),
            ("launcher_version", self.launcher_version.clone()),
            ("classpath", classpath),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    async fn spawn(
        &self,
        launch_id: &str,
        command: &[String],
        resolved: &ResolvedInstall,
        status: &StatusSender,
    ) -> Result<Option<i32>> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Empty launch command"))?;

        let mut process = Command::new(program);
        process
            .args(args)
            .current_dir(&resolved.install_path)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env(WRAPPED_MAIN_CLASS_ENV, &resolved.details.main_class);
        if let Some(path) = std::env::var_os("PATH") {
            process.env("PATH", path);
        }

        let mut child = process.spawn().map_err(|source| LaunchError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

        if let Some(pid) = child.id() {
            info!(launch_id, pid, "Game process started");
            self.emit(launch_id, status, LaunchStatusMessage::process(pid));
        }

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, status.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, status.clone()));
        }

        let exit = child.wait().await?;
        for reader in readers {
            let _ = reader.await;
        }

        let code = exit.code();
        let message = match code {
            Some(0) => format!("launch:{launch_id} exited"),
            Some(code) => format!("launch:{launch_id} exited with code {code}"),
            None => format!("launch:{launch_id} exited by signal"),
        };
        info!(launch_id, ?code, "Game process exited");
        self.emit(launch_id, status, LaunchStatusMessage::status(LaunchStatus::Finished, message));
        Ok(code)
    }
}

/// Stream `stream` line by line as messages. Invalid UTF-8 is replaced, not fatal.
fn forward_lines<R>(stream: R, status: StatusSender) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    send(
                        &status,
                        LaunchStatusMessage::message(line.trim_end_matches(&['\r', '\n'][..])),
                    );
                }
                Err(e) => {
                    debug!(error = %e, "Stopped reading game output");
                    break;
                }
            }
        }
    })
}
