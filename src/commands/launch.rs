//! Launch command implementation

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::launcher::{LaunchOutcome, Launcher, OfflineAuth};
use crate::models::LaunchStatusMessage;
use crate::store::Store;

/// Launch a stored install and print its status stream until the game exits.
pub async fn run_launch(config: &Config, store: &mut Store, name: &str, player: &str, json: bool) -> Result<()> {
    let mut install = store
        .find_install(name)
        .with_context(|| format!("No install named '{name}'"))?;
    let launch_id = install.uuid.clone().unwrap_or_else(|| install.name.clone());

    let launcher = Launcher::new(config, Arc::new(OfflineAuth::new(player)));
    let (tx, mut rx) = mpsc::unbounded_channel::<LaunchStatusMessage>();
    let printer = tokio::spawn(async move {
        while let Some(status) = rx.recv().await {
            print_status(&status, json);
        }
    });

    let result = launcher.launch(&launch_id, &mut install, &tx).await;
    drop(tx);
    let _ = printer.await;

    // identity and loader selection are assigned during setup
    if install.uuid.is_some() {
        store.upsert_install(&install)?;
    }

    match result? {
        LaunchOutcome::AlreadyRunning => {
            println!("{}", "Install is already running".yellow());
            Ok(())
        }
        LaunchOutcome::Exited(Some(0)) => Ok(()),
        LaunchOutcome::Exited(code) => {
            anyhow::bail!("Game exited with {}", code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))
        }
    }
}

fn print_status(status: &LaunchStatusMessage, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(status) {
            println!("{line}");
        }
        return;
    }
    if let Some(message) = &status.message {
        if status.is_error() {
            eprintln!("{}", message.red());
        } else if let Some(phase) = status.status {
            println!("{} {}", format!("[{phase}]").cyan(), message);
        } else {
            println!("{message}");
        }
    } else if let Some(pid) = status.process_id {
        println!("{} process {}", "[running]".cyan(), pid);
    }
}
