//! Install resolution and single-flight launches against a local install

use anyhow::{bail, Result};
use async_trait::async_trait;
use empire_utils::config::Config;
use empire_utils::launcher::download::sha1_file;
use empire_utils::launcher::template::{client_jar_path, WRAPPER_JAR_PATH};
use empire_utils::launcher::{
    AuthProvider, GameAccount, LaunchOutcome, Launcher, OfflineAuth, VersionManifestEntry,
};
use empire_utils::models::{GameInstall, LaunchStatus, LaunchStatusMessage};
use empire_utils::LaunchError;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const VERSION: &str = "1.20.1";

struct Fixture {
    _dir: TempDir,
    config: Config,
    install: GameInstall,
}

/// A resolved install whose only artifact, the client jar, is already on disk.
async fn fixture(java: &str, jvm: &[&str]) -> Fixture {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.paths.data_directory = dir.path().to_path_buf();
    config.launcher.java_path = java.to_string();

    let client_jar = client_jar_path(&config.paths.libraries_directory(), VERSION);
    fs::create_dir_all(client_jar.parent().unwrap()).unwrap();
    fs::write(&client_jar, b"client").unwrap();
    let sha1 = sha1_file(&client_jar).await.unwrap();

    let install_path = config.paths.installs_directory().join("fixture");
    fs::create_dir_all(&install_path).unwrap();
    write_version_json(&install_path, jvm, &sha1);

    let install = GameInstall {
        name: "main".to_string(),
        uuid: Some("fixture".to_string()),
        path: Some(install_path),
        version_manifest: Some(VersionManifestEntry {
            id: VERSION.to_string(),
            kind: "release".to_string(),
            url: "http://127.0.0.1:9/never-fetched.json".to_string(),
            time: String::new(),
            release_time: String::new(),
        }),
        ..Default::default()
    };

    Fixture {
        _dir: dir,
        config,
        install,
    }
}

fn write_version_json(install_path: &Path, jvm: &[&str], sha1: &str) {
    let details = serde_json::json!({
        "id": VERSION,
        "type": "release",
        "mainClass": "net.minecraft.client.main.Main",
        "arguments": {
            "jvm": jvm,
            "game": ["--username", "${auth_player_name}", "--version", "${version_name}"],
        },
        "libraries": [],
        "downloads": {
            "client": { "sha1": sha1, "size": 6, "url": "http://127.0.0.1:9/client.jar" }
        }
    });
    fs::write(
        install_path.join(format!("{VERSION}.json")),
        serde_json::to_vec(&details).unwrap(),
    )
    .unwrap();
}

fn collect(rx: &mut UnboundedReceiver<LaunchStatusMessage>) -> Vec<LaunchStatusMessage> {
    let mut statuses = Vec::new();
    while let Ok(status) = rx.try_recv() {
        statuses.push(status);
    }
    statuses
}

struct FailingAuth;

#[async_trait]
impl AuthProvider for FailingAuth {
    async fn authenticate(&self) -> Result<GameAccount> {
        bail!("token expired")
    }
}

#[tokio::test]
async fn test_second_launch_of_same_id_is_ignored() {
    let mut fx = fixture("java", &[]).await;
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));
    let _held = launcher.registry().try_acquire("main").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = launcher.launch("main", &mut fx.install, &tx).await.unwrap();

    assert_eq!(outcome, LaunchOutcome::AlreadyRunning);
    assert!(collect(&mut rx).is_empty());
}

#[tokio::test]
async fn test_missing_version_manifest_is_reported_and_released() {
    let mut fx = fixture("java", &[]).await;
    fx.install.version_manifest = None;
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = launcher.launch("main", &mut fx.install, &tx).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LaunchError>(),
        Some(LaunchError::MissingVersionManifest)
    ));

    let statuses = collect(&mut rx);
    let last = statuses.last().unwrap();
    assert_eq!(last.status, Some(LaunchStatus::Finished));
    assert_eq!(
        last.message.as_deref(),
        Some("Error launching: Install version manifest is required")
    );
    assert!(!launcher.registry().is_running("main"));
}

#[tokio::test]
async fn test_spawn_failure_is_reported_and_released() {
    let mut fx = fixture("/nonexistent/java", &[]).await;
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = launcher.launch("main", &mut fx.install, &tx).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LaunchError>(),
        Some(LaunchError::SpawnFailed { .. })
    ));

    let statuses = collect(&mut rx);
    let messages: Vec<_> = statuses.iter().filter_map(|s| s.message.as_deref()).collect();
    assert!(messages.contains(&"Logged in as: Alex"));
    assert!(messages
        .iter()
        .any(|m| m.starts_with("Launching install: /nonexistent/java net.minecraft.client.main.Main --username Alex")));
    assert!(statuses.last().unwrap().is_error());
    assert!(!launcher.registry().is_running("main"));

    // released, so the next attempt runs again instead of being ignored
    let retry = launcher.launch("main", &mut fx.install, &tx).await;
    assert!(retry.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_launch_streams_output_and_exit_code() {
    let mut fx = fixture("sh", &["-c", "echo game output; exit 3"]).await;
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = launcher.launch("main", &mut fx.install, &tx).await.unwrap();
    assert_eq!(outcome, LaunchOutcome::Exited(Some(3)));
    assert!(!launcher.registry().is_running("main"));

    let statuses = collect(&mut rx);
    let phases: Vec<_> = statuses.iter().filter_map(|s| s.status).collect();
    assert_eq!(
        phases,
        vec![
            LaunchStatus::Launching,
            LaunchStatus::Authenticating,
            LaunchStatus::Starting,
            LaunchStatus::Running,
            LaunchStatus::Finished,
        ]
    );
    assert!(statuses.iter().any(|s| s.process_id.is_some()));
    assert!(statuses.iter().any(|s| s.message.as_deref() == Some("game output")));
    assert_eq!(
        statuses.last().and_then(|s| s.message.as_deref()),
        Some("launch:main exited with code 3")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_authentication_launches_with_blank_identity() {
    let mut fx = fixture("sh", &["-c", "echo \"$@\"", "--"]).await;
    let launcher = Launcher::new(&fx.config, Arc::new(FailingAuth));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = launcher.launch("main", &mut fx.install, &tx).await.unwrap();
    assert_eq!(outcome, LaunchOutcome::Exited(Some(0)));

    let messages: Vec<String> = collect(&mut rx).into_iter().filter_map(|s| s.message).collect();
    assert!(messages.contains(&"Error authenticating: token expired".to_string()));
    // the flag of a blank player name is dropped along with it
    assert!(messages.contains(&"net.minecraft.client.main.Main --version 1.20.1".to_string()));
    assert_eq!(messages.last().map(String::as_str), Some("launch:main exited"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_wrapped_main_class_launch() {
    let script = "echo \"$EMPIRELAUNCHER_MAIN_CLASS\"; echo \"$@\"";
    let mut fx = fixture("sh", &["-c", script, "--", "-cp", "${classpath}"]).await;
    fx.install.wrap_main_class = true;
    let libraries = fx.config.paths.libraries_directory();
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = launcher.launch("main", &mut fx.install, &tx).await.unwrap();
    assert_eq!(outcome, LaunchOutcome::Exited(Some(0)));

    let messages: Vec<String> = collect(&mut rx).into_iter().filter_map(|s| s.message).collect();
    // the wrapper learns the real entry point from the environment
    assert!(messages.contains(&"net.minecraft.client.main.Main".to_string()));

    let classpath = format!(
        "{}:{}",
        libraries.join(WRAPPER_JAR_PATH).display(),
        client_jar_path(&libraries, VERSION).display()
    );
    let argv = format!(
        "-cp {classpath} com.greenappers.empirelauncher.EmpireLauncher --username Alex --version 1.20.1"
    );
    assert!(messages.contains(&argv), "{messages:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_launches_start_one_process() {
    let fx = fixture("sh", &["-c", "sleep 0.2"]).await;
    let launcher = Launcher::new(&fx.config, Arc::new(OfflineAuth::new("Alex")));
    let mut first = fx.install.clone();
    let mut second = fx.install.clone();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (a, b) = tokio::join!(
        launcher.launch("main", &mut first, &tx),
        launcher.launch("main", &mut second, &tx)
    );
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, LaunchOutcome::AlreadyRunning));
    assert_eq!(outcomes, vec![LaunchOutcome::Exited(Some(0)), LaunchOutcome::AlreadyRunning]);

    let statuses = collect(&mut rx);
    assert_eq!(statuses.iter().filter(|s| s.process_id.is_some()).count(), 1);
    assert_eq!(launcher.registry().phase("main"), LaunchStatus::Idle);
}
