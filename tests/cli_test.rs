//! End-to-end checks of the empire-utils binary

mod common;

use assert_cmd::Command;
use common::write_log;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("empire-utils").unwrap();
    cmd.env("EMPIRE_DATA_DIR", data_dir).env("LOG_OUTPUT", "console");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let data = tempdir().unwrap();
    cli(data.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analytics"))
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("waypoints"));
}

#[test]
fn test_waypoints_are_persisted() {
    let data = tempdir().unwrap();

    cli(data.path())
        .args(["waypoints", "add", "base", "--server", "play.example.net", "--", "100", "-64", "-200"])
        .assert()
        .success();
    cli(data.path())
        .args(["waypoints", "add", "shop", "--paste", "/execute in minecraft:overworld run tp @s 12.70 70.00 -8.30 90.0 0.0"])
        .assert()
        .success();

    cli(data.path())
        .args(["--json", "waypoints", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"base\""))
        .stdout(predicate::str::contains("\"y\": -64"))
        .stdout(predicate::str::contains("\"x\": 12"))
        .stdout(predicate::str::contains("\"z\": -8"));

    cli(data.path())
        .args(["--json", "waypoints", "list", "--server", "play.example.net"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base"))
        .stdout(predicate::str::contains("shop").not());

    assert!(data.path().join("store.json").is_file());
}

#[test]
fn test_sources_lists_logs_in_directory() {
    let data = tempdir().unwrap();
    let logs = tempdir().unwrap();
    write_log(logs.path(), "latest.log", &["[10:00:00] [main/INFO]: hello"]).unwrap();

    cli(data.path())
        .args(["--json", "sources", "--dir"])
        .arg(logs.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("latest.log"));
}

#[test]
fn test_analytics_snapshot_reports_sessions() {
    let data = tempdir().unwrap();
    let logs = tempdir().unwrap();
    write_log(
        logs.path(),
        "latest.log",
        &[
            "[10:00:00] [main/INFO]: Setting user: Alex",
            "[10:00:01] [Render thread/INFO]: Connecting to play.example.net, 25565",
            "[10:00:02] [Render thread/INFO]: [CHAT] Successfully sold a container worth: $1,500.00!",
        ],
    )
    .unwrap();

    cli(data.path())
        .args(["--json", "analytics", "--snapshot", "--dir"])
        .arg(logs.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Alex@play.example.net"))
        .stdout(predicate::str::contains("\"sold\""));
}

#[test]
fn test_analytics_rejects_bad_dates() {
    let data = tempdir().unwrap();
    cli(data.path())
        .args(["analytics", "--snapshot", "--since", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid since date"));
}

#[test]
fn test_launch_unknown_install_fails() {
    let data = tempdir().unwrap();
    cli(data.path())
        .args(["--json", "launch", "nope"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No install named 'nope'"));
}
