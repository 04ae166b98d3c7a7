//! CLI surface tests for `fp`.

use assert_cmd::Command;
use predicates::prelude::*;

fn fp() -> Command {
    Command::cargo_bin("fp").expect("fp binary builds")
}

#[test]
fn help_lists_subcommands() {
    fp().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn check_config_accepts_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    std::fs::write(
        &path,
        "server_url = \"https://ingest.example.com\"\nbatch_size = 10\n",
    )
    .unwrap();

    fp().arg("check-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("config ok"))
        .stdout(predicate::str::contains("https://ingest.example.com/v1/events"));
}

#[test]
fn check_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    std::fs::write(&path, "batch_size = 0\n").unwrap();

    fp().arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn check_config_rejects_missing_file() {
    fp().arg("check-config")
        .arg("/nonexistent/agent.toml")
        .assert()
        .failure();
}
