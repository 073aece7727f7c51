//! CLI integration tests for sectionlock
//!
//! Tests the sectionlock CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a command with an isolated config directory
#[allow(deprecated)]
fn sectionlock_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sectionlock").unwrap();
    cmd.env("SECTIONLOCK_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    sectionlock_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("shell"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_demo_runs_scenario() {
    let dir = TempDir::new().unwrap();
    sectionlock_cmd(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("already locked by ABCD"))
        .stdout(predicate::str::contains("E301"))
        .stdout(predicate::str::contains("E303"))
        .stdout(predicate::str::contains("Released 3 lock(s)"))
        .stdout(predicate::str::contains("No sections locked"));
}

#[test]
fn test_config_set_get_round_trip() {
    let dir = TempDir::new().unwrap();

    sectionlock_cmd(&dir)
        .args(["config", "set", "events.subscriber_buffer", "16"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set events.subscriber_buffer = 16"));

    assert!(dir.path().join("config.toml").exists());

    sectionlock_cmd(&dir)
        .args(["config", "get", "events.subscriber_buffer"])
        .assert()
        .success()
        .stdout(predicate::str::diff("16\n"));
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();

    sectionlock_cmd(&dir)
        .args(["config", "set", "events.delivery_timeout_ms", "250"])
        .assert()
        .success();

    sectionlock_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("events.delivery_timeout_ms = 250"))
        .stdout(predicate::str::contains("logging.filter = sectionlock=info"));

    sectionlock_cmd(&dir)
        .args(["config", "reset"])
        .assert()
        .success();

    sectionlock_cmd(&dir)
        .args(["config", "get", "events.delivery_timeout_ms"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1000\n"));
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    sectionlock_cmd(&dir)
        .args(["config", "set", "events.lock_ttl", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_shell_rejects_bad_resource() {
    let dir = TempDir::new().unwrap();
    sectionlock_cmd(&dir)
        .args(["shell", "--resource", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid resource ID"));
}
