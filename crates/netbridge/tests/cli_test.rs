//! Integration tests for the `netbridge` CLI binary.
//!
//! Everything here runs without a NetworkBridge backend: argument parsing,
//! completions, config round-trips in a scratch directory, and the
//! offline path of the dashboard.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `netbridge` binary with env isolation.
///
/// Clears all `NETBRIDGE_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn netbridge_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netbridge");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("NETBRIDGE_PROFILE")
        .env_remove("NETBRIDGE_API_URL")
        .env_remove("NETBRIDGE_TOKEN")
        .env_remove("NETBRIDGE_OUTPUT");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = netbridge_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("NetworkBridge")
            .and(predicate::str::contains("events"))
            .and(predicate::str::contains("dashboard"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netbridge"));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("netbridge"));
}

// ── Events ──────────────────────────────────────────────────────────

#[test]
fn test_event_types_plain() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["events", "types", "-o", "plain"])
        .assert()
        .success()
        .stdout("router_status\nvoucher_activated\nincome_recorded\ndashboard_stats\n");
}

#[test]
fn test_unknown_event_type_is_usage_error() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args([
            "events",
            "watch",
            "--types",
            "router_status,bogus",
            "--api-url",
            "http://127.0.0.1:1/api/",
            "--token",
            "t",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn test_watch_without_config_is_not_found() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["events", "watch"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_watch_with_unknown_profile_is_not_found() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["-p", "nowhere", "events", "watch"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_profile_without_token_is_auth_error() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["config", "set", "api_url", "http://127.0.0.1:1/api/"])
        .assert()
        .success();
    netbridge_cmd(&home)
        .args(["config", "set", "token_env", "NETBRIDGE_TEST_UNSET_TOKEN"])
        .assert()
        .success();

    // An unreachable keyring falls through to the missing-token error.
    netbridge_cmd(&home)
        .env_remove("NETBRIDGE_TEST_UNSET_TOKEN")
        .args(["events", "watch"])
        .assert()
        .code(3);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_set_then_show_masks_token() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["config", "set", "api_url", "https://bridge.example.com/api/"])
        .assert()
        .success();
    netbridge_cmd(&home)
        .args(["config", "set", "token", "super-secret-token"])
        .assert()
        .success();

    netbridge_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://bridge.example.com/api/")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("super-secret-token").not()),
        );

    netbridge_cmd(&home)
        .args(["config", "show", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-token").not());
}

#[test]
fn test_config_profiles_and_use() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["-p", "lab", "config", "set", "api_url", "http://10.0.2.2:8080/api/"])
        .assert()
        .success();
    netbridge_cmd(&home)
        .args(["config", "set", "api_url", "https://bridge.example.com/api/"])
        .assert()
        .success();

    netbridge_cmd(&home)
        .args(["config", "profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout("default\nlab\n");

    netbridge_cmd(&home)
        .args(["config", "use", "lab"])
        .assert()
        .success();
    netbridge_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile = \"lab\""));
}

#[test]
fn test_config_use_unknown_profile() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["config", "use", "missing"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn test_config_set_rejects_bad_values() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args(["config", "set", "api_url", "ftp://bridge.example.com/"])
        .assert()
        .code(2);
    netbridge_cmd(&home)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_malformed_config_is_reported() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".config").join("netbridge");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[profiles.home\napi_url = ").unwrap();

    netbridge_cmd(&home)
        .args(["events", "watch"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("Configuration error")
                .and(predicate::str::contains("Configuration file not found").not()),
        );
    netbridge_cmd(&home)
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

// ── Dashboard ───────────────────────────────────────────────────────

#[test]
fn test_dashboard_once_gives_up_offline() {
    let home = TempDir::new().unwrap();
    netbridge_cmd(&home)
        .args([
            "dashboard",
            "--once",
            "--wait",
            "1",
            "-o",
            "plain",
            "--api-url",
            "http://127.0.0.1:1/api/",
            "--token",
            "t",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout("offline\n");
}
