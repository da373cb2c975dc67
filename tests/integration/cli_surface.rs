//! Black-box tests against the compiled `ratchet` binary.
//!
//! Network-facing commands point at an unroutable middleware URL through a
//! config file, so they exercise argument parsing and error paths without
//! ever leaving the machine.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ratchet() -> Command {
    Command::cargo_bin("ratchet").unwrap()
}

/// Config pointing at a port nothing listens on.
fn unreachable_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        "middleware_url = \"http://127.0.0.1:9\"\nrequest_timeout_secs = 1\n",
    )
    .unwrap();
    path
}

#[test]
fn help_lists_every_command() {
    ratchet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn version_flag_reports_the_package_version() {
    ratchet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn status_reports_an_empty_directory() {
    let temp = TempDir::new().unwrap();

    ratchet()
        .args(["status", "--install-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No installed version found"))
        .stdout(predicate::str::contains("No update has run yet"));
}

#[test]
fn status_reports_the_marker_and_the_last_run() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("version.txt"), "1.4.2\n").unwrap();
    fs::write(
        temp.path().join("update_state.json"),
        r#"{
            "update_id": "update_20260821_100000",
            "status": "completed",
            "started_at": "2026-08-21T10:00:00Z",
            "updated_at": "2026-08-21T10:00:40Z",
            "from_version": "1.4.0",
            "target_version": "1.4.2",
            "steps_total": 2,
            "steps_completed": 2,
            "current_step": null,
            "message": "Update to 1.4.2 complete",
            "error": null
        }"#,
    )
    .unwrap();

    ratchet()
        .args(["status", "--install-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed version: 1.4.2"))
        .stdout(predicate::str::contains("1.4.0 -> 1.4.2"))
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("2/2 step(s)"));
}

#[test]
fn update_fails_cleanly_when_the_middleware_is_unreachable() {
    let temp = TempDir::new().unwrap();
    let config = unreachable_config(temp.path());
    let install = temp.path().join("app");

    ratchet()
        .env("RATCHET_HOME", temp.path())
        .args(["update", "1.0.0", "--yes", "--config"])
        .arg(&config)
        .arg("--install-dir")
        .arg(&install)
        .assert()
        .failure()
        .code(1);

    // Nothing was created on the failed run.
    assert!(!install.exists());
}

#[test]
fn check_fails_cleanly_when_the_middleware_is_unreachable() {
    let temp = TempDir::new().unwrap();
    let config = unreachable_config(temp.path());

    ratchet()
        .env("RATCHET_HOME", temp.path())
        .args(["check", "--no-cache", "--config"])
        .arg(&config)
        .arg("--install-dir")
        .arg(temp.path())
        .assert()
        .failure()
        .code(1);
}

#[test]
fn list_fails_cleanly_when_the_middleware_is_unreachable() {
    let temp = TempDir::new().unwrap();
    let config = unreachable_config(temp.path());

    ratchet()
        .env("RATCHET_HOME", temp.path())
        .args(["list", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn conflicting_verbosity_flags_are_rejected() {
    ratchet().args(["--verbose", "--quiet", "list"]).assert().failure();
}

#[test]
fn unknown_flags_are_rejected() {
    ratchet().args(["update", "--bogus"]).assert().failure();
}
