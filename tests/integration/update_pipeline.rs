//! Full update runs against a real installation directory.

use std::fs;
use std::path::{Path, PathBuf};

use ratchet_cli::core::RatchetError;
use ratchet_cli::engine::UpdateEngine;
use ratchet_cli::staging::backup::backups_root_for;
use ratchet_cli::state::StateStore;
use ratchet_cli::test_utils::{init_test_logging, manifest, ver, FakeSource};
use ratchet_cli::version::ReleaseVersion;
use tempfile::TempDir;

fn engine(source: FakeSource, live: &Path) -> UpdateEngine<FakeSource> {
    UpdateEngine::new(source, live).write_state_file(false)
}

fn seed_file(live: &Path, path: &str, content: &str) {
    let full = live.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

fn mark_installed(live: &Path, version: &str) {
    fs::create_dir_all(live).unwrap();
    StateStore::new(live).save(&ver(version)).unwrap();
}

fn installed_version(live: &Path) -> Option<ReleaseVersion> {
    StateStore::new(live).load().unwrap()
}

fn read(live: &Path, path: &str) -> String {
    fs::read_to_string(live.join(path)).unwrap()
}

#[tokio::test]
async fn multi_step_update_applies_each_manifest_in_order() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    seed_file(&live, "app.py", "app 1.0.0");
    seed_file(&live, "legacy.py", "old");
    seed_file(&live, "lib/util.py", "util");
    mark_installed(&live, "1.0.0");

    // 1.0.0 -> 2.1.3 walks the major first, then minors, then patches.
    let steps = ["2.0.0", "2.1.0", "2.1.1", "2.1.2", "2.1.3"];
    let mut source = FakeSource::new();
    for step in steps {
        let marker = format!("steps/{step}.txt");
        let deletes: &[&str] = if step == "2.0.0" { &["legacy.py"] } else { &[] };
        source = source
            .with_manifest(manifest(step, &[&marker], &["app.py"], deletes, false))
            .with_file(step, &marker, step.as_bytes())
            .with_file(step, "app.py", format!("app {step}").as_bytes());
    }

    let outcome = engine(source, &live).install_or_update(&ver("2.1.3")).await.unwrap();

    assert_eq!(outcome.previous, Some(ver("1.0.0")));
    assert_eq!(outcome.installed, ver("2.1.3"));
    let walked: Vec<ReleaseVersion> = steps.iter().map(|s| ver(s)).collect();
    assert_eq!(outcome.steps, walked);
    assert!(!outcome.was_fresh_install());

    assert_eq!(installed_version(&live), Some(ver("2.1.3")));
    assert_eq!(read(&live, "app.py"), "app 2.1.3");
    for step in steps {
        assert_eq!(read(&live, &format!("steps/{step}.txt")), step);
    }
    assert!(!live.join("legacy.py").exists());
    assert_eq!(read(&live, "lib/util.py"), "util");

    // Every step committed, so no backups are kept around.
    assert!(!backups_root_for(&live).exists());
}

#[tokio::test]
async fn fresh_install_assembles_a_nested_payload() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");

    let source = FakeSource::new()
        .with_manifest(manifest(
            "1.2.0",
            &["bin/app.py", "lib/util/helpers.py", "assets/data.json"],
            &["README.md"],
            &[],
            false,
        ))
        .with_file("1.2.0", "bin/app.py", b"entry")
        .with_file("1.2.0", "lib/util/helpers.py", b"helpers")
        .with_file("1.2.0", "assets/data.json", b"{}")
        .with_file("1.2.0", "README.md", b"readme");

    let outcome = engine(source, &live).install_or_update(&ver("1.2.0")).await.unwrap();

    assert!(outcome.was_fresh_install());
    assert_eq!(outcome.previous, None);
    assert_eq!(outcome.steps, vec![ver("1.2.0")]);

    assert_eq!(installed_version(&live), Some(ver("1.2.0")));
    assert_eq!(read(&live, "bin/app.py"), "entry");
    assert_eq!(read(&live, "lib/util/helpers.py"), "helpers");
    assert_eq!(read(&live, "README.md"), "readme");

    // The staging sibling was promoted, not left behind.
    let staging: PathBuf = temp.path().join("app.staging");
    assert!(!staging.exists());
}

#[tokio::test]
async fn mid_path_failure_keeps_earlier_steps_committed() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    seed_file(&live, "app.py", "app");
    mark_installed(&live, "1.0.0");

    let source = FakeSource::new()
        .with_manifest(manifest("1.1.0", &["f1.py"], &[], &[], false))
        .with_file("1.1.0", "f1.py", b"one")
        .with_manifest(manifest("1.2.0", &["extra.py", "broken.py"], &[], &[], false))
        .with_file("1.2.0", "extra.py", b"extra")
        .with_failing_file("1.2.0", "broken.py");

    let error = engine(source, &live).install_or_update(&ver("1.2.0")).await.unwrap_err();

    let ratchet = error.downcast_ref::<RatchetError>().unwrap();
    assert_eq!(ratchet.exit_code(), 2);
    assert!(matches!(ratchet, RatchetError::StepFailed { .. }));

    // 1.1.0 committed and stays committed; 1.2.0 was rolled back whole.
    assert_eq!(installed_version(&live), Some(ver("1.1.0")));
    assert_eq!(read(&live, "f1.py"), "one");
    assert!(!live.join("extra.py").exists());
    assert!(!live.join("broken.py").exists());

    // The failed step's backup is kept for inspection.
    assert!(backups_root_for(&live).join("backup_1.2.0").exists());
}

#[tokio::test]
async fn rollback_leaves_user_data_alone() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    seed_file(&live, "app.py", "v1");
    seed_file(&live, "user_data/notes.db", "precious");
    seed_file(&live, "logs/app.log", "log line");
    mark_installed(&live, "1.0.0");

    let source = FakeSource::new()
        .with_manifest(manifest("1.1.0", &["data.py", "broken.py"], &["app.py"], &[], false))
        .with_file("1.1.0", "app.py", b"v2")
        .with_file("1.1.0", "data.py", b"data")
        .with_failing_file("1.1.0", "broken.py");

    let error = engine(source, &live).install_or_update(&ver("1.1.0")).await.unwrap_err();
    assert_eq!(error.downcast_ref::<RatchetError>().unwrap().exit_code(), 2);

    // The half-applied step was reverted file for file.
    assert_eq!(read(&live, "app.py"), "v1");
    assert!(!live.join("data.py").exists());

    // Protected paths were neither snapshotted nor touched by the restore.
    assert_eq!(read(&live, "user_data/notes.db"), "precious");
    assert_eq!(read(&live, "logs/app.log"), "log line");
    let backup = backups_root_for(&live).join("backup_1.1.0");
    assert!(backup.exists());
    assert!(!backup.join("user_data").exists());
}
