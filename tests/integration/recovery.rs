//! Recovery behavior: resuming after failures and surviving interruptions.

use std::fs;
use std::path::Path;

use ratchet_cli::engine::UpdateEngine;
use ratchet_cli::progress::{StateFileTracker, UpdateStatus};
use ratchet_cli::staging::backup::backups_root_for;
use ratchet_cli::state::StateStore;
use ratchet_cli::test_utils::{init_test_logging, manifest, ver, FakeSource};
use ratchet_cli::version::ReleaseVersion;
use tempfile::TempDir;

fn engine(source: FakeSource, live: &Path) -> UpdateEngine<FakeSource> {
    UpdateEngine::new(source, live).write_state_file(false)
}

fn mark_installed(live: &Path, version: &str) {
    fs::create_dir_all(live).unwrap();
    StateStore::new(live).save(&ver(version)).unwrap();
}

fn installed_version(live: &Path) -> Option<ReleaseVersion> {
    StateStore::new(live).load().unwrap()
}

#[tokio::test]
async fn rerun_after_a_failed_step_resumes_from_the_marker() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    fs::create_dir_all(&live).unwrap();
    fs::write(live.join("app.py"), "app").unwrap();
    mark_installed(&live, "1.0.0");

    let broken = FakeSource::new()
        .with_manifest(manifest("1.1.0", &["f1.py"], &[], &[], false))
        .with_file("1.1.0", "f1.py", b"one")
        .with_manifest(manifest("1.2.0", &["f2.py"], &[], &[], false))
        .with_failing_file("1.2.0", "f2.py");

    engine(broken, &live).install_or_update(&ver("1.2.0")).await.unwrap_err();
    assert_eq!(installed_version(&live), Some(ver("1.1.0")));

    // Same release history, transfer fixed.
    let fixed = FakeSource::new()
        .with_manifest(manifest("1.1.0", &["f1.py"], &[], &[], false))
        .with_file("1.1.0", "f1.py", b"one")
        .with_manifest(manifest("1.2.0", &["f2.py"], &[], &[], false))
        .with_file("1.2.0", "f2.py", b"two");

    let outcome = engine(fixed, &live).install_or_update(&ver("1.2.0")).await.unwrap();

    // The rerun starts from the marker, not from the original version.
    assert_eq!(outcome.previous, Some(ver("1.1.0")));
    assert_eq!(outcome.steps, vec![ver("1.2.0")]);
    assert_eq!(installed_version(&live), Some(ver("1.2.0")));
    assert_eq!(fs::read_to_string(live.join("f1.py")).unwrap(), "one");
    assert_eq!(fs::read_to_string(live.join("f2.py")).unwrap(), "two");
    assert!(!backups_root_for(&live).exists());
}

#[tokio::test]
async fn interrupted_step_reuses_its_backup_for_rollback() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    fs::create_dir_all(&live).unwrap();
    fs::write(live.join("app.py"), "pristine").unwrap();
    mark_installed(&live, "1.1.0");

    // A previous run snapshotted 1.2.0 and died mid-write, leaving the live
    // file half-mutated.
    let stale_backup = backups_root_for(&live).join("backup_1.2.0");
    fs::create_dir_all(&stale_backup).unwrap();
    fs::write(stale_backup.join("app.py"), "pristine").unwrap();
    fs::write(live.join("app.py"), "half-written").unwrap();

    let source = FakeSource::new()
        .with_manifest(manifest("1.2.0", &["broken.py"], &["app.py"], &[], false))
        .with_file("1.2.0", "app.py", b"new")
        .with_failing_file("1.2.0", "broken.py");

    engine(source, &live).install_or_update(&ver("1.2.0")).await.unwrap_err();

    // The existing backup was reused as-is; a fresh snapshot would have
    // captured (and restored) the half-written file instead.
    assert_eq!(fs::read_to_string(live.join("app.py")).unwrap(), "pristine");
    assert_eq!(installed_version(&live), Some(ver("1.1.0")));
}

#[tokio::test]
async fn state_file_records_a_rolled_back_run() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");
    fs::create_dir_all(&live).unwrap();
    fs::write(live.join("app.py"), "app").unwrap();
    mark_installed(&live, "1.0.0");

    let source = FakeSource::new()
        .with_manifest(manifest("1.1.0", &["broken.py"], &[], &[], false))
        .with_failing_file("1.1.0", "broken.py");

    // State tracking stays on for this engine.
    UpdateEngine::new(source, &live).install_or_update(&ver("1.1.0")).await.unwrap_err();

    let record = StateFileTracker::load(&live).unwrap().unwrap();
    assert_eq!(record.status, UpdateStatus::RolledBack);
    assert_eq!(record.from_version.as_deref(), Some("1.0.0"));
    assert_eq!(record.target_version, "1.1.0");
    assert_eq!(record.steps_total, 1);
    assert_eq!(record.steps_completed, 0);
    assert!(record.error.is_some());
}

#[tokio::test]
async fn state_file_records_a_failed_fresh_install() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("app");

    let source = FakeSource::new()
        .with_manifest(manifest("1.0.0", &["app.py"], &[], &[], false))
        .with_failing_file("1.0.0", "app.py");

    UpdateEngine::new(source, &live).install_or_update(&ver("1.0.0")).await.unwrap_err();

    // Nothing was installed, but the state file tells what happened.
    assert_eq!(installed_version(&live), None);
    assert!(!live.join("app.py").exists());

    let record = StateFileTracker::load(&live).unwrap().unwrap();
    assert_eq!(record.status, UpdateStatus::Failed);
    assert_eq!(record.from_version, None);
    assert_eq!(record.target_version, "1.0.0");
}
