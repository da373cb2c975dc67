//! The staged update engine.
//!
//! This module orchestrates everything the other modules provide: it decides
//! between a fresh install and an update, computes the sequence of
//! intermediate versions, and applies one version step at a time with a
//! backup taken before each step and a rollback after any failure.
//!
//! # Update Process Flow
//!
//! ```text
//! install_or_update(target)
//!    ├── no version marker → fresh install
//!    │      ├── fetch manifest, validate against exclusion rules
//!    │      ├── download everything into a staging directory
//!    │      ├── install dependencies into staging when required
//!    │      └── promote staging, persist the version marker
//!    │
//!    └── version marker present → staged update
//!           ├── classify target (same, older, patch/minor/major)
//!           ├── compute the intermediate version path
//!           └── for each step version, in order:
//!                  ├── fetch manifest, validate against exclusion rules
//!                  ├── snapshot the live directory
//!                  ├── delete, then add, then edit, then dependencies
//!                  ├── all operations succeeded → persist version marker
//!                  └── any operation failed → restore snapshot, abort
//! ```
//!
//! # Failure Semantics
//!
//! Within one step every operation is attempted and failures are collected,
//! so the error lists everything that went wrong, not just the first thing.
//! Across steps the engine is strictly fail-fast: a failed step aborts the
//! remaining path after rolling the live directory back to its pre-step
//! state. The version marker only ever advances after a fully committed
//! step, which makes re-running the updater the universal recovery action.
//!
//! Step backups accumulate under a sibling `.backups` directory and are
//! removed only after the whole run succeeds; after a failure they stay on
//! disk for inspection.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ratchet_cli::engine::UpdateEngine;
//! use ratchet_cli::source::MiddlewareClient;
//! use ratchet_cli::version::ReleaseVersion;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = MiddlewareClient::new("http://localhost:8000", None, Duration::from_secs(30))?;
//! let engine = UpdateEngine::new(source, "/opt/my-app");
//!
//! let outcome = engine.install_or_update(&ReleaseVersion::parse("2.1.3")?).await?;
//! println!("installed {}", outcome.installed);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::Path;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_DOWNLOADS, REQUIREMENTS_FILE, dependency_install_timeout,
};
use crate::core::RatchetError;
use crate::manifest::Manifest;
use crate::paths::{ExclusionRules, RelativePath};
use crate::progress::{StateFileTracker, UpdateProgress};
use crate::source::ReleaseSource;
use crate::staging::{BackupSnapshot, StagingArea};
use crate::state::StateStore;
use crate::utils::fs::atomic_write;
use crate::version::{ReleaseVersion, UpdateKind, path_between};

/// What an engine run accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Version installed before the run, absent for fresh installs.
    pub previous: Option<ReleaseVersion>,
    /// Version installed when the run finished.
    pub installed: ReleaseVersion,
    /// Versions applied as discrete steps, in order.
    pub steps: Vec<ReleaseVersion>,
}

impl UpdateOutcome {
    /// Whether the run installed from scratch rather than updating.
    pub const fn was_fresh_install(&self) -> bool {
        self.previous.is_none()
    }
}

/// Orchestrates installs and staged updates against one installation.
///
/// The engine owns no in-memory state between runs; everything it needs to
/// resume after an interruption lives on disk (the version marker, step
/// backups, the staging directory). Construct it, call
/// [`install_or_update`](Self::install_or_update), and drop it.
pub struct UpdateEngine<S> {
    source: S,
    state: StateStore,
    rules: ExclusionRules,
    max_concurrent_downloads: usize,
    dependency_install_command: Option<Vec<String>>,
    skip_dependencies: bool,
    track_state_file: bool,
}

impl<S: ReleaseSource> UpdateEngine<S> {
    /// Creates an engine for the installation at `install_dir`.
    ///
    /// Starts with the default exclusion rules, the default download
    /// concurrency, no dependency install command, and state file tracking
    /// enabled. Use the builder methods to adjust.
    pub fn new(source: S, install_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            source,
            state: StateStore::new(install_dir),
            rules: ExclusionRules::default(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            dependency_install_command: None,
            skip_dependencies: false,
            track_state_file: true,
        }
    }

    /// Replaces the exclusion rule set.
    pub fn with_exclusions(mut self, rules: ExclusionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Caps how many file downloads run at once within a phase.
    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = limit;
        self
    }

    /// Sets the command used to install dependencies.
    ///
    /// The downloaded requirements file path is appended as the final
    /// argument. With `None`, steps that request a dependency install are
    /// logged and skipped.
    pub fn dependency_install_command(mut self, command: Option<Vec<String>>) -> Self {
        self.dependency_install_command = command;
        self
    }

    /// Skips dependency installation even when a manifest requests it.
    pub fn skip_dependencies(mut self, skip: bool) -> Self {
        self.skip_dependencies = skip;
        self
    }

    /// Controls whether progress is mirrored into the on-disk state file.
    pub fn write_state_file(mut self, track: bool) -> Self {
        self.track_state_file = track;
        self
    }

    /// The installation directory this engine operates on.
    pub fn install_dir(&self) -> &Path {
        self.state.install_dir()
    }

    /// Installs `target` from scratch or updates the installation to it.
    ///
    /// A missing version marker selects the fresh-install path; otherwise the
    /// engine walks every intermediate version between the installed one and
    /// `target`, applying each as its own backed-up step.
    ///
    /// # Errors
    ///
    /// - [`RatchetError::AlreadyUpToDate`] / [`RatchetError::DowngradeRejected`]
    ///   when `target` is not newer than the installed version.
    /// - [`RatchetError::InstallationStateCorrupt`] when the version marker
    ///   exists but cannot be read.
    /// - [`RatchetError::InstallFailed`] when a fresh install fails; nothing
    ///   was written to the installation directory.
    /// - [`RatchetError::StepFailed`] when an update step failed and the
    ///   installation was rolled back to the last good version.
    /// - [`RatchetError::RollbackFailed`] when the rollback itself failed and
    ///   the installation needs manual attention.
    pub async fn install_or_update(&self, target: &ReleaseVersion) -> Result<UpdateOutcome> {
        let current = self.state.load()?;

        let (previous, steps) = match current {
            None => (None, vec![*target]),
            Some(current) => {
                match target.update_kind_from(&current) {
                    UpdateKind::Same => {
                        return Err(RatchetError::AlreadyUpToDate {
                            version: current.to_string(),
                        }
                        .into());
                    }
                    UpdateKind::Invalid => {
                        return Err(RatchetError::DowngradeRejected {
                            current: current.to_string(),
                            requested: target.to_string(),
                        }
                        .into());
                    }
                    UpdateKind::Major | UpdateKind::Minor | UpdateKind::Patch => {}
                }
                (Some(current), path_between(&current, target))
            }
        };

        let tracker = self.tracker_for(previous.as_ref(), target, steps.len());
        let mut progress = UpdateProgress::begin(tracker, target, steps.len()).await;

        let result = match previous {
            None => self.fresh_install(target, &mut progress).await,
            Some(current) => self.run_steps(&current, target, &steps, &mut progress).await,
        };

        match result {
            Ok(outcome) => {
                progress.finish_success(target).await;
                Ok(outcome)
            }
            Err(e) => {
                // Rolled-back steps already recorded their outcome.
                let rolled_back = matches!(
                    e.downcast_ref::<RatchetError>(),
                    Some(RatchetError::StepFailed { .. })
                );
                if !rolled_back {
                    progress.finish_failure(&format!("{e:#}")).await;
                }
                Err(e)
            }
        }
    }

    /// Assembles the whole release in staging, then promotes it.
    async fn fresh_install(
        &self,
        target: &ReleaseVersion,
        progress: &mut UpdateProgress,
    ) -> Result<UpdateOutcome> {
        let live_dir = self.state.install_dir();
        info!("No installed version at {}, installing {target} fresh", live_dir.display());

        let manifest = self.source.fetch_manifest(target).await?;
        manifest.ensure_allowed(&self.rules)?;
        progress.step_started(target, manifest.operation_count()).await;

        if !manifest.files_delete().is_empty() {
            // Nothing exists yet, so delete entries already hold.
            debug!(
                "Ignoring {} delete entrie(s) during fresh install",
                manifest.files_delete().len()
            );
        }

        let staging = StagingArea::create(live_dir)?;

        let to_fetch: Vec<RelativePath> =
            manifest.files_add().iter().chain(manifest.files_edit()).cloned().collect();
        progress.phase(&format!("Downloading {} file(s)", to_fetch.len())).await;
        let mut failures =
            self.download_into(target, &to_fetch, staging.path(), "download", progress).await;

        if failures.is_empty() && manifest.requires_dependency_install() {
            if self.skip_dependencies {
                info!("Dependency installation disabled, skipping for {target}");
            } else {
                progress.phase("Installing dependencies").await;
                if let Err(reason) =
                    self.install_dependencies(target, staging.path(), progress).await
                {
                    failures.push(reason);
                }
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                error!("{failure}");
            }
            if let Err(e) = staging.discard() {
                warn!("Failed to remove staging directory: {e:#}");
            }
            return Err(RatchetError::InstallFailed {
                version: target.to_string(),
                failures,
            }
            .into());
        }

        progress.phase("Promoting staged files").await;
        staging.commit()?;
        self.state.save(target)?;
        info!("Fresh install of {target} complete");

        Ok(UpdateOutcome {
            previous: None,
            installed: *target,
            steps: vec![*target],
        })
    }

    /// Applies each intermediate version as a backed-up, all-or-nothing step.
    async fn run_steps(
        &self,
        current: &ReleaseVersion,
        target: &ReleaseVersion,
        steps: &[ReleaseVersion],
        progress: &mut UpdateProgress,
    ) -> Result<UpdateOutcome> {
        let live_dir = self.state.install_dir();
        info!(
            "Updating {} from {current} to {target} in {} step(s)",
            live_dir.display(),
            steps.len()
        );

        for (index, version) in steps.iter().enumerate() {
            debug!("Step {}/{} targets {version}", index + 1, steps.len());

            let manifest = self.source.fetch_manifest(version).await?;
            manifest.ensure_allowed(&self.rules)?;
            progress.step_started(version, manifest.operation_count()).await;

            let snapshot = BackupSnapshot::create(live_dir, version, &self.rules).await?;
            let failures = self.apply_step(&manifest, progress).await;

            if failures.is_empty() {
                self.state.save(version)?;
                progress.step_completed(version).await;
                info!("Step {}/{} committed, now at {version}", index + 1, steps.len());
                continue;
            }

            for failure in &failures {
                error!("{failure}");
            }
            warn!("Step {version} failed, restoring from backup");
            snapshot.restore().await?;
            progress
                .step_rolled_back(version, &format!("{} operation(s) failed", failures.len()))
                .await;

            return Err(RatchetError::StepFailed {
                version: version.to_string(),
                failures,
            }
            .into());
        }

        if let Err(e) = BackupSnapshot::cleanup_all(live_dir) {
            warn!("Failed to remove step backups: {e:#}");
        }

        Ok(UpdateOutcome {
            previous: Some(*current),
            installed: *target,
            steps: steps.to_vec(),
        })
    }

    /// Runs one manifest against the live directory, collecting failures.
    ///
    /// Deletes go first so a path moved between directories frees its old
    /// name before the new one arrives, then adds, then edits, then the
    /// optional dependency install. Every operation is attempted even after
    /// earlier ones failed; the caller decides what the failures mean.
    async fn apply_step(&self, manifest: &Manifest, progress: &mut UpdateProgress) -> Vec<String> {
        let live_dir = self.state.install_dir();
        let version = manifest.version();
        let mut failures = Vec::new();

        if !manifest.files_delete().is_empty() {
            progress.phase(&format!("Deleting {} file(s)", manifest.files_delete().len())).await;
            for path in manifest.files_delete() {
                progress.detail(format!("deleting {path}"));
                if let Err(reason) = delete_path(live_dir, path) {
                    failures.push(reason);
                }
            }
        }

        if !manifest.files_add().is_empty() {
            progress.phase(&format!("Adding {} file(s)", manifest.files_add().len())).await;
            failures.extend(
                self.download_into(&version, manifest.files_add(), live_dir, "add", progress)
                    .await,
            );
        }

        if !manifest.files_edit().is_empty() {
            progress.phase(&format!("Updating {} file(s)", manifest.files_edit().len())).await;
            failures.extend(
                self.download_into(&version, manifest.files_edit(), live_dir, "update", progress)
                    .await,
            );
        }

        if manifest.requires_dependency_install() {
            if self.skip_dependencies {
                info!("Dependency installation disabled, skipping for {version}");
            } else {
                progress.phase("Installing dependencies").await;
                if let Err(reason) = self.install_dependencies(&version, live_dir, progress).await {
                    failures.push(reason);
                }
            }
        }

        failures
    }

    /// Downloads `paths` into `dest` concurrently, returning one failure
    /// description per file that could not be fetched or written.
    ///
    /// All downloads are driven to completion before this returns, so a
    /// partial batch never decides anything on its own.
    async fn download_into(
        &self,
        version: &ReleaseVersion,
        paths: &[RelativePath],
        dest: &Path,
        verb: &str,
        progress: &UpdateProgress,
    ) -> Vec<String> {
        let concurrency = self.max_concurrent_downloads.max(1);

        stream::iter(paths)
            .map(|path| async move {
                progress.detail(format!("downloading {path}"));
                match self.fetch_to(version, path, dest).await {
                    Ok(()) => None,
                    Err(e) => Some(format!("{verb} {path}: {e:#}")),
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|failure| async move { failure })
            .collect()
            .await
    }

    async fn fetch_to(
        &self,
        version: &ReleaseVersion,
        path: &RelativePath,
        dest: &Path,
    ) -> Result<()> {
        let bytes = self.source.fetch_file(version, path).await?;
        atomic_write(&path.join_under(dest), &bytes)?;
        debug!("Wrote {path} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Downloads the requirements file into `dest` and runs the configured
    /// install command with the file path appended.
    async fn install_dependencies(
        &self,
        version: &ReleaseVersion,
        dest: &Path,
        progress: &UpdateProgress,
    ) -> std::result::Result<(), String> {
        let Some(command) = &self.dependency_install_command else {
            warn!(
                "Release {version} requests a dependency install but no \
                 dependency_install_command is configured, skipping"
            );
            return Ok(());
        };
        let Some((program, args)) = command.split_first() else {
            return Err("dependency install: configured command is empty".to_string());
        };

        progress.detail(format!("downloading {REQUIREMENTS_FILE}"));
        let requirements = RelativePath::new(REQUIREMENTS_FILE)
            .map_err(|e| format!("dependency install: {e:#}"))?;
        self.fetch_to(version, &requirements, dest)
            .await
            .map_err(|e| format!("dependency install: {REQUIREMENTS_FILE}: {e:#}"))?;

        let requirements_path = requirements.join_under(dest);
        info!("Installing dependencies via {program}");
        progress.detail("installing dependencies");

        let mut cmd = Command::new(program);
        cmd.args(args).arg(&requirements_path).current_dir(dest);
        // A timed-out installer must not keep running behind our back.
        cmd.kill_on_drop(true);

        let timeout = dependency_install_timeout();
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(format!("dependency install: failed to run {program}: {e}"));
            }
            Err(_) => {
                return Err(format!(
                    "dependency install: timed out after {}s",
                    timeout.as_secs()
                ));
            }
        };

        if output.status.success() {
            info!("Dependencies installed");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "dependency install: {program} exited with {}: {}",
                output.status,
                tail_of(&stderr, 5)
            ))
        }
    }

    fn tracker_for(
        &self,
        from: Option<&ReleaseVersion>,
        target: &ReleaseVersion,
        steps_total: usize,
    ) -> Option<StateFileTracker> {
        self.track_state_file
            .then(|| StateFileTracker::create(self.state.install_dir(), from, target, steps_total))
    }
}

/// Removes the file or directory at `path` under `live_dir`.
///
/// A missing path is a success: the goal state is already reached, which is
/// exactly what happens when a step is retried after a partial run.
fn delete_path(live_dir: &Path, path: &RelativePath) -> std::result::Result<(), String> {
    let target = path.join_under(live_dir);
    match std::fs::symlink_metadata(&target) {
        Ok(meta) => {
            let result = if meta.is_dir() {
                crate::utils::fs::remove_dir_all(&target)
            } else {
                std::fs::remove_file(&target).map_err(Into::into)
            };
            result.map_err(|e| format!("delete {path}: {e:#}"))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Nothing to delete at {path}");
            Ok(())
        }
        Err(e) => Err(format!("delete {path}: {e}")),
    }
}

/// Last `max_lines` lines of `text`, flattened for single-line reports.
fn tail_of(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("; ")
}
