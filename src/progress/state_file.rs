//! Machine-readable progress state persisted during update runs.
//!
//! Other processes (a supervising launcher, a UI) watch the file
//! `update_state.json` inside the installation directory to follow an update
//! without parsing terminal output. Writes are guarded by an OS-level file
//! lock on a sibling `.lock` file so a reader re-writing its own state can
//! never interleave with the updater, and the JSON itself is replaced
//! atomically so readers never observe a torn document.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, state_lock_timeout};
use crate::utils::fs::{read_json_file, write_json_file};
use crate::version::ReleaseVersion;

/// Name of the progress state file inside an installation directory.
pub const STATE_FILE: &str = "update_state.json";

/// Full path of the progress state file for an installation.
pub fn state_file_path(install_dir: &Path) -> PathBuf {
    install_dir.join(STATE_FILE)
}

/// Overall outcome of an update run as recorded in the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// The run is still in flight.
    Running,
    /// Every step committed.
    Completed,
    /// The run aborted before or between mutations; nothing was rolled back.
    Failed,
    /// A step failed and the installation was restored from backup.
    RolledBack,
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of one update run's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStateRecord {
    /// Identifier of this run, derived from its start time.
    pub update_id: String,
    /// Current status of the run.
    pub status: UpdateStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When this record was last rewritten.
    pub updated_at: DateTime<Utc>,
    /// Version installed before the run, if any.
    pub from_version: Option<String>,
    /// Version the run is heading for.
    pub target_version: String,
    /// Number of steps in the planned path.
    pub steps_total: usize,
    /// Steps committed so far.
    pub steps_completed: usize,
    /// Step currently being applied.
    pub current_step: Option<String>,
    /// Human-readable description of what is happening right now.
    pub message: String,
    /// Failure description once the run stops abnormally.
    pub error: Option<String>,
}

/// Exclusive lock over the state file, held only for the duration of a write.
///
/// Uses non-blocking lock attempts with exponential backoff, wrapped in
/// `spawn_blocking` so lock waits never stall the async runtime.
#[derive(Debug)]
struct StateLock {
    /// The file handle - lock is released when this is dropped.
    _file: Arc<std::fs::File>,
    lock_path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(error = %e, "Failed to remove state lock file");
            }
        }
    }
}

impl StateLock {
    async fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path.to_path_buf();

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        let file = Arc::new(file);
        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let file_clone = Arc::clone(&file);
            let lock_result = tokio::task::spawn_blocking(move || file_clone.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            match lock_result {
                Ok(true) => {
                    debug!(
                        wait_ms = start.elapsed().as_millis(),
                        "State file lock acquired"
                    );
                    return Ok(Self {
                        _file: file,
                        lock_path,
                    });
                }
                Ok(false) | Err(_) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return Err(anyhow::anyhow!(
                            "Timeout acquiring state file lock after {timeout:?}"
                        ));
                    }
                    tokio::time::sleep(delay.min(remaining)).await;
                }
            }
        }

        Err(anyhow::anyhow!("Timeout acquiring state file lock after {timeout:?}"))
    }
}

/// Writes progress milestones into the state file as a run advances.
#[derive(Debug)]
pub struct StateFileTracker {
    state_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    record: UpdateStateRecord,
}

impl StateFileTracker {
    /// Prepares a tracker for a run toward `target`. Nothing is written until
    /// [`begin`](Self::begin).
    pub fn create(
        install_dir: &Path,
        from: Option<&ReleaseVersion>,
        target: &ReleaseVersion,
        steps_total: usize,
    ) -> Self {
        let state_path = state_file_path(install_dir);
        let lock_path = state_path.with_extension("lock");
        let now = Utc::now();

        Self {
            state_path,
            lock_path,
            lock_timeout: state_lock_timeout(),
            record: UpdateStateRecord {
                update_id: format!("update_{}", now.timestamp()),
                status: UpdateStatus::Running,
                started_at: now,
                updated_at: now,
                from_version: from.map(ToString::to_string),
                target_version: target.to_string(),
                steps_total,
                steps_completed: 0,
                current_step: None,
                message: "Preparing update".to_string(),
                error: None,
            },
        }
    }

    /// Writes the initial record.
    pub async fn begin(&mut self) -> Result<()> {
        self.write().await
    }

    /// Records that a step began.
    pub async fn step_started(&mut self, version: &ReleaseVersion, operations: usize) -> Result<()> {
        self.record.current_step = Some(version.to_string());
        self.record.message = format!("Applying {version} ({operations} operation(s))");
        self.write().await
    }

    /// Updates the free-text progress message.
    pub async fn set_message(&mut self, message: &str) -> Result<()> {
        self.record.message = message.to_string();
        self.write().await
    }

    /// Records that a step committed.
    pub async fn step_completed(&mut self, version: &ReleaseVersion) -> Result<()> {
        self.record.steps_completed += 1;
        self.record.message = format!("Committed {version}");
        self.write().await
    }

    /// Records a successful end of the whole run.
    pub async fn mark_completed(&mut self, version: &ReleaseVersion) -> Result<()> {
        self.record.status = UpdateStatus::Completed;
        self.record.current_step = None;
        self.record.message = format!("Update to {version} complete");
        self.write().await
    }

    /// Records an abort that did not require a rollback.
    pub async fn mark_failed(&mut self, error: &str) -> Result<()> {
        self.record.status = UpdateStatus::Failed;
        self.record.error = Some(error.to_string());
        self.record.message = "Update failed".to_string();
        self.write().await
    }

    /// Records a failed step whose changes were restored from backup.
    pub async fn mark_rolled_back(&mut self, version: &ReleaseVersion, error: &str) -> Result<()> {
        self.record.status = UpdateStatus::RolledBack;
        self.record.error = Some(error.to_string());
        self.record.message = format!("Step {version} failed, restored from backup");
        self.write().await
    }

    /// The record as it would currently be written.
    pub fn record(&self) -> &UpdateStateRecord {
        &self.record
    }

    async fn write(&mut self) -> Result<()> {
        self.record.updated_at = Utc::now();
        // On a fresh install the installation directory may not exist yet,
        // and the lock file needs somewhere to live.
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let _lock = StateLock::acquire(&self.lock_path, self.lock_timeout).await?;
        write_json_file(&self.state_path, &self.record)
    }

    /// Reads the most recent record for an installation, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(install_dir: &Path) -> Result<Option<UpdateStateRecord>> {
        let path = state_file_path(install_dir);
        if !path.exists() {
            return Ok(None);
        }
        read_json_file(&path).map(Some)
    }
}
