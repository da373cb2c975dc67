//! Per-step backup snapshots of the live installation.
//!
//! Before an update step mutates anything, the whole non-protected portion of
//! the installation is copied into a backup directory named after the step
//! version. Restoring mirrors that snapshot back: every backed-up file comes
//! back byte for byte, and non-protected files the failed step added are
//! removed, so the live tree ends up exactly where it was before the step.
//! Protected paths are on neither side of that mirror and survive untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::sibling_with_suffix;
use crate::core::RatchetError;
use crate::paths::ExclusionRules;
use crate::utils::fs::{copy_dir, ensure_dir, ensure_parent_dir, remove_dir_all};
use crate::version::ReleaseVersion;

/// Root directory holding every per-step backup for an installation.
///
/// Lives next to the installation (`/opt/app` backs up into
/// `/opt/app.backups/`), never inside it.
pub fn backups_root_for(live_dir: &Path) -> PathBuf {
    sibling_with_suffix(live_dir, ".backups")
}

/// A completed backup of one installation, taken before one update step.
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
/// use ratchet_cli::paths::ExclusionRules;
/// use ratchet_cli::staging::BackupSnapshot;
/// use ratchet_cli::version::ReleaseVersion;
///
/// # async fn example() -> anyhow::Result<()> {
/// let live = Path::new("/opt/app");
/// let version = ReleaseVersion::new(1, 1, 0);
/// let snapshot = BackupSnapshot::create(live, &version, &ExclusionRules::default()).await?;
///
/// // ... apply the step ...
///
/// let step_failed = false;
/// if step_failed {
///     snapshot.restore().await?;
/// } else {
///     snapshot.remove().await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BackupSnapshot {
    version: ReleaseVersion,
    live_dir: PathBuf,
    backup_dir: PathBuf,
    rules: ExclusionRules,
}

impl BackupSnapshot {
    /// Copies every non-protected file under `live_dir` into a fresh backup.
    ///
    /// Creating a backup that already exists is a no-op that reuses it: a
    /// backup left by an interrupted run holds the pre-step state, and
    /// re-copying here would capture the half-mutated tree instead. Protected
    /// paths are skipped entirely so a later restore cannot clobber user data.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::BackupCreationFailed`] if the installation
    /// directory is missing or any file cannot be copied.
    pub async fn create(
        live_dir: &Path,
        version: &ReleaseVersion,
        rules: &ExclusionRules,
    ) -> Result<Self> {
        if !live_dir.exists() {
            return Err(RatchetError::BackupCreationFailed {
                version: version.to_string(),
                reason: format!("installation directory {} does not exist", live_dir.display()),
            }
            .into());
        }

        let backup_dir = backups_root_for(live_dir).join(format!("backup_{version}"));
        if backup_dir.exists() {
            info!("Reusing existing backup at {}", backup_dir.display());
            return Ok(Self {
                version: *version,
                live_dir: live_dir.to_path_buf(),
                backup_dir,
                rules: rules.clone(),
            });
        }

        let live = live_dir.to_path_buf();
        let dest = backup_dir.clone();
        let walk_rules = rules.clone();
        let copied = tokio::task::spawn_blocking(move || snapshot_tree(&live, &dest, &walk_rules))
            .await
            .context("Failed to join backup task")?
            .map_err(|e| RatchetError::BackupCreationFailed {
                version: version.to_string(),
                reason: format!("{e:#}"),
            })?;

        info!("Backed up {} file(s) to {}", copied, backup_dir.display());
        Ok(Self {
            version: *version,
            live_dir: live_dir.to_path_buf(),
            backup_dir,
            rules: rules.clone(),
        })
    }

    /// The directory this snapshot's files live in.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Whether the backup is still present on disk.
    pub fn exists(&self) -> bool {
        self.backup_dir.exists()
    }

    /// Mirrors the snapshot back over the live installation.
    ///
    /// Backed-up files are copied back, then non-protected files with no
    /// counterpart in the backup are removed. Directories are left in place.
    /// Retries a few times before giving up; transient locking is the usual
    /// cause of a first-attempt failure on Windows.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::RollbackFailed`] if the backup is missing or
    /// restoration keeps failing. That error means the installation may be in
    /// a mixed state and needs manual attention.
    pub async fn restore(&self) -> Result<()> {
        if !self.backup_dir.exists() {
            return Err(RatchetError::RollbackFailed {
                version: self.version.to_string(),
                reason: format!("no backup found at {}", self.backup_dir.display()),
            }
            .into());
        }

        warn!(
            "Restoring {} from backup at {}",
            self.live_dir.display(),
            self.backup_dir.display()
        );

        let mut attempts = 0;
        const MAX_ATTEMPTS: u32 = 3;

        loop {
            match self.attempt_restore().await {
                Ok(()) => {
                    info!("Restored installation from backup for {}", self.version);
                    return Ok(());
                }
                Err(e) if attempts < MAX_ATTEMPTS - 1 => {
                    warn!("Restore attempt {} failed: {}. Retrying...", attempts + 1, e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    attempts += 1;
                }
                Err(e) => {
                    return Err(RatchetError::RollbackFailed {
                        version: self.version.to_string(),
                        reason: format!("{e:#}"),
                    }
                    .into());
                }
            }
        }
    }

    async fn attempt_restore(&self) -> Result<()> {
        let src = self.backup_dir.clone();
        let dst = self.live_dir.clone();
        let rules = self.rules.clone();
        tokio::task::spawn_blocking(move || restore_tree(&src, &dst, &rules))
            .await
            .context("Failed to join restore task")?
    }

    /// Removes this snapshot, pruning the backups root if it became empty.
    ///
    /// Silently succeeds if the snapshot is already gone, so it is safe to
    /// call unconditionally after a step commits.
    pub async fn remove(&self) -> Result<()> {
        remove_dir_all(&self.backup_dir)?;

        if let Some(root) = self.backup_dir.parent() {
            if root.exists()
                && fs::read_dir(root).map(|mut entries| entries.next().is_none()).unwrap_or(false)
            {
                let _ = fs::remove_dir(root);
            }
        }
        Ok(())
    }

    /// Removes every backup kept for the installation at `live_dir`.
    pub fn cleanup_all(live_dir: &Path) -> Result<()> {
        remove_dir_all(&backups_root_for(live_dir))
    }
}

/// Walks `live` and copies each non-protected file into `dest`.
///
/// Returns the number of files copied. Protected directories are pruned from
/// the walk so nothing under them is even visited.
fn snapshot_tree(live: &Path, dest: &Path, rules: &ExclusionRules) -> Result<usize> {
    ensure_dir(dest)?;

    let mut copied = 0usize;
    let mut walker = WalkDir::new(live).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.context("Failed to walk installation directory")?;
        if entry.path() == live {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(live)
            .context("Walked entry escaped the installation directory")?;
        let Some(rel_str) = relative_string(rel) else {
            warn!("Skipping non-UTF-8 path in backup: {}", entry.path().display());
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        };

        if rules.is_protected_raw(&rel_str) {
            debug!("Skipping protected path in backup: {}", rel_str);
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() {
            let target = dest.join(rel);
            ensure_parent_dir(&target)?;
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to back up {rel_str}"))?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copies `backup` back over `live`, then removes non-protected files that
/// have no counterpart in the backup.
///
/// The removal pass is what makes a rolled-back step all-or-nothing: files a
/// failed step managed to add would otherwise survive the restore.
fn restore_tree(backup: &Path, live: &Path, rules: &ExclusionRules) -> Result<()> {
    copy_dir(backup, live)?;

    let mut walker = WalkDir::new(live).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.context("Failed to walk installation directory")?;
        if entry.path() == live {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(live)
            .context("Walked entry escaped the installation directory")?;
        let Some(rel_str) = relative_string(rel) else {
            warn!("Skipping non-UTF-8 path in restore: {}", entry.path().display());
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        };

        if rules.is_protected_raw(&rel_str) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() && !backup.join(rel).exists() {
            debug!("Removing file added after backup: {rel_str}");
            fs::remove_file(entry.path())
                .with_context(|| format!("Failed to remove {rel_str} during restore"))?;
        }
    }

    Ok(())
}

/// Joins path components with `/`, returning `None` for non-UTF-8 names.
fn relative_string(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}
