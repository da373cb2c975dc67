//! Staging area and backup snapshots for safe installation mutations.
//!
//! Nothing ever writes into a live installation without a way back:
//!
//! - Fresh installs assemble the complete payload in a sibling
//!   [`StagingArea`] first and promote it only once every file arrived.
//! - Updates take a [`BackupSnapshot`] of the live directory before a step
//!   touches it, so a failed step can be rolled back file for file.
//!
//! Both live next to the installation directory rather than inside it, which
//! keeps scratch state out of backups and out of the application's own view
//! of its files.

pub mod backup;

pub use backup::BackupSnapshot;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::RatchetError;
use crate::utils::fs::{copy_dir, ensure_dir, remove_dir_all};

/// Derives a sibling of `dir` whose name carries `suffix`.
///
/// `/opt/app` with suffix `.staging` becomes `/opt/app.staging`.
pub(crate) fn sibling_with_suffix(dir: &Path, suffix: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.set_file_name(format!(
        "{}{}",
        dir.file_name().unwrap_or_default().to_string_lossy(),
        suffix
    ));
    path
}

/// Scratch directory where a fresh install is assembled before promotion.
///
/// The area cleans up after itself: if it is dropped without
/// [`commit`](Self::commit) being called, the staged files are removed.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    live_dir: PathBuf,
    committed: bool,
}

impl StagingArea {
    /// Creates an empty staging area next to `live_dir`.
    ///
    /// Leftovers from a previous interrupted run are removed first, so the
    /// area always starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging directory cannot be prepared.
    pub fn create(live_dir: &Path) -> Result<Self> {
        let root = sibling_with_suffix(live_dir, ".staging");

        if root.exists() {
            warn!("Removing leftover staging directory at {}", root.display());
            remove_dir_all(&root)?;
        }
        ensure_dir(&root)?;
        debug!("Created staging area at {}", root.display());

        Ok(Self {
            root,
            live_dir: live_dir.to_path_buf(),
            committed: false,
        })
    }

    /// Root of the staging directory. Downloads land under this path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Promotes the staged tree into the live directory.
    ///
    /// If the live directory does not exist yet the staged tree is renamed
    /// into place. Otherwise the staged files are merged over it, leaving
    /// files the stage does not contain untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::StagingCommitFailed`] if promotion fails; the
    /// staged files are kept on disk in that case for inspection.
    pub fn commit(mut self) -> Result<()> {
        let result = if self.live_dir.exists() {
            copy_dir(&self.root, &self.live_dir).and_then(|()| remove_dir_all(&self.root))
        } else {
            fs::rename(&self.root, &self.live_dir).map_err(Into::into)
        };

        match result {
            Ok(()) => {
                self.committed = true;
                info!("Promoted staged files into {}", self.live_dir.display());
                Ok(())
            }
            Err(e) => Err(RatchetError::StagingCommitFailed {
                reason: format!("{e:#}"),
            }
            .into()),
        }
    }

    /// Removes the staging area without promoting it.
    pub fn discard(mut self) -> Result<()> {
        self.committed = true; // Drop must not try again
        remove_dir_all(&self.root)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.committed {
            let _ = remove_dir_all(&self.root);
        }
    }
}
