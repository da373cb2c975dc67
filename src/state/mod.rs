//! Persistent record of which version an installation is running.
//!
//! The installed version lives in a single `version.txt` file at the root of
//! the installation directory. The file is the source of truth for update
//! planning: it is read before an update starts and rewritten after every
//! successfully committed step, so an update interrupted between steps leaves
//! behind an accurate record of how far it got.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::RatchetError;
use crate::utils::fs::safe_write;
use crate::version::ReleaseVersion;

/// Name of the version marker file inside an installation directory.
pub const VERSION_FILE: &str = "version.txt";

/// Reads and writes the installed-version marker for one installation.
#[derive(Debug, Clone)]
pub struct StateStore {
    install_dir: PathBuf,
}

impl StateStore {
    /// Creates a store for the installation at `install_dir`.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// The installation directory this store manages.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Full path of the version marker file.
    pub fn version_file(&self) -> PathBuf {
        self.install_dir.join(VERSION_FILE)
    }

    /// Loads the recorded version, if any.
    ///
    /// Returns `Ok(None)` when the marker file does not exist, which is how a
    /// fresh (never installed) target presents itself.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::InstallationStateCorrupt`] when the file exists
    /// but does not hold a parsable version. A corrupt marker is never
    /// silently treated as a fresh install.
    pub fn load(&self) -> Result<Option<ReleaseVersion>> {
        let path = self.version_file();
        if !path.exists() {
            debug!("No version marker at {}", path.display());
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read version marker: {}", path.display()))?;
        let trimmed = raw.trim();

        match ReleaseVersion::parse(trimmed) {
            Ok(version) => Ok(Some(version)),
            Err(_) => Err(RatchetError::InstallationStateCorrupt {
                path: path.display().to_string(),
                content: truncate_for_display(trimmed),
            }
            .into()),
        }
    }

    /// Records `version` as the installed version.
    ///
    /// The write is atomic, so a crash mid-save leaves the previous marker
    /// intact.
    pub fn save(&self, version: &ReleaseVersion) -> Result<()> {
        let path = self.version_file();
        safe_write(&path, &version.to_string())
            .with_context(|| format!("Failed to record installed version {version}"))?;
        debug!("Recorded installed version {} at {}", version, path.display());
        Ok(())
    }
}

/// Keeps corrupt marker contents short enough to show in an error message.
fn truncate_for_display(content: &str) -> String {
    const MAX: usize = 80;
    if content.chars().count() <= MAX {
        content.to_string()
    } else {
        let head: String = content.chars().take(MAX).collect();
        format!("{head}...")
    }
}
