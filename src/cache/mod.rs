//! Cached results of release checks.
//!
//! `ratchet check` runs from shell prompts and cron jobs, so repeated
//! invocations within the configured interval reuse the last middleware
//! answer instead of issuing a new request. The cache is advisory: it is
//! bypassed with `--no-cache`, cleared after a successful update, and a
//! corrupt cache file is treated as absent rather than reported.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::ratchet_dir;
use crate::version::ReleaseVersion;

/// File name of the cache inside the ratchet state directory.
const CACHE_FILE: &str = ".version_cache.json";

/// One recorded release check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCheckCache {
    /// Latest version the middleware reported (e.g. "2.1.3").
    pub latest_version: String,
    /// Version installed locally at check time, absent for fresh machines.
    pub current_version: Option<String>,
    /// When the middleware was asked.
    pub checked_at: DateTime<Utc>,
    /// Whether the check concluded an update was available.
    pub update_available: bool,
}

impl VersionCheckCache {
    /// Records a check result taken just now.
    pub fn new(current: Option<&ReleaseVersion>, latest: &ReleaseVersion) -> Self {
        let update_available = match current {
            Some(c) => latest > c,
            None => true,
        };
        Self {
            latest_version: latest.to_string(),
            current_version: current.map(ToString::to_string),
            checked_at: Utc::now(),
            update_available,
        }
    }

    /// Whether the entry is younger than `max_age`.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now() - self.checked_at;
        age.num_seconds() < max_age.as_secs() as i64
    }

    /// The recorded latest version, reparsed.
    ///
    /// # Errors
    ///
    /// Fails if the stored string is not a valid version, which only happens
    /// when the file was edited by hand.
    pub fn latest(&self) -> Result<ReleaseVersion> {
        ReleaseVersion::parse(&self.latest_version)
            .with_context(|| format!("cached version {:?} is not valid", self.latest_version))
    }
}

/// On-disk store for [`VersionCheckCache`] entries.
#[derive(Debug, Clone)]
pub struct VersionCache {
    cache_path: PathBuf,
}

impl VersionCache {
    /// Opens the cache in the default state directory (`~/.ratchet`).
    ///
    /// # Errors
    ///
    /// Fails only when the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self {
            cache_path: ratchet_dir()?.join(CACHE_FILE),
        })
    }

    /// Opens the cache inside a specific directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cache_path: dir.join(CACHE_FILE),
        }
    }

    /// Loads the cached entry if it is present and younger than `max_age`.
    ///
    /// Missing, stale, and unreadable caches all yield `None`; the next
    /// [`store`](Self::store) overwrites whatever is there.
    pub async fn load_fresh(&self, max_age: Duration) -> Option<VersionCheckCache> {
        let content = match fs::read_to_string(&self.cache_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No version cache at {}", self.cache_path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read version cache, ignoring it: {e}");
                return None;
            }
        };

        let entry: VersionCheckCache = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Version cache is unreadable, ignoring it: {e}");
                return None;
            }
        };

        if entry.is_fresh(max_age) {
            debug!(
                "Using cached release check from {} (latest {})",
                entry.checked_at, entry.latest_version
            );
            Some(entry)
        } else {
            debug!("Version cache expired (checked at {})", entry.checked_at);
            None
        }
    }

    /// Writes `entry` to disk, creating the state directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn store(&self, entry: &VersionCheckCache) -> Result<()> {
        let content =
            serde_json::to_string_pretty(entry).context("Failed to serialize version cache")?;

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create cache directory")?;
        }

        fs::write(&self.cache_path, content)
            .await
            .context("Failed to write version cache")?;

        debug!("Saved release check to {}", self.cache_path.display());
        Ok(())
    }

    /// Removes the cache file. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.cache_path).await {
            Ok(()) => {
                debug!("Cleared version cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove version cache"),
        }
    }
}
