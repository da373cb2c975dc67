//! Global configuration for the updater.
//!
//! User-wide settings live in a TOML file at `~/.ratchet/config.toml`
//! (override with the `RATCHET_CONFIG_PATH` environment variable). Every
//! field has a sensible default, so a missing file is equivalent to an empty
//! one and first-time use needs no setup beyond pointing at a middleware.
//!
//! # File Format
//!
//! ```toml
//! middleware_url = "http://updates.example.com:8000"
//! repo = "my-app"
//! install_dir = "/opt/my-app"
//! request_timeout_secs = 30
//! max_concurrent_downloads = 4
//! check_interval_hours = 24
//! dependency_install_command = ["python3", "-m", "pip", "install", "-r"]
//! ```
//!
//! `dependency_install_command` is invoked with the downloaded requirements
//! file path appended as its final argument.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::constants::DEFAULT_MAX_CONCURRENT_DOWNLOADS;
use crate::core::RatchetError;

/// Middleware used when neither the config file nor the CLI names one.
pub const DEFAULT_MIDDLEWARE_URL: &str = "http://localhost:8000";

fn default_middleware_url() -> String {
    DEFAULT_MIDDLEWARE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}

const fn default_check_interval_hours() -> u64 {
    24
}

/// User-wide updater settings.
///
/// # Examples
///
/// ```rust,no_run
/// use ratchet_cli::config::GlobalConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load().await?;
/// println!("Middleware: {}", config.middleware_url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// Base URL of the release middleware.
    #[serde(default = "default_middleware_url")]
    pub middleware_url: String,

    /// Repository selector sent with every middleware request, for
    /// middlewares that serve more than one application.
    #[serde(default)]
    pub repo: Option<String>,

    /// Installation directory to operate on when the CLI does not name one.
    #[serde(default)]
    pub install_dir: Option<PathBuf>,

    /// Timeout for each middleware request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Cap on concurrent file downloads within one update step.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Command used to install dependencies; the requirements file path is
    /// appended as the final argument. Dependency steps are skipped with a
    /// warning when unset.
    #[serde(default)]
    pub dependency_install_command: Option<Vec<String>>,

    /// Age in hours before a cached release listing goes stale.
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            middleware_url: default_middleware_url(),
            repo: None,
            install_dir: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            dependency_install_command: None,
            check_interval_hours: default_check_interval_hours(),
        }
    }
}

impl GlobalConfig {
    /// Loads configuration from the default location.
    ///
    /// A missing file yields the default configuration rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Loads configuration from `path` when given, the default location
    /// otherwise.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// The default configuration file location.
    ///
    /// Checks `RATCHET_CONFIG_PATH` first, then falls back to
    /// `~/.ratchet/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("RATCHET_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }
        Ok(ratchet_dir()?.join("config.toml"))
    }

    /// Timeout for middleware requests as a [`Duration`].
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Staleness threshold for cached release listings as a [`Duration`].
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours * 60 * 60)
    }

    /// Resolves the installation directory to operate on.
    ///
    /// Priority: explicit CLI flag, then the configured directory, then the
    /// current working directory.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::ConfigError`] if the current directory cannot
    /// be determined when falling back to it.
    pub fn resolve_install_dir(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = flag {
            return Ok(dir);
        }
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        std::env::current_dir().map_err(|e| {
            RatchetError::ConfigError {
                message: format!(
                    "no installation directory configured and the current directory is unavailable: {e}"
                ),
            }
            .into()
        })
    }
}

/// The per-user state directory (`~/.ratchet`).
///
/// Override with the `RATCHET_HOME` environment variable, which tests rely
/// on to avoid touching the real home directory.
pub fn ratchet_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("RATCHET_HOME") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".ratchet"))
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))
}
