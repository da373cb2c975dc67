//! Shared helpers for unit and integration tests.
//!
//! The centerpiece is [`FakeSource`], an in-memory [`ReleaseSource`] that
//! lets tests drive the entire update pipeline, staging, backups, rollback,
//! without a network or a middleware process. It is compiled into the crate
//! for unit tests and exposed through the `test-utils` feature so the
//! integration suite can use it too.

use std::collections::{HashMap, HashSet};
use std::sync::Once;

use anyhow::Result;
use async_trait::async_trait;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::RatchetError;
use crate::manifest::Manifest;
use crate::paths::RelativePath;
use crate::source::{ReleaseEntry, ReleaseSource};
use crate::version::ReleaseVersion;

static INIT_LOGGING: Once = Once::new();

/// Initializes tracing for tests, once per process.
///
/// Respects `RUST_LOG` when set; otherwise uses `level`, falling back to
/// `warn`. Safe to call from every test.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let fallback = level.map_or_else(|| "warn".to_string(), |l| l.to_string());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Shorthand for a [`ReleaseVersion`] literal.
///
/// # Panics
///
/// Panics if `s` is not a valid version string.
pub fn ver(s: &str) -> ReleaseVersion {
    ReleaseVersion::parse(s).unwrap()
}

/// Shorthand for a [`RelativePath`] literal.
///
/// # Panics
///
/// Panics if `s` is not a valid relative path.
pub fn rel(s: &str) -> RelativePath {
    RelativePath::new(s).unwrap()
}

/// Builds a manifest from string literals.
///
/// # Panics
///
/// Panics if any path is invalid or the path lists overlap.
pub fn manifest(
    version: &str,
    add: &[&str],
    edit: &[&str],
    delete: &[&str],
    dependencies: bool,
) -> Manifest {
    Manifest::new(
        ver(version),
        add.iter().map(|p| rel(p)).collect(),
        edit.iter().map(|p| rel(p)).collect(),
        delete.iter().map(|p| rel(p)).collect(),
        dependencies,
    )
    .unwrap()
}

/// In-memory release source for tests.
///
/// Registering a manifest advertises its version as a release; individual
/// files are served from a map, and [`with_failing_file`](Self::with_failing_file)
/// makes one path fail its download while everything else succeeds.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    releases: Vec<ReleaseEntry>,
    manifests: HashMap<ReleaseVersion, Manifest>,
    files: HashMap<(ReleaseVersion, String), Vec<u8>>,
    failing: HashSet<(ReleaseVersion, String)>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertises a release without attaching a manifest.
    #[must_use]
    pub fn with_release(mut self, version: &str, identifier: &str) -> Self {
        self.push_release(ver(version), identifier.to_string());
        self
    }

    /// Registers `manifest` and advertises its version as a release.
    #[must_use]
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        let version = manifest.version();
        self.push_release(version, format!("release/{version}"));
        self.manifests.insert(version, manifest);
        self
    }

    /// Serves `content` for `path` within `version`.
    #[must_use]
    pub fn with_file(mut self, version: &str, path: &str, content: &[u8]) -> Self {
        self.files.insert((ver(version), path.to_string()), content.to_vec());
        self
    }

    /// Makes the download of `path` within `version` fail.
    #[must_use]
    pub fn with_failing_file(mut self, version: &str, path: &str) -> Self {
        self.failing.insert((ver(version), path.to_string()));
        self
    }

    fn push_release(&mut self, version: ReleaseVersion, identifier: String) {
        if !self.releases.iter().any(|r| r.version == version) {
            self.releases.push(ReleaseEntry { version, identifier });
        }
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn list_releases(&self) -> Result<Vec<ReleaseEntry>> {
        Ok(self.releases.clone())
    }

    async fn fetch_manifest(&self, version: &ReleaseVersion) -> Result<Manifest> {
        self.manifests.get(version).cloned().ok_or_else(|| {
            RatchetError::ManifestNotFound {
                version: version.to_string(),
            }
            .into()
        })
    }

    async fn fetch_file(&self, version: &ReleaseVersion, path: &RelativePath) -> Result<Vec<u8>> {
        let key = (*version, path.as_str().to_string());
        if self.failing.contains(&key) {
            return Err(RatchetError::DownloadFailed {
                path: path.to_string(),
                reason: "simulated transfer failure".to_string(),
            }
            .into());
        }
        self.files.get(&key).cloned().ok_or_else(|| {
            RatchetError::DownloadFailed {
                path: path.to_string(),
                reason: "file not present in release".to_string(),
            }
            .into()
        })
    }
}
