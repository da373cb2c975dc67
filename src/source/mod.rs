//! Release source abstraction for fetching versions, manifests, and payload files.
//!
//! The updater never talks to a network endpoint directly. Everything it needs
//! from the outside world goes through the [`ReleaseSource`] trait:
//!
//! - Which versions exist ([`ReleaseSource::list_releases`])
//! - What a given version changes ([`ReleaseSource::fetch_manifest`])
//! - The bytes of an individual file ([`ReleaseSource::fetch_file`])
//!
//! The production implementation is [`MiddlewareClient`], an HTTP client for
//! the release middleware service. Tests substitute an in-memory source so the
//! full update pipeline runs without a network.

pub mod middleware;

pub use middleware::MiddlewareClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::manifest::Manifest;
use crate::paths::RelativePath;
use crate::version::ReleaseVersion;

/// A single release advertised by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// The version of the release.
    pub version: ReleaseVersion,
    /// Human-readable identifier for the release (branch or release name).
    pub identifier: String,
}

/// Interface to a provider of application releases.
///
/// Implementations must be safe to share across tasks: the update engine may
/// issue several [`fetch_file`](Self::fetch_file) calls concurrently while
/// applying a single step.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Checks that the source is reachable and healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached or reports itself
    /// unhealthy.
    async fn health_check(&self) -> Result<()>;

    /// Lists every release the source knows about.
    ///
    /// Order is not guaranteed; callers that need the newest release should
    /// compare [`ReleaseEntry::version`] values rather than rely on position.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached or returns a
    /// malformed listing.
    async fn list_releases(&self) -> Result<Vec<ReleaseEntry>>;

    /// Fetches and parses the manifest for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::ManifestNotFound`](crate::core::RatchetError::ManifestNotFound)
    /// if the source has no manifest for that version, or
    /// [`RatchetError::ManifestMalformed`](crate::core::RatchetError::ManifestMalformed)
    /// if the payload cannot be understood.
    async fn fetch_manifest(&self, version: &ReleaseVersion) -> Result<Manifest>;

    /// Downloads the contents of one file from the payload of `version`.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::DownloadFailed`](crate::core::RatchetError::DownloadFailed)
    /// if the file is missing, empty, or the transfer fails.
    async fn fetch_file(&self, version: &ReleaseVersion, path: &RelativePath) -> Result<Vec<u8>>;
}

/// The newest release `source` advertises, or `None` for an empty listing.
///
/// # Errors
///
/// Propagates [`ReleaseSource::list_releases`] failures.
pub async fn latest_release(source: &impl ReleaseSource) -> Result<Option<ReleaseEntry>> {
    let releases = source.list_releases().await?;
    Ok(releases.into_iter().max_by_key(|release| release.version))
}
