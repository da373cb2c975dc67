//! HTTP client for the release middleware service.
//!
//! The middleware exposes a small REST surface in front of the actual release
//! storage:
//!
//! - `GET /health` - liveness probe
//! - `GET /releases` - list of published releases
//! - `GET /manifest/{tag}` - change manifest for one release
//! - `GET /download/{tag}/{path}` - raw bytes of one payload file
//!
//! Release tags always carry a leading `v` (`v1.2.3`). When the middleware
//! serves more than one application, the `repo` query parameter selects which
//! one; [`MiddlewareClient`] appends it to every request when configured.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ReleaseEntry, ReleaseSource};
use crate::core::RatchetError;
use crate::manifest::Manifest;
use crate::paths::RelativePath;
use crate::version::ReleaseVersion;

/// Client for the release middleware HTTP API.
///
/// Cheap to clone once constructed; the underlying connection pool is shared.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ratchet_cli::source::MiddlewareClient;
///
/// let client = MiddlewareClient::new(
///     "http://updates.example.com:8000",
///     Some("my-app".to_string()),
///     Duration::from_secs(30),
/// )?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareClient {
    http: Client,
    base_url: String,
    repo: Option<String>,
}

/// One entry in the `/releases` listing as the middleware serves it.
#[derive(Debug, Deserialize)]
struct WireRelease {
    version: String,
    #[serde(default)]
    branch_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl MiddlewareClient {
    /// Creates a client for the middleware at `base_url`.
    ///
    /// A trailing slash on `base_url` is tolerated and stripped. `timeout`
    /// applies to every request issued through this client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        repo: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            repo,
        })
    }

    /// The middleware base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Issues a GET against one endpoint, mapping transport failures to
    /// [`RatchetError::SourceUnavailable`].
    async fn send(&self, path: &str) -> Result<Response> {
        let url = self.url(path);
        debug!("GET {}", url);

        let mut request = self.http.get(&url);
        if let Some(repo) = &self.repo {
            request = request.query(&[("repo", repo.as_str())]);
        }

        let response = request.send().await.map_err(|e| RatchetError::SourceUnavailable {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(response)
    }
}

#[async_trait]
impl ReleaseSource for MiddlewareClient {
    async fn health_check(&self) -> Result<()> {
        let response = self.send("health").await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RatchetError::SourceUnavailable {
                url: self.url("health"),
                reason: format!("health check returned HTTP {status}"),
            }
            .into());
        }
        debug!("Middleware at {} is healthy", self.base_url);
        Ok(())
    }

    async fn list_releases(&self) -> Result<Vec<ReleaseEntry>> {
        let response = self.send("releases").await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RatchetError::RateLimited {
                operation: "release listing".to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(RatchetError::SourceUnavailable {
                url: self.url("releases"),
                reason: format!("release listing returned HTTP {status}"),
            }
            .into());
        }

        let body = response.bytes().await.context("Failed to read release listing")?;
        parse_release_entries(&body)
    }

    async fn fetch_manifest(&self, version: &ReleaseVersion) -> Result<Manifest> {
        let tag = version.tag();
        let response = self.send(&format!("manifest/{tag}")).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(RatchetError::ManifestNotFound {
                    version: version.to_string(),
                }
                .into());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RatchetError::RateLimited {
                    operation: format!("manifest fetch for {tag}"),
                }
                .into());
            }
            status if !status.is_success() => {
                return Err(RatchetError::SourceUnavailable {
                    url: self.url(&format!("manifest/{tag}")),
                    reason: format!("manifest fetch returned HTTP {status}"),
                }
                .into());
            }
            _ => {}
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read manifest for {tag}"))?;
        Manifest::parse_json(&body, version)
    }

    async fn fetch_file(&self, version: &ReleaseVersion, path: &RelativePath) -> Result<Vec<u8>> {
        let tag = version.tag();
        let endpoint = format!("download/{tag}/{path}");
        let response = self.send(&endpoint).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(RatchetError::DownloadFailed {
                    path: path.to_string(),
                    reason: format!("not present in release {tag}"),
                }
                .into());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RatchetError::RateLimited {
                    operation: format!("file download from {tag}"),
                }
                .into());
            }
            status if !status.is_success() => {
                return Err(RatchetError::DownloadFailed {
                    path: path.to_string(),
                    reason: format!("download returned HTTP {status}"),
                }
                .into());
            }
            _ => {}
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RatchetError::DownloadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        // A zero-byte response means the middleware could not serve the file,
        // not that the file is legitimately empty.
        if body.is_empty() {
            return Err(RatchetError::DownloadFailed {
                path: path.to_string(),
                reason: "downloaded file is empty".to_string(),
            }
            .into());
        }

        debug!("Downloaded {} ({} bytes) from {}", path, body.len(), tag);
        Ok(body.to_vec())
    }
}

/// Parses the `/releases` response body into [`ReleaseEntry`] values.
///
/// Entries whose version field does not parse are skipped with a warning
/// rather than failing the whole listing.
fn parse_release_entries(body: &[u8]) -> Result<Vec<ReleaseEntry>> {
    let wire: Vec<WireRelease> =
        serde_json::from_slice(body).context("Release listing is not valid JSON")?;

    let mut entries = Vec::with_capacity(wire.len());
    for release in wire {
        let version = match ReleaseVersion::parse(&release.version) {
            Ok(version) => version,
            Err(e) => {
                warn!("Skipping release with unparsable version '{}': {}", release.version, e);
                continue;
            }
        };
        let identifier = release
            .branch_name
            .or(release.name)
            .unwrap_or_else(|| version.tag());
        entries.push(ReleaseEntry {
            version,
            identifier,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> MiddlewareClient {
        MiddlewareClient::new(base, None, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let client = client("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("releases"), "http://localhost:8000/releases");
    }

    #[test]
    fn download_urls_use_tagged_version_and_raw_path() {
        let client = client("http://localhost:8000");
        let version = ReleaseVersion::new(1, 2, 3);
        let path = RelativePath::new("src/app/main.py").unwrap();
        assert_eq!(
            client.url(&format!("download/{}/{}", version.tag(), path)),
            "http://localhost:8000/download/v1.2.3/src/app/main.py"
        );
    }

    #[test]
    fn parses_release_entries_with_branch_names() {
        let body = br#"[
            {"branch_name": "release/v2.1.0", "version": "2.1.0", "name": "Release v2.1.0"},
            {"branch_name": "release/v2.0.0", "version": "2.0.0", "name": "Release v2.0.0"}
        ]"#;
        let entries = parse_release_entries(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, ReleaseVersion::new(2, 1, 0));
        assert_eq!(entries[0].identifier, "release/v2.1.0");
    }

    #[test]
    fn falls_back_to_tag_when_no_name_is_present() {
        let body = br#"[{"version": "0.9.0"}]"#;
        let entries = parse_release_entries(body).unwrap();
        assert_eq!(entries[0].identifier, "v0.9.0");
    }

    #[test]
    fn skips_entries_with_unparsable_versions() {
        let body = br#"[
            {"version": "not-a-version", "name": "broken"},
            {"version": "1.0.0", "name": "good"}
        ]"#;
        let entries = parse_release_entries(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, ReleaseVersion::new(1, 0, 0));
    }

    #[test]
    fn rejects_malformed_listing() {
        assert!(parse_release_entries(b"{\"oops\": true}").is_err());
    }
}
