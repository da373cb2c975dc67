//! Ratchet - staged application updater
//!
//! Ratchet keeps an installed application current by applying version
//! updates as a sequence of discrete, reversible steps. Instead of jumping
//! straight to the target release, it walks every intermediate version in
//! order, and each step is backed by a snapshot of the installation that is
//! restored automatically when anything in the step fails.
//!
//! # Architecture Overview
//!
//! An update run follows a fixed pipeline:
//!
//! - A version marker file (`version.txt`) on disk identifies the installed
//!   release; a missing marker selects the fresh-install path.
//! - The release middleware advertises versions and serves one change
//!   manifest per release plus the raw file contents it references.
//! - The engine applies one release at a time: snapshot, delete, add, edit,
//!   optionally install dependencies, then persist the marker. A failed step
//!   is rolled back whole and aborts the run.
//! - Protected paths (user data, logs, local configuration, the updater's
//!   own bookkeeping) are never written, deleted, or captured in backups.
//!
//! Because the marker only advances after a fully committed step, re-running
//! the updater after any failure or interruption resumes from the last good
//! version.
//!
//! # Core Modules
//!
//! - [`engine`] - orchestrates fresh installs and staged update runs
//! - [`manifest`] - per-release change manifests, parsed and validated
//! - [`source`] - the [`ReleaseSource`](source::ReleaseSource) trait and the
//!   HTTP middleware client
//! - [`staging`] - staging areas for fresh installs, step backups, rollback
//! - [`state`] - the installed-version marker
//! - [`version`] - release version parsing, ordering, and update paths
//!
//! # Supporting Modules
//!
//! - [`cache`] - remembered `check` answers with a freshness window
//! - [`cli`] - the `ratchet` command-line interface
//! - [`config`] - the global configuration file (`~/.ratchet/config.toml`)
//! - [`core`] - error types, exit codes, and user-facing error contexts
//! - [`paths`] - validated relative paths and protected-path rules
//! - [`progress`] - terminal progress bars and the machine-readable state file
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ratchet_cli::engine::UpdateEngine;
//! use ratchet_cli::source::MiddlewareClient;
//! use ratchet_cli::version::ReleaseVersion;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = MiddlewareClient::new("http://localhost:8000", None, Duration::from_secs(30))?;
//! let outcome = UpdateEngine::new(source, "/opt/my-app")
//!     .install_or_update(&ReleaseVersion::parse("2.1.3")?)
//!     .await?;
//! println!("installed {}", outcome.installed);
//! # Ok(())
//! # }
//! ```

// Core pipeline modules
pub mod engine;
pub mod manifest;
pub mod source;
pub mod staging;
pub mod state;
pub mod version;

// Supporting modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod paths;
pub mod progress;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
