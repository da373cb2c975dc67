//! Global constants used throughout the updater.
//!
//! This module contains timeout durations, retry parameters, and other
//! numeric constants that are used across multiple modules. Defining
//! them centrally improves maintainability and makes magic numbers
//! more discoverable.

use std::time::Duration;

/// Name of the dependency list a release may ship.
///
/// When a manifest signals a dependency change, this file is downloaded from
/// the release payload and handed to the configured install command.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Timeout for the dependency install command (5 minutes).
///
/// Package managers resolve and build transitively; anything still running
/// after this long is treated as hung.
pub fn dependency_install_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Timeout for acquiring the progress state file lock (5 seconds).
///
/// Readers poll the state file frequently, so a writer that cannot get the
/// lock quickly should give up rather than stall the update.
pub fn state_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Maximum backoff delay for exponential backoff (500ms).
///
/// Exponential backoff delays are capped at this value to prevent
/// excessive wait times during retry operations.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// This is the initial delay used in exponential backoff calculations,
/// which doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Default cap on concurrent file downloads within one update step.
///
/// Keeps the middleware from seeing a thundering herd while still
/// overlapping transfer latency.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;
