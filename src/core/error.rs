//! Error handling for Ratchet
//!
//! This module provides the error types and user-friendly error reporting for the
//! updater. The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! The error system consists of two main types:
//! - [`RatchetError`] - Enumerated error types for all failure cases in the updater
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Error Severity
//!
//! Most errors are recoverable by re-running the update: the engine persists the
//! installed version only after a step fully succeeds, so a failed run leaves the
//! installation at the last good version. Two cases are special:
//! - [`RatchetError::StepFailed`] - a step was applied partially, then rolled back
//!   from its backup; the installation is intact but the update did not complete.
//! - [`RatchetError::RollbackFailed`] - both the forward and the backward path
//!   failed; the installation may be inconsistent and needs manual attention.
//!
//! Use [`user_friendly_error`] to convert any error into a displayable format with
//! contextual suggestions, and [`RatchetError::exit_code`] to pick the process exit
//! code that distinguishes these outcomes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ratchet_cli::core::{RatchetError, ErrorContext, user_friendly_error};
//!
//! fn load_state() -> Result<(), RatchetError> {
//!     Err(RatchetError::InstallationStateCorrupt {
//!         path: "app/version.txt".to_string(),
//!         content: "not-a-version".to_string(),
//!     })
//! }
//!
//! if let Err(e) = load_state() {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display(); // Shows colored error with suggestions
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for updater operations
///
/// Each variant represents a specific failure mode with enough context to render
/// an actionable message. Variants carry owned strings rather than source errors
/// so they stay cheap to clone into [`ErrorContext`] values.
///
/// # Examples
///
/// ```rust,no_run
/// use ratchet_cli::core::RatchetError;
///
/// let error = RatchetError::DownloadFailed {
///     path: "bin/app".to_string(),
///     reason: "connection reset".to_string(),
/// };
/// assert_eq!(error.exit_code(), 1);
/// ```
#[derive(Error, Debug, Clone)]
pub enum RatchetError {
    /// Version string does not parse as `major.minor.patch`
    ///
    /// Accepted shapes are exactly three dot-separated non-negative integers with
    /// an optional leading `v` or `V`. Pre-release and build suffixes are rejected.
    #[error("Invalid version format: '{version}'")]
    InvalidVersionFormat {
        /// The string that failed to parse
        version: String,
    },

    /// The release source has no manifest for the requested version
    #[error("No manifest found for version {version}")]
    ManifestNotFound {
        /// The version whose manifest was requested
        version: String,
    },

    /// The manifest exists but violates a structural invariant
    ///
    /// Raised when a path appears in more than one of the add/edit/delete lists,
    /// when a manifest names a protected path, or when the payload matches
    /// neither supported wire shape.
    #[error("Malformed manifest for version {version}: {reason}")]
    ManifestMalformed {
        /// The version whose manifest is malformed
        version: String,
        /// What invariant the manifest violates
        reason: String,
    },

    /// A relative path failed validation before reaching the filesystem layer
    #[error("Rejected path '{path}': {reason}")]
    PathValidationFailed {
        /// The offending path string
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// A single file download failed
    #[error("Failed to download '{path}': {reason}")]
    DownloadFailed {
        /// Relative path of the file that failed to download
        path: String,
        /// Network or I/O reason
        reason: String,
    },

    /// Creating the pre-step backup failed
    ///
    /// Fatal for the step: no mutation may happen without a safety net, so the
    /// engine aborts before touching the live directory.
    #[error("Failed to create backup before applying {version}: {reason}")]
    BackupCreationFailed {
        /// The step version the backup was meant to guard
        version: String,
        /// Why the snapshot could not be taken
        reason: String,
    },

    /// Restoring a backup over the live directory failed
    ///
    /// The most severe failure: the step already mutated the installation and the
    /// backward path is unreliable too. Surfaced loudly with exit code 3.
    #[error("Rollback from backup of {version} failed: {reason}")]
    RollbackFailed {
        /// The step version whose backup failed to restore
        version: String,
        /// Why the restore failed
        reason: String,
    },

    /// An update step failed and the installation was rolled back
    ///
    /// The live directory equals its pre-step state and the persisted version did
    /// not advance. Re-running the update retries the same step.
    #[error("Update step {version} failed and was rolled back ({} operation(s) failed)", failures.len())]
    StepFailed {
        /// The step version that failed
        version: String,
        /// Human-readable description of each failed operation
        failures: Vec<String>,
    },

    /// A fresh install failed before anything reached the live directory
    ///
    /// All downloads go into a staging directory that is discarded on failure,
    /// so unlike [`RatchetError::StepFailed`] there was nothing to roll back.
    #[error("Fresh install of {version} failed ({} operation(s) failed); no changes were made", failures.len())]
    InstallFailed {
        /// The version whose install failed
        version: String,
        /// Human-readable description of each failed operation
        failures: Vec<String>,
    },

    /// The installed-version file exists but cannot be parsed
    ///
    /// Never treated as a fresh install: an unreadable record means the real
    /// installed version is unknown, and guessing either way risks corrupting
    /// the installation.
    #[error("Installation state file {path} is corrupt (contents: '{content}')")]
    InstallationStateCorrupt {
        /// Path of the state file
        path: String,
        /// The unparsable contents, truncated for display
        content: String,
    },

    /// Merging the fresh-install staging directory into the live directory failed
    #[error("Failed to commit staged install: {reason}")]
    StagingCommitFailed {
        /// Why the merge failed
        reason: String,
    },

    /// The release source is unreachable or unhealthy
    #[error("Release source at {url} is unavailable: {reason}")]
    SourceUnavailable {
        /// Base URL of the source
        url: String,
        /// Health-check or connection failure reason
        reason: String,
    },

    /// The release source rejected the request due to rate limiting
    #[error("Release source rate limit hit during {operation}")]
    RateLimited {
        /// The request that was throttled
        operation: String,
    },

    /// The requested version is not newer than the installed one
    #[error("Already at version {version}")]
    AlreadyUpToDate {
        /// The currently installed version
        version: String,
    },

    /// The requested version is older than the installed one
    #[error("Requested version {requested} is older than installed version {current}")]
    DowngradeRejected {
        /// The currently installed version
        current: String,
        /// The requested target version
        requested: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// File system error
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// The file system operation that failed
        operation: String,
        /// Path where the failure occurred
        path: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl RatchetError {
    /// Process exit code for this error kind
    ///
    /// - `2`: the update was partially applied and rolled back
    /// - `3`: rollback itself failed, manual intervention required
    /// - `1`: everything else
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::RollbackFailed {
                ..
            } => 3,
            Self::StepFailed {
                ..
            } => 2,
            _ => 1,
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps a [`RatchetError`] and adds optional suggestions and
/// details. This is the primary way the CLI presents errors to users.
///
/// # Display Format
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
///
/// # Examples
///
/// ```rust,no_run
/// use ratchet_cli::core::{RatchetError, ErrorContext};
///
/// let context = ErrorContext::new(RatchetError::AlreadyUpToDate {
///     version: "1.2.0".to_string(),
/// })
/// .with_suggestion("Use 'ratchet list' to see which versions are available");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying updater error
    pub error: RatchetError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`RatchetError`]
    #[must_use]
    pub const fn new(error: RatchetError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    ///
    /// Suggestions should be actionable steps. They are displayed in green in
    /// the terminal to draw attention.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// Rollback failures additionally render a manual-intervention banner since
    /// re-running the updater is not a safe recovery for them.
    pub fn display(&self) {
        if matches!(
            self.error,
            RatchetError::RollbackFailed {
                ..
            }
        ) {
            eprintln!("{}", "MANUAL INTERVENTION REQUIRED".red().bold());
        }

        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }

    /// Create an [`ErrorContext`] with only a suggestion (no specific error)
    pub fn suggestion(suggestion: impl Into<String>) -> Self {
        Self {
            error: RatchetError::Other {
                message: String::new(),
            },
            suggestion: Some(suggestion.into()),
            details: None,
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// This function is the main entry point for converting arbitrary errors into
/// user-friendly messages for CLI display. It recognizes [`RatchetError`] variants
/// and provides tailored suggestions; [`std::io::Error`] and [`reqwest::Error`]
/// get filesystem- and network-specific guidance; everything else falls through
/// with basic context.
///
/// # Examples
///
/// ```rust,no_run
/// use ratchet_cli::core::{RatchetError, user_friendly_error};
///
/// let error = RatchetError::ManifestNotFound { version: "3.0.0".to_string() };
/// let context = user_friendly_error(anyhow::Error::from(error));
/// context.display();
/// ```
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(ratchet_error) = error.downcast_ref::<RatchetError>() {
        return create_error_context(ratchet_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(RatchetError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion(
                    "Check ownership of the installation directory or run with elevated permissions",
                )
                .with_details(format!("Permission denied: {io_error}"));
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(RatchetError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Verify the installation directory exists and is spelled correctly")
                .with_details(format!("File or directory not found: {io_error}"));
            }
            _ => {}
        }
    }

    if let Some(http_error) = error.downcast_ref::<reqwest::Error>() {
        let url = http_error.url().map_or_else(|| "unknown".to_string(), ToString::to_string);
        return ErrorContext::new(RatchetError::SourceUnavailable {
            url,
            reason: http_error.to_string(),
        })
        .with_suggestion("Check your network connection and the middleware URL in the configuration");
    }

    ErrorContext::new(RatchetError::Other {
        message: format!("{error:#}"),
    })
}

/// Attach standard suggestions and details to a typed error
fn create_error_context(error: RatchetError) -> ErrorContext {
    match &error {
        RatchetError::InvalidVersionFormat {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use three dot-separated numbers, e.g. '2.1.0' or 'v2.1.0'"),

        RatchetError::ManifestNotFound {
            version,
        } => {
            let suggestion =
                format!("Run 'ratchet list' to see available versions, or verify {version} was released");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        RatchetError::ManifestMalformed {
            ..
        } => ErrorContext::new(error)
            .with_details("The manifest was rejected before any file was touched")
            .with_suggestion("Report this to the release maintainers; the release metadata needs fixing"),

        RatchetError::PathValidationFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("Manifest paths must be relative and free of traversal or shell patterns"),

        RatchetError::DownloadFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and re-run the update"),

        RatchetError::BackupCreationFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("Nothing was modified; the update aborted before mutating the installation")
            .with_suggestion("Check free disk space and directory permissions, then re-run"),

        RatchetError::RollbackFailed {
            version,
            ..
        } => {
            let details = format!(
                "The installation may be inconsistent. The backup for {version} is retained on disk"
            );
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Restore the backup directory manually before running any further updates")
        }

        RatchetError::StepFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The installation was restored from the step's backup; the version did not change")
            .with_suggestion("Re-run the update to retry, or check the log for the failed operations"),

        RatchetError::InstallFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The staged files were discarded; no application files reached the installation directory")
            .with_suggestion("Check the log for the failed operations and re-run the install"),

        RatchetError::InstallationStateCorrupt {
            path,
            ..
        } => {
            let suggestion = format!(
                "Fix {path} to contain the installed version (e.g. '1.2.0'), or remove it to force a fresh install"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        RatchetError::StagingCommitFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The live directory may hold a partial install; the staging directory was kept for inspection"),

        RatchetError::SourceUnavailable {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Verify the middleware server is running and reachable, then re-run"),

        RatchetError::RateLimited {
            ..
        } => ErrorContext::new(error).with_suggestion("Wait a minute and re-run the update"),

        RatchetError::AlreadyUpToDate {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use 'ratchet check' to see whether a newer version exists"),

        RatchetError::DowngradeRejected {
            ..
        } => ErrorContext::new(error)
            .with_details("Downgrades are not supported; manifests only describe forward steps"),

        RatchetError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the configuration file syntax (TOML) and field names"),

        _ => ErrorContext::new(error),
    }
}
