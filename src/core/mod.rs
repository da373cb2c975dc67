//! Core types and functionality for Ratchet
//!
//! This module forms the foundation of the updater's type system. It currently
//! hosts the error machinery used throughout the codebase.
//!
//! # Error Management
//!
//! Ratchet uses an error handling system designed for both developer ergonomics
//! and end-user experience:
//! - **Strongly-typed errors** ([`RatchetError`]) for precise error handling in code
//! - **User-friendly contexts** ([`ErrorContext`]) with actionable suggestions for CLI users
//! - **Exit-code mapping** ([`RatchetError::exit_code`]) so scripts can distinguish
//!   "rolled back" from "rollback failed"
//!
//! # Examples
//!
//! ```rust
//! use ratchet_cli::core::{RatchetError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn example_operation() -> Result<String> {
//!     Err(RatchetError::ManifestNotFound { version: "2.0.0".to_string() }.into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     let friendly = user_friendly_error(e);
//!     friendly.display(); // Shows colored error with suggestions
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, RatchetError, user_friendly_error};
