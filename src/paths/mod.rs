//! Validated relative paths and the exclusion rules that protect user data.
//!
//! Every file named by a manifest passes through [`RelativePath::new`] before it
//! can reach any filesystem operation. The validator rejects traversal, absolute
//! paths, foreign separators, and a denylist of suspicious characters, so the
//! rest of the codebase can join these paths under the installation directory
//! without re-checking.

pub mod exclusions;

pub use exclusions::ExclusionRules;

use crate::core::RatchetError;
use anyhow::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Characters that never appear in legitimate manifest paths.
///
/// `~` (home expansion), `$` and `%` (environment expansion on either
/// platform), `:` (drive letters, also invalid in Windows file names), and the
/// shell metacharacters backtick, `;`, `|`, `&`.
const SUSPICIOUS_CHARS: [char; 8] = ['~', '$', '%', ':', '`', ';', '|', '&'];

/// A manifest-supplied path, guaranteed safe to join under the live directory.
///
/// Constructed only through the validating factory [`RelativePath::new`];
/// invalid strings never enter the data model. Stored with forward slashes,
/// the separator used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// Validate and wrap a path string.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::PathValidationFailed`] when the input:
    /// - is empty
    /// - contains a backslash (the other platform's separator)
    /// - is absolute
    /// - contains a parent-directory segment
    /// - contains any of the suspicious characters in [`SUSPICIOUS_CHARS`]
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ratchet_cli::paths::RelativePath;
    ///
    /// assert!(RelativePath::new("bin/app.py").is_ok());
    /// assert!(RelativePath::new("../etc/passwd").is_err());
    /// assert!(RelativePath::new("/etc/passwd").is_err());
    /// assert!(RelativePath::new("~/secrets").is_err());
    /// ```
    pub fn new(input: impl Into<String>) -> Result<Self> {
        let raw = input.into();

        let reject = |reason: &str| -> anyhow::Error {
            RatchetError::PathValidationFailed {
                path: raw.clone(),
                reason: reason.to_string(),
            }
            .into()
        };

        if raw.trim().is_empty() {
            return Err(reject("path is empty"));
        }
        if raw.contains('\\') {
            return Err(reject("backslash separators are not allowed"));
        }
        if raw.starts_with('/') {
            return Err(reject("absolute paths are not allowed"));
        }
        if let Some(found) = raw.chars().find(|c| SUSPICIOUS_CHARS.contains(c)) {
            return Err(reject(&format!("contains suspicious character '{found}'")));
        }

        for component in Path::new(&raw).components() {
            match component {
                Component::ParentDir => {
                    return Err(reject("parent directory traversal is not allowed"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(reject("absolute paths are not allowed"));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }

        Ok(Self(raw))
    }

    /// The validated path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components, split on `/`.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|part| !part.is_empty() && *part != ".")
    }

    /// Final component of the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.components().last().unwrap_or(&self.0)
    }

    /// Absolute location of this path under `base`.
    #[must_use]
    pub fn join_under(&self, base: &Path) -> PathBuf {
        let mut joined = base.to_path_buf();
        for part in self.components() {
            joined.push(part);
        }
        joined
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
