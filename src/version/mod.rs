//! Semantic version handling for staged updates.
//!
//! This module provides the [`ReleaseVersion`] type used throughout the updater,
//! plus the classification of one version against another ([`UpdateKind`]) and
//! the computation of the staged upgrade path between two versions
//! ([`path::path_between`]).
//!
//! Release versions are a deliberately narrow subset of semver: exactly three
//! dot-separated non-negative integers with an optional leading `v`/`V`.
//! Pre-release and build metadata are rejected because the update engine derives
//! intermediate versions by integer arithmetic on the components, which has no
//! meaning for `1.2.3-rc.1` style versions.
//!
//! # Examples
//!
//! ```rust
//! use ratchet_cli::version::{ReleaseVersion, UpdateKind};
//!
//! # fn example() -> anyhow::Result<()> {
//! let current = ReleaseVersion::parse("v1.4.2")?;
//! let target = ReleaseVersion::parse("2.0.0")?;
//!
//! assert!(target > current);
//! assert_eq!(target.update_kind_from(&current), UpdateKind::Major);
//! assert_eq!(current.bump_major(), target);
//! # Ok(())
//! # }
//! ```

pub mod path;

pub use path::path_between;

use crate::core::RatchetError;
use anyhow::Result;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A released application version: `major.minor.patch`.
///
/// Immutable by construction; the bump operations return new values. Ordering is
/// lexicographic on `(major, minor, patch)`, which is exactly semver ordering for
/// versions without pre-release metadata.
///
/// Serialized as its display string (`"1.2.3"`) so manifests and cache files stay
/// human-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl ReleaseVersion {
    /// Create a version from raw components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string.
    ///
    /// Accepts an optional leading `v` or `V` and surrounding whitespace. The
    /// remainder must be exactly three dot-separated non-negative integers;
    /// pre-release or build suffixes fail.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::InvalidVersionFormat`] for any other shape.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ratchet_cli::version::ReleaseVersion;
    ///
    /// assert!(ReleaseVersion::parse("1.2.3").is_ok());
    /// assert!(ReleaseVersion::parse("v1.2.3").is_ok());
    /// assert!(ReleaseVersion::parse(" V1.2.3 ").is_ok());
    /// assert!(ReleaseVersion::parse("1.2").is_err());
    /// assert!(ReleaseVersion::parse("1.2.3-rc.1").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        let parsed = semver::Version::parse(bare).map_err(|_| RatchetError::InvalidVersionFormat {
            version: input.to_string(),
        })?;

        if !parsed.pre.is_empty() || !parsed.build.is_empty() {
            return Err(RatchetError::InvalidVersionFormat {
                version: input.to_string(),
            }
            .into());
        }

        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.patch
    }

    /// Next major version; minor and patch reset to zero.
    #[must_use]
    pub const fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// Next minor version within the same major; patch resets to zero.
    #[must_use]
    pub const fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Next patch version within the same minor.
    #[must_use]
    pub const fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// Classify `self` as an update relative to `current`.
    ///
    /// Exactly one of the five kinds applies to any pair of versions:
    /// [`UpdateKind::Invalid`] means `self` is older than `current` (a downgrade),
    /// which callers must surface rather than coerce.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ratchet_cli::version::{ReleaseVersion, UpdateKind};
    ///
    /// let current = ReleaseVersion::new(1, 4, 2);
    ///
    /// assert_eq!(ReleaseVersion::new(2, 0, 0).update_kind_from(&current), UpdateKind::Major);
    /// assert_eq!(ReleaseVersion::new(1, 5, 0).update_kind_from(&current), UpdateKind::Minor);
    /// assert_eq!(ReleaseVersion::new(1, 4, 3).update_kind_from(&current), UpdateKind::Patch);
    /// assert_eq!(current.update_kind_from(&current), UpdateKind::Same);
    /// assert_eq!(ReleaseVersion::new(1, 4, 1).update_kind_from(&current), UpdateKind::Invalid);
    /// ```
    #[must_use]
    pub fn update_kind_from(&self, current: &Self) -> UpdateKind {
        if self.major > current.major {
            UpdateKind::Major
        } else if self.major == current.major && self.minor > current.minor {
            UpdateKind::Minor
        } else if self.major == current.major
            && self.minor == current.minor
            && self.patch > current.patch
        {
            UpdateKind::Patch
        } else if self == current {
            UpdateKind::Same
        } else {
            UpdateKind::Invalid
        }
    }

    /// The version string with a leading `v`, as the release source tags it.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("v{self}")
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ReleaseVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReleaseVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// How a target version relates to the currently installed one.
///
/// Produced by [`ReleaseVersion::update_kind_from`]; the CLI uses it both to
/// reject downgrades and to decide when a major-update confirmation is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Target has a higher major component.
    Major,
    /// Same major, higher minor.
    Minor,
    /// Same major and minor, higher patch.
    Patch,
    /// Target equals the installed version.
    Same,
    /// Target is older than the installed version.
    Invalid,
}

impl UpdateKind {
    /// Whether this kind represents a real forward update.
    #[must_use]
    pub const fn is_upgrade(&self) -> bool {
        matches!(self, Self::Major | Self::Minor | Self::Patch)
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Same => "same",
            Self::Invalid => "invalid",
        };
        write!(f, "{label}")
    }
}
