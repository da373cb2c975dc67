//! Protected-path rules applied before every destructive operation.
//!
//! The rule set decides which relative paths must survive installs, updates,
//! backups, and rollbacks untouched: user data, logs, caches, secrets, and the
//! updater's own metadata. Manifests cannot bypass these rules; a manifest that
//! names a protected path is rejected outright.
//!
//! Three rule kinds exist, inferred from the pattern text:
//! - trailing `/` or an embedded `/`: a path prefix, glob-capable per component
//!   (`user_data/`, `backup_*/`, `config/user_settings.json`)
//! - glob characters without `/`: matched against the file name (`*.tmp`, `.env.*`)
//! - plain text without `/`: matched against every path component (`.env`, `Thumbs.db`)
//!
//! Matching is always case-sensitive, on every platform.

use super::RelativePath;
use anyhow::{Context, Result};
use glob::Pattern;

/// Patterns every installation protects, regardless of configuration.
///
/// Mirrors what the application treats as user-owned or machine-generated data,
/// plus the updater's own bookkeeping files (`version.txt`, `update_state.json`)
/// and backup/staging directory names so a misplaced manifest entry can never
/// touch them.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    // User data and permanent folders
    "user_data/",
    "user_files/",
    "documents/",
    "media/",
    "config/user_settings.json",
    "logs/",
    "cache/",
    "temp/",
    // Backup and staging directories
    "backup_*/",
    "staging*/",
    // Temporary files
    "*.tmp",
    "*.temp",
    "*.bak",
    // Environment and sensitive files
    ".env",
    ".env.*",
    "*.key",
    "*.secret",
    // OS artifacts
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    // Updater metadata
    "version.txt",
    "update_state.json",
];

#[derive(Debug, Clone)]
enum ExclusionRule {
    /// Component-wise glob prefix: protects the named path and everything under it.
    PrefixGlob { raw: String, components: Vec<Pattern> },
    /// Glob matched against the final path component.
    FileNameGlob { raw: String, pattern: Pattern },
    /// Literal name matched against every path component.
    ExactName { name: String },
}

impl ExclusionRule {
    fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim_end_matches('/');

        if pattern.contains('/') {
            let components = trimmed
                .split('/')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    Pattern::new(part)
                        .with_context(|| format!("invalid exclusion pattern '{pattern}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::PrefixGlob {
                raw: pattern.to_string(),
                components,
            });
        }

        if pattern.contains(['*', '?', '[']) {
            let compiled = Pattern::new(pattern)
                .with_context(|| format!("invalid exclusion pattern '{pattern}'"))?;
            return Ok(Self::FileNameGlob {
                raw: pattern.to_string(),
                pattern: compiled,
            });
        }

        Ok(Self::ExactName {
            name: pattern.to_string(),
        })
    }

    fn matches_parts(&self, parts: &[&str]) -> bool {
        match self {
            Self::PrefixGlob {
                components,
                ..
            } => {
                if parts.len() < components.len() {
                    return false;
                }
                components.iter().zip(parts).all(|(pattern, part)| pattern.matches(part))
            }
            Self::FileNameGlob {
                pattern,
                ..
            } => parts.last().is_some_and(|name| pattern.matches(name)),
            Self::ExactName {
                name,
            } => parts.iter().any(|part| part == name),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::PrefixGlob {
                raw, ..
            }
            | Self::FileNameGlob {
                raw, ..
            } => raw,
            Self::ExactName {
                name,
            } => name,
        }
    }
}

/// Ordered set of protected-path rules.
///
/// Cheap to clone and share; the engine, the backup manager, and the manifest
/// validator all consult the same instance.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    rules: Vec<ExclusionRule>,
}

impl ExclusionRules {
    /// Rule set with no rules at all. Mainly useful in tests.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rules: Vec::new(),
        }
    }

    /// Build a rule set from textual patterns.
    ///
    /// # Errors
    ///
    /// Fails if any pattern is not a valid glob.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .map(|pattern| ExclusionRule::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
        })
    }

    /// Whether `path` is protected by any rule.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ratchet_cli::paths::{ExclusionRules, RelativePath};
    ///
    /// let rules = ExclusionRules::default();
    /// let protected = RelativePath::new("user_data/projects.db").unwrap();
    /// let ordinary = RelativePath::new("bin/app.py").unwrap();
    ///
    /// assert!(rules.is_protected(&protected));
    /// assert!(!rules.is_protected(&ordinary));
    /// ```
    #[must_use]
    pub fn is_protected(&self, path: &RelativePath) -> bool {
        let parts: Vec<&str> = path.components().collect();
        self.rules.iter().any(|rule| rule.matches_parts(&parts))
    }

    /// Whether a relative path given as a plain string is protected.
    ///
    /// Used when scanning existing installations, whose file names never went
    /// through [`RelativePath`] validation and may not pass it.
    #[must_use]
    pub fn is_protected_raw(&self, path: &str) -> bool {
        let parts: Vec<&str> =
            path.split('/').filter(|part| !part.is_empty() && *part != ".").collect();
        self.rules.iter().any(|rule| rule.matches_parts(&parts))
    }

    /// The first rule protecting `path`, for error messages.
    #[must_use]
    pub fn matching_rule(&self, path: &RelativePath) -> Option<&str> {
        let parts: Vec<&str> = path.components().collect();
        self.rules.iter().find(|rule| rule.matches_parts(&parts)).map(ExclusionRule::raw)
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        // The built-in patterns are statically known-good globs.
        Self::from_patterns(DEFAULT_EXCLUDE_PATTERNS.iter().copied())
            .expect("built-in exclusion patterns are valid")
    }
}
