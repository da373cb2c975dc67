//! Per-version update manifests and their wire-format adapter.
//!
//! A manifest describes one released version as file-level changes: paths to
//! add, paths to edit (re-download), paths to delete, and whether the release
//! requires a dependency-install step. The engine treats manifests as read-only
//! input.
//!
//! # Wire formats
//!
//! Two JSON shapes exist in the release history and both are accepted:
//!
//! ```json
//! // legacy flat shape
//! { "version": "1.2.0", "files_add": [...], "files_edit": [...], "files_delete": [...] }
//!
//! // current shape, file lists nested under "codebase"
//! { "version": "1.2.0", "codebase": { "files_add": [...], "files_edit": [...], "files_delete": [...] } }
//! ```
//!
//! [`Manifest::parse_json`] normalizes both into the one internal type so no
//! other code ever branches on shape. A top-level `req.txt` or `dependencies`
//! key marks the release as requiring a dependency install.
//!
//! # Invariants
//!
//! - Every path is a validated [`RelativePath`]; malformed paths fail parsing
//!   with a path-validation error before any filesystem work starts.
//! - A path may appear in at most one of the three lists; overlap is a
//!   malformed manifest, not a silent pick.
//! - [`Manifest::ensure_allowed`] rejects manifests that name protected paths;
//!   the engine calls it before taking a backup.

use crate::core::RatchetError;
use crate::paths::{ExclusionRules, RelativePath};
use crate::version::ReleaseVersion;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Normalized description of one version's file-level changes.
#[derive(Debug, Clone)]
pub struct Manifest {
    version: ReleaseVersion,
    files_add: Vec<RelativePath>,
    files_edit: Vec<RelativePath>,
    files_delete: Vec<RelativePath>,
    requires_dependency_install: bool,
}

/// Raw manifest payload as served by the release source.
///
/// Covers both wire shapes at once: when `codebase` is present its lists win,
/// otherwise the top-level lists apply. Unknown fields (build dates, release
/// notes, platform blocks) are ignored.
#[derive(Debug, Deserialize)]
struct WireManifest {
    version: Option<String>,
    manifest_version: Option<String>,
    codebase: Option<WireFileLists>,
    #[serde(flatten)]
    flat: WireFileLists,
    #[serde(rename = "req.txt")]
    req_txt: Option<serde_json::Value>,
    dependencies: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFileLists {
    #[serde(default)]
    files_add: Vec<String>,
    #[serde(default)]
    files_edit: Vec<String>,
    #[serde(default)]
    files_delete: Vec<String>,
}

impl Manifest {
    /// Build a manifest from already-validated parts.
    ///
    /// Deduplicates within each list, then enforces the cross-list invariant.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::ManifestMalformed`] if any path appears in more
    /// than one list.
    pub fn new(
        version: ReleaseVersion,
        files_add: Vec<RelativePath>,
        files_edit: Vec<RelativePath>,
        files_delete: Vec<RelativePath>,
        requires_dependency_install: bool,
    ) -> Result<Self> {
        let manifest = Self {
            version,
            files_add: dedupe(files_add),
            files_edit: dedupe(files_edit),
            files_delete: dedupe(files_delete),
            requires_dependency_install,
        };
        manifest.check_overlap()?;
        Ok(manifest)
    }

    /// Parse and normalize a manifest payload for `requested` version.
    ///
    /// The step version the engine asked for is authoritative; a differing
    /// version field in the payload is logged, not trusted.
    ///
    /// # Errors
    ///
    /// - [`RatchetError::ManifestMalformed`] for unparsable JSON or cross-list
    ///   path overlap
    /// - [`RatchetError::PathValidationFailed`] for any malformed path entry
    pub fn parse_json(raw: &[u8], requested: &ReleaseVersion) -> Result<Self> {
        let wire: WireManifest =
            serde_json::from_slice(raw).map_err(|e| RatchetError::ManifestMalformed {
                version: requested.to_string(),
                reason: format!("invalid manifest JSON: {e}"),
            })?;

        if let Some(claimed) = wire.version.as_deref().or(wire.manifest_version.as_deref()) {
            match ReleaseVersion::parse(claimed) {
                Ok(parsed) if parsed != *requested => {
                    warn!(
                        requested = %requested,
                        claimed = %parsed,
                        "manifest payload claims a different version; using the requested one"
                    );
                }
                Ok(_) => {}
                Err(_) => debug!(claimed, "ignoring unparsable version field in manifest"),
            }
        }

        let requires_dependency_install =
            wire.req_txt.is_some() || wire.dependencies.as_ref().is_some_and(is_truthy);

        let lists = wire.codebase.unwrap_or(wire.flat);
        Self::new(
            *requested,
            validate_paths(lists.files_add)?,
            validate_paths(lists.files_edit)?,
            validate_paths(lists.files_delete)?,
            requires_dependency_install,
        )
    }

    /// Reject the manifest if it names any protected path.
    ///
    /// Exclusion rules are never bypassed by manifests: naming a protected path
    /// in any list makes the whole manifest malformed, and the engine refuses
    /// it before any backup or mutation.
    ///
    /// # Errors
    ///
    /// Returns [`RatchetError::ManifestMalformed`] naming the first offending
    /// path and the rule that protects it.
    pub fn ensure_allowed(&self, rules: &ExclusionRules) -> Result<()> {
        for (kind, paths) in [
            ("add", &self.files_add),
            ("edit", &self.files_edit),
            ("delete", &self.files_delete),
        ] {
            for path in paths {
                if let Some(rule) = rules.matching_rule(path) {
                    return Err(RatchetError::ManifestMalformed {
                        version: self.version.to_string(),
                        reason: format!(
                            "refuses to {kind} protected path '{path}' (rule '{rule}')"
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// The version this manifest describes.
    #[must_use]
    pub const fn version(&self) -> ReleaseVersion {
        self.version
    }

    /// Paths to download that are new in this version.
    #[must_use]
    pub fn files_add(&self) -> &[RelativePath] {
        &self.files_add
    }

    /// Paths to re-download because this version changed them.
    #[must_use]
    pub fn files_edit(&self) -> &[RelativePath] {
        &self.files_edit
    }

    /// Paths this version removes.
    #[must_use]
    pub fn files_delete(&self) -> &[RelativePath] {
        &self.files_delete
    }

    /// Whether this version requires a dependency-install step.
    #[must_use]
    pub const fn requires_dependency_install(&self) -> bool {
        self.requires_dependency_install
    }

    /// Total tracked operations this manifest will produce.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.files_add.len()
            + self.files_edit.len()
            + self.files_delete.len()
            + usize::from(self.requires_dependency_install)
    }

    fn check_overlap(&self) -> Result<()> {
        let mut seen: HashSet<&RelativePath> = HashSet::new();
        for path in
            self.files_add.iter().chain(&self.files_edit).chain(&self.files_delete)
        {
            if !seen.insert(path) {
                return Err(RatchetError::ManifestMalformed {
                    version: self.version.to_string(),
                    reason: format!("path '{path}' appears in more than one file list"),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn validate_paths(raw: Vec<String>) -> Result<Vec<RelativePath>> {
    raw.into_iter()
        .map(|entry| {
            RelativePath::new(entry.clone())
                .with_context(|| format!("manifest entry '{entry}' is not a usable path"))
        })
        .collect()
}

fn dedupe(paths: Vec<RelativePath>) -> Vec<RelativePath> {
    let mut seen = HashSet::new();
    paths.into_iter().filter(|path| seen.insert(path.clone())).collect()
}

/// Mirrors the loose truthiness the release history relies on: JSON `null`,
/// `false`, `""`, `0`, `[]`, and `{}` do not signal a dependency install.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::Number(number) => number.as_f64() != Some(0.0),
        serde_json::Value::String(text) => !text.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}
