//! Computation of the staged upgrade path between two versions.
//!
//! An update from `1.0.0` to `2.1.3` is not applied in one jump: each
//! intermediate version carries its own manifest and is applied as its own
//! rollback-guarded step. This module derives that sequence of steps.

use super::ReleaseVersion;

/// Ordered intermediate versions to pass through when updating from `current`
/// to `target`, ending exactly at `target`.
///
/// The sequence is built from bump operations: every major bump up to the
/// target major first, then every minor bump within the target major, then
/// every patch bump within the target minor. The result is strictly increasing
/// and its last element equals `target`. When `target <= current` the path is
/// empty; callers reject those requests before asking for a path.
///
/// The walk assumes every intermediate integer version was actually released.
/// Sparse release histories will produce steps whose manifests do not exist,
/// which the engine surfaces as a missing-manifest error for that step.
///
/// # Examples
///
/// ```rust
/// use ratchet_cli::version::{ReleaseVersion, path_between};
///
/// let current = ReleaseVersion::new(1, 0, 0);
/// let target = ReleaseVersion::new(2, 1, 3);
///
/// let path = path_between(&current, &target);
/// let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
/// assert_eq!(rendered, ["2.0.0", "2.1.0", "2.1.1", "2.1.2", "2.1.3"]);
/// ```
#[must_use]
pub fn path_between(current: &ReleaseVersion, target: &ReleaseVersion) -> Vec<ReleaseVersion> {
    if target <= current {
        return Vec::new();
    }

    let mut steps = Vec::new();
    let mut cursor = *current;

    while cursor.major() < target.major() {
        cursor = cursor.bump_major();
        steps.push(cursor);
    }
    while cursor.minor() < target.minor() {
        cursor = cursor.bump_minor();
        steps.push(cursor);
    }
    while cursor.patch() < target.patch() {
        cursor = cursor.bump_patch();
        steps.push(cursor);
    }

    steps
}
