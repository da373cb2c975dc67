//! Shared utilities for file system operations.
//!
//! Everything the updater writes to disk goes through the helpers in [`fs`]:
//! atomic file writes, recursive directory copies, and typed JSON reading.
//! Keeping these in one place means the staging, backup, and state code all
//! get the same durability guarantees.

pub mod fs;

pub use fs::{atomic_write, copy_dir, ensure_dir, remove_dir_all, safe_write};
