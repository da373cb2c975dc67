//! Unit test suite for ratchet.
//!
//! These tests exercise the library's pure logic through its public API:
//! version arithmetic and update paths, path validation, exclusion rules,
//! and manifest parsing. Everything here runs without touching the network
//! or spawning processes.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod exclusion_rules;
mod manifest_format;
mod relative_paths;
mod update_paths;
