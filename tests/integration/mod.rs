//! End-to-end tests for the update pipeline and the CLI surface.
//!
//! Engine tests drive [`ratchet_cli::engine::UpdateEngine`] against an
//! in-memory release source and a real temporary installation directory.
//! CLI tests run the compiled `ratchet` binary.

mod cli_surface;
mod recovery;
mod update_pipeline;
