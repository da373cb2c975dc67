//! Command-line interface for the ratchet updater.
//!
//! Each subcommand lives in its own module with its own argument struct and
//! execution logic, dispatched from [`Cli::execute`]. Global flags control
//! verbosity, progress rendering, and the configuration file location, and
//! apply to every subcommand.
//!
//! # Commands
//!
//! - `update` - install the application or update it to a newer version
//! - `check` - report whether a newer release is available
//! - `list` - list the releases the middleware advertises
//! - `status` - show the installed version and the last update run

mod check;
mod list;
mod status;
mod update;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;

/// Runtime settings derived from the global CLI flags.
///
/// Translating flags into this struct keeps environment mutation in one
/// place ([`apply_to_env`](Self::apply_to_env)) and lets tests inject
/// settings without parsing a command line.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter for this crate when `RUST_LOG` is not set; `None`
    /// keeps errors only.
    pub log_level: Option<String>,
    /// Disable progress bars and spinners.
    pub no_progress: bool,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies these settings to the process environment.
    ///
    /// # Safety
    ///
    /// Environment mutation is only sound while no other thread is running.
    /// `main` calls this before the async runtime is built; nothing may call
    /// it later.
    pub unsafe fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: the caller upholds the single-threaded precondition.
            unsafe { std::env::set_var("RATCHET_NO_PROGRESS", "1") };
        }
    }
}

/// Top-level argument structure for the `ratchet` binary.
#[derive(Parser)]
#[command(
    name = "ratchet",
    about = "Staged application updater with per-step backup and rollback",
    version,
    long_about = "Ratchet installs and updates applications by walking every \
                  intermediate release between the installed version and the \
                  target, applying each release as its own backed-up, \
                  reversible step."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Install the application or update it to a newer version
    Update(update::UpdateCommand),

    /// Check whether a newer release is available
    Check(check::CheckCommand),

    /// List the releases the middleware advertises
    List(list::ListCommand),

    /// Show the installed version and the outcome of the last update run
    Status(status::StatusCommand),
}

impl Cli {
    /// Executes the parsed command with settings derived from the flags.
    ///
    /// Environment-level settings are expected to already be applied by
    /// `main`; this method initializes logging, loads the global
    /// configuration, and dispatches to the subcommand.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translates the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
        }
    }

    /// Executes with an explicit configuration, for tests and embedding.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        init_logging(config.log_level.as_deref());

        let global = GlobalConfig::load_with_optional(self.config.clone()).await?;

        match self.command {
            Commands::Update(cmd) => cmd.execute(&global).await,
            Commands::Check(cmd) => cmd.execute(&global).await,
            Commands::List(cmd) => cmd.execute(&global).await,
            Commands::Status(cmd) => cmd.execute(&global).await,
        }
    }
}

/// Installs the global tracing subscriber, writing to stderr so command
/// output on stdout stays machine-readable.
///
/// `RUST_LOG` always wins. Otherwise `level` sets the directive for this
/// crate with dependencies kept at `warn`, and `None` silences everything
/// below errors.
fn init_logging(level: Option<&str>) {
    let fallback = level.map_or_else(|| "error".to_string(), |l| format!("warn,ratchet_cli={l}"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
