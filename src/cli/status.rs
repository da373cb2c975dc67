//! The `status` command: report the local installation state.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::config::GlobalConfig;
use crate::progress::{StateFileTracker, UpdateStatus};
use crate::state::StateStore;

/// Show the installed version and the outcome of the last update run.
///
/// Reads only local state; the middleware is never contacted.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Directory of the installation
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
}

impl StatusCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let install_dir = config.resolve_install_dir(self.install_dir)?;
        println!("Installation: {}", install_dir.display());

        match StateStore::new(&install_dir).load()? {
            Some(version) => {
                println!("Installed version: {}", version.to_string().bold());
            }
            None => println!("{}", "No installed version found.".yellow()),
        }

        match StateFileTracker::load(&install_dir) {
            Ok(Some(record)) => {
                let status = match record.status {
                    UpdateStatus::Completed => record.status.to_string().green(),
                    UpdateStatus::Running => record.status.to_string().cyan(),
                    UpdateStatus::Failed | UpdateStatus::RolledBack => {
                        record.status.to_string().red()
                    }
                };
                println!(
                    "Last update run: {} -> {} [{status}]",
                    record.from_version.as_deref().unwrap_or("none"),
                    record.target_version,
                );
                println!(
                    "  {}/{} step(s), {}",
                    record.steps_completed, record.steps_total, record.message
                );
                if let Some(error) = &record.error {
                    println!("  error: {}", error.red());
                }
            }
            Ok(None) => println!("No update has run yet."),
            Err(e) => {
                println!("{}", format!("Update state file unreadable: {e:#}").yellow());
            }
        }

        Ok(())
    }
}
