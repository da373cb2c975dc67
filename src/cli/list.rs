//! The `list` command: show every release the middleware advertises.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::config::GlobalConfig;
use crate::progress::ProgressBar;
use crate::source::{MiddlewareClient, ReleaseSource};

/// List available releases, newest first.
#[derive(Parser, Debug)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let source = MiddlewareClient::new(
            &config.middleware_url,
            config.repo.clone(),
            config.request_timeout(),
        )?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!("Fetching releases from {}", config.middleware_url));
        let fetched = source.list_releases().await;
        spinner.finish_and_clear();
        let mut releases = fetched?;

        if releases.is_empty() {
            println!("No releases available from {}", config.middleware_url);
            return Ok(());
        }

        releases.sort_by(|a, b| b.version.cmp(&a.version));

        println!("{}", format!("Available releases ({}):", releases.len()).bold());
        for (index, release) in releases.iter().enumerate() {
            if index == 0 {
                println!(
                    "  {} {}  {}",
                    release.version.to_string().bold(),
                    "(latest)".green(),
                    release.identifier
                );
            } else {
                println!("  {}  {}", release.version, release.identifier);
            }
        }

        Ok(())
    }
}
