//! The `check` command: report whether a newer release exists without
//! changing anything.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{debug, warn};

use crate::cache::{VersionCache, VersionCheckCache};
use crate::config::GlobalConfig;
use crate::core::RatchetError;
use crate::progress::ProgressBar;
use crate::source::{MiddlewareClient, latest_release};
use crate::state::StateStore;
use crate::version::ReleaseVersion;

/// Check for available updates.
///
/// Results are cached under the ratchet state directory, so repeated checks
/// within the configured interval answer from disk instead of asking the
/// middleware again.
#[derive(Parser, Debug)]
pub struct CheckCommand {
    /// Directory of the installation
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Ask the middleware even when a fresh cached answer exists
    #[arg(long)]
    no_cache: bool,
}

impl CheckCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let install_dir = config.resolve_install_dir(self.install_dir)?;
        let current = StateStore::new(&install_dir).load()?;

        let cache = match VersionCache::new() {
            Ok(cache) => Some(cache),
            Err(e) => {
                debug!("Version check cache unavailable: {e:#}");
                None
            }
        };

        if !self.no_cache {
            if let Some(cache) = &cache {
                if let Some(entry) = cache.load_fresh(config.check_interval()).await {
                    // An answer recorded for a different installed version
                    // no longer says anything useful.
                    if entry.current_version == current.map(|v| v.to_string()) {
                        report(current.as_ref(), &entry.latest()?, true);
                        return Ok(());
                    }
                }
            }
        }

        let source = MiddlewareClient::new(
            &config.middleware_url,
            config.repo.clone(),
            config.request_timeout(),
        )?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!("Checking {}", config.middleware_url));
        let fetched = latest_release(&source).await;
        spinner.finish_and_clear();

        let latest = fetched?.map(|entry| entry.version).ok_or_else(|| {
            RatchetError::SourceUnavailable {
                url: config.middleware_url.clone(),
                reason: "middleware advertises no releases".to_string(),
            }
        })?;

        if let Some(cache) = &cache {
            if let Err(e) = cache.store(&VersionCheckCache::new(current.as_ref(), &latest)).await {
                warn!("Failed to store the version check cache: {e:#}");
            }
        }

        report(current.as_ref(), &latest, false);
        Ok(())
    }
}

fn report(current: Option<&ReleaseVersion>, latest: &ReleaseVersion, cached: bool) {
    let suffix = if cached { " (cached)" } else { "" };
    match current {
        None => {
            println!(
                "No installed version found; latest available is {}{suffix}",
                latest.to_string().bold()
            );
            println!("Run {} to install it.", "ratchet update".cyan());
        }
        Some(current) if latest > current => {
            let kind = latest.update_kind_from(current);
            println!(
                "{} {current} -> {} ({kind} update){suffix}",
                "Update available:".yellow().bold(),
                latest.to_string().bold()
            );
            println!("Run {} to update.", "ratchet update".cyan());
        }
        Some(current) => {
            println!("{} Already up to date ({current}){suffix}", "✓".green());
        }
    }
}
