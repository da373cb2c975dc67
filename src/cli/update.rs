//! The `update` command: install the application or advance it to a newer
//! version, one backed-up step at a time.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::cache::VersionCache;
use crate::config::GlobalConfig;
use crate::core::RatchetError;
use crate::engine::UpdateEngine;
use crate::source::{MiddlewareClient, ReleaseSource, latest_release};
use crate::state::StateStore;
use crate::version::{ReleaseVersion, UpdateKind};

/// Install the application or update it to a newer version.
///
/// Without a version argument the newest advertised release is used. A
/// missing installation (no version marker) selects the fresh-install path;
/// otherwise every intermediate release between the installed version and
/// the target is applied as its own reversible step.
#[derive(Parser, Debug)]
pub struct UpdateCommand {
    /// Target version (e.g. "2.1.3" or "v2.1.3"); defaults to the latest release
    #[arg(value_name = "VERSION")]
    version: Option<String>,

    /// Directory of the installation
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    yes: bool,

    /// Skip dependency installation even when a release requests it
    #[arg(long)]
    no_deps: bool,
}

impl UpdateCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let install_dir = config.resolve_install_dir(self.install_dir)?;
        let source = MiddlewareClient::new(
            &config.middleware_url,
            config.repo.clone(),
            config.request_timeout(),
        )?;

        // An unreachable middleware should fail the run before anything
        // looks at the installation.
        source.health_check().await?;

        let target = match &self.version {
            Some(raw) => ReleaseVersion::parse(raw)?,
            None => newest_available(&source, &config.middleware_url).await?,
        };

        let current = StateStore::new(&install_dir).load()?;
        if let Some(current) = current {
            if target.update_kind_from(&current) == UpdateKind::Major
                && !self.yes
                && !confirm_major(&current, &target).await?
            {
                println!("{}", "Update cancelled.".yellow());
                return Ok(());
            }
        }

        let engine = UpdateEngine::new(source, &install_dir)
            .max_concurrent_downloads(config.max_concurrent_downloads)
            .dependency_install_command(config.dependency_install_command.clone())
            .skip_dependencies(self.no_deps);

        let outcome = engine.install_or_update(&target).await?;

        // A cached "update available" answer now points backwards.
        clear_version_cache().await;

        match outcome.previous {
            None => println!(
                "{} Installed {} to {}",
                "✓".green(),
                outcome.installed.to_string().bold(),
                install_dir.display()
            ),
            Some(previous) => println!(
                "{} Updated {previous} -> {} ({} step(s))",
                "✓".green(),
                outcome.installed.to_string().bold(),
                outcome.steps.len()
            ),
        }

        Ok(())
    }
}

/// Newest release the middleware advertises.
async fn newest_available(source: &MiddlewareClient, url: &str) -> Result<ReleaseVersion> {
    let entry = latest_release(source).await?.ok_or_else(|| RatchetError::SourceUnavailable {
        url: url.to_string(),
        reason: "middleware advertises no releases".to_string(),
    })?;
    Ok(entry.version)
}

/// Asks before crossing a major version boundary.
///
/// A non-interactive stdin declines and points at `--yes`.
async fn confirm_major(current: &ReleaseVersion, target: &ReleaseVersion) -> Result<bool> {
    println!(
        "{}",
        format!("Updating {current} -> {target} crosses a major version and may include breaking changes.")
            .yellow()
            .bold()
    );

    if !std::io::stdin().is_terminal() {
        eprintln!("Non-interactive session; pass {} to proceed.", "--yes".cyan());
        return Ok(false);
    }

    print!("{} ", "Continue? [y/N]:".green());
    std::io::stdout().flush()?;

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut response = String::new();
    reader.read_line(&mut response).await?;
    let response = response.trim().to_lowercase();

    Ok(response == "y" || response == "yes")
}

/// Best-effort eviction of the version check cache after a successful run.
async fn clear_version_cache() {
    match VersionCache::new() {
        Ok(cache) => {
            if let Err(e) = cache.clear().await {
                warn!("Failed to clear the version check cache: {e:#}");
            }
        }
        Err(e) => debug!("Version check cache unavailable: {e:#}"),
    }
}
