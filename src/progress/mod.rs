//! Progress reporting for update runs.
//!
//! Two audiences watch an update: a person at the terminal and other
//! processes that poll the progress state file. [`UpdateProgress`] feeds both
//! from the same engine callbacks, drawing an indicatif bar for the terminal
//! and persisting milestones through [`StateFileTracker`].
//!
//! # Environment Variables
//!
//! - `RATCHET_NO_PROGRESS`: set to any value to disable progress bars
//!   (automation and CI environments)

pub mod state_file;

pub use state_file::{STATE_FILE, StateFileTracker, UpdateStateRecord, UpdateStatus};

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;
use tracing::warn;

use crate::version::ReleaseVersion;

/// Checks if progress bars should be disabled.
///
/// Progress bars are disabled when the `RATCHET_NO_PROGRESS` environment
/// variable is set to any value.
fn is_progress_disabled() -> bool {
    std::env::var("RATCHET_NO_PROGRESS").is_ok()
}

fn bar_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// A progress bar with consistent styling that respects quiet environments.
///
/// Wraps the `indicatif` bar so every long-running operation in the updater
/// looks the same. When `RATCHET_NO_PROGRESS` is set the bar is hidden and
/// all operations become no-ops, which keeps script and CI output clean.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a progress bar tracking `len` work units.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(bar_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a spinner for operations with no measurable total.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Sets the message displayed alongside the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Sets the prefix displayed before the bar.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Advances the bar by `delta` units.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Completes the bar, leaving `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Completes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Drives both terminal and state-file progress through an update run.
///
/// The engine reports milestones here and nowhere else. State file failures
/// degrade to a warning after which the run continues terminal-only, so a
/// locked or unwritable state file can never abort an otherwise healthy
/// update.
pub struct UpdateProgress {
    bar: ProgressBar,
    tracker: Option<StateFileTracker>,
}

impl UpdateProgress {
    /// Starts progress for a run of `total_steps` steps toward `target`.
    pub async fn begin(
        tracker: Option<StateFileTracker>,
        target: &ReleaseVersion,
        total_steps: usize,
    ) -> Self {
        let bar = ProgressBar::new(total_steps as u64);
        bar.set_prefix(format!("Updating to {target}"));

        let mut progress = Self {
            bar,
            tracker,
        };
        if let Some(tracker) = progress.tracker.as_mut() {
            let result = tracker.begin().await;
            progress.drop_tracker_on_error(result);
        }
        progress
    }

    /// Reports that one update step is starting.
    pub async fn step_started(&mut self, version: &ReleaseVersion, operations: usize) {
        self.bar.set_message(format!("applying {version} ({operations} operation(s))"));
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.step_started(version, operations).await;
            self.drop_tracker_on_error(result);
        }
    }

    /// Updates the terminal message only. Cheap enough for per-file detail.
    pub fn detail(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Reports a coarse phase change within the current step.
    pub async fn phase(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.set_message(msg).await;
            self.drop_tracker_on_error(result);
        }
    }

    /// Reports that the current step committed.
    pub async fn step_completed(&mut self, version: &ReleaseVersion) {
        self.bar.inc(1);
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.step_completed(version).await;
            self.drop_tracker_on_error(result);
        }
    }

    /// Reports that the current step failed and the installation was
    /// restored from backup.
    pub async fn step_rolled_back(&mut self, version: &ReleaseVersion, error: &str) {
        self.bar.finish_and_clear();
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.mark_rolled_back(version, error).await;
            self.drop_tracker_on_error(result);
        }
    }

    /// Reports that every step committed.
    pub async fn finish_success(&mut self, version: &ReleaseVersion) {
        self.bar.finish_with_message(format!("now at {version}"));
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.mark_completed(version).await;
            self.drop_tracker_on_error(result);
        }
    }

    /// Reports that the run aborted without a rollback (for example a
    /// download failure before anything was touched).
    pub async fn finish_failure(&mut self, error: &str) {
        self.bar.finish_and_clear();
        if let Some(tracker) = self.tracker.as_mut() {
            let result = tracker.mark_failed(error).await;
            self.drop_tracker_on_error(result);
        }
    }

    fn drop_tracker_on_error(&mut self, result: anyhow::Result<()>) {
        if let Err(e) = result {
            warn!("Progress state file unavailable, continuing without it: {e:#}");
            self.tracker = None;
        }
    }
}
