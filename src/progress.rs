//! Console progress reporting for apply runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use provision::{ProgressCallback, Step, StepStatus};
use std::time::Duration;

use crate::ui;

/// Spinner shown while a single step fetches and installs.
fn spinner(msg: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(msg);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Progress callback printing one line per step.
pub struct ConsoleProgress {
    quiet: bool,
    active: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            active: None,
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_step_start(&mut self, step: &Step, index: usize, total: usize) {
        if self.quiet {
            return;
        }
        let msg = format!(
            "{} {} {}",
            format!("[{}/{}]", index + 1, total).blue().bold(),
            step.name.bold(),
            step.description().dimmed()
        );
        self.active = Some(spinner(msg));
    }

    fn on_step_complete(&mut self, step: &Step, status: &StepStatus) {
        if let Some(bar) = self.active.take() {
            bar.finish_and_clear();
        }
        if self.quiet {
            return;
        }
        match status {
            StepStatus::AlreadySatisfied => ui::dim(&format!("{} already satisfied", step.name)),
            StepStatus::Succeeded => ui::success(&step.name),
            StepStatus::Skipped => ui::info(&format!("{} would install (dry run)", step.name)),
            StepStatus::Failed { error, .. } => {
                ui::error(&format!("{}: {}", step.name, error));
            }
            StepStatus::NotRun => {}
        }
    }
}
