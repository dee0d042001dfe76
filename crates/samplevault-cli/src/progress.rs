use indicatif::{ProgressBar, ProgressStyle};
use samplevault_core::{Phase, ProgressReporter, ProgressUpdate};
use std::time::Duration;

/// Renders job progress as a single percentage bar labelled with the phase.
pub struct CliReporter {
    bar: ProgressBar,
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} {prefix:>11.bold} [{bar:30.cyan/dim}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        bar.set_prefix("starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub fn update(&self, update: &ProgressUpdate) {
        self.on_progress(update.phase, update.percent, &update.message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliReporter {
    fn on_progress(&self, phase: Phase, percent: u8, message: &str) {
        self.bar.set_prefix(phase.as_str());
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }
}
