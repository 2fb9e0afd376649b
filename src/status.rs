//! Terminal spinner standing in for the page's busy indicator.

use std::time::Duration;

use action_flow::StatusSink;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

const TICK: Duration = Duration::from_millis(120);

pub struct ConsoleStatus {
    enabled: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleStatus {
    /// `enabled == false` keeps stdout clean for machine-readable output.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            spinner: Mutex::new(None),
        }
    }

    fn start(&self) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(TICK);
        spinner
    }
}

impl StatusSink for ConsoleStatus {
    fn busy(&self, message: &str) {
        let mut slot = self.spinner.lock();
        let spinner = slot.get_or_insert_with(|| self.start());
        spinner.set_message(message.to_string());
    }

    fn idle(&self) {
        if let Some(spinner) = self.spinner.lock().take() {
            spinner.finish_and_clear();
        }
    }

    fn run_finished(&self) {
        if self.enabled {
            eprintln!("Ready. Press Ctrl-C during a run to stop it.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockmeta_core_types::ImageId;

    #[test]
    fn spinner_is_reused_until_idle() {
        let status = ConsoleStatus::new(false);
        status.busy("Starting analysis...");
        status.item(2, 5, &ImageId::strict("https://x/2000102.jpg").unwrap());
        assert_eq!(
            status.spinner.lock().as_ref().map(|s| s.message()),
            Some("Processing card 2/5 (ID: 2000102)".to_string())
        );
        status.idle();
        assert!(status.spinner.lock().is_none());
    }
}
