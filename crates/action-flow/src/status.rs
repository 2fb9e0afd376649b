//! Console status surface driven by the flows.

use stockmeta_core_types::ImageId;

/// Where progress is shown. The CLI backs this with a spinner.
pub trait StatusSink: Send + Sync {
    /// Show the busy indicator with `message`.
    fn busy(&self, message: &str);

    /// Hide the busy indicator.
    fn idle(&self);

    fn item(&self, index: usize, total: usize, id: &ImageId) {
        self.busy(&format!("Processing card {}/{} (ID: {})", index, total, id));
    }

    /// The run is over; restore the stop control.
    fn run_finished(&self) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn busy(&self, _message: &str) {}

    fn idle(&self) {}
}
