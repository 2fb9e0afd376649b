use std::sync::Arc;

use action_locator::Locator;
use action_primitives::{PageDriver, Timing};
use ai_metadata::MetadataService;

use crate::settings::SettingsStore;
use crate::status::{NullStatus, StatusSink};

/// Recovery attempts on one stuck item before giving up on it.
pub const DEFAULT_STUCK_CAP: u32 = 6;

/// Collaborators shared by the drivers.
#[derive(Clone)]
pub struct FlowDeps {
    pub page: Arc<dyn PageDriver>,
    pub locator: Arc<Locator>,
    pub timing: Timing,
    pub ai: Arc<dyn MetadataService>,
    pub settings: Arc<dyn SettingsStore>,
    pub status: Arc<dyn StatusSink>,
    pub stuck_cap: u32,
}

impl FlowDeps {
    pub fn new(
        page: Arc<dyn PageDriver>,
        ai: Arc<dyn MetadataService>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            page,
            locator: Arc::new(Locator::default()),
            timing: Timing::default(),
            ai,
            settings,
            status: Arc::new(NullStatus),
            stuck_cap: DEFAULT_STUCK_CAP,
        }
    }

    pub fn with_locator(mut self, locator: Arc<Locator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn with_stuck_cap(mut self, cap: u32) -> Self {
        self.stuck_cap = cap;
        self
    }
}
