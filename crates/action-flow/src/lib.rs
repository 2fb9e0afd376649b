//! Metadata flows over the submission page.
//!
//! - [`MetadataApplier`]: writes one AI result into the form, in page-safe order
//! - [`ItemDriver`]: locate the current image, fetch metadata, apply it
//! - [`BatchDriver`]: walk the portfolio grid card by card
//! - [`RunSession`]: processing flags, stop signal and navigation cursor
//!
//! The drivers reach the page, the AI service and the settings store through
//! [`FlowDeps`], so tests run them against in-memory doubles.

pub mod applier;
pub mod batch;
pub mod deps;
pub mod errors;
pub mod item;
mod recovery;
pub mod session;
pub mod settings;
pub mod status;

#[cfg(test)]
mod fixtures;

pub use applier::{ApplyOptions, ApplyReport, Field, MetadataApplier};
pub use batch::{BatchDriver, BatchSummary};
pub use deps::{FlowDeps, DEFAULT_STUCK_CAP};
pub use errors::FlowError;
pub use item::{ItemDriver, ItemOutcome};
pub use session::{NavigationCursor, RunSession};
pub use settings::{MemorySettings, SettingsStore, StoredSettings, DEFAULT_TRIAL_COUNT};
pub use status::{NullStatus, StatusSink};
