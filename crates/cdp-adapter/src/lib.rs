//! Chromium DevTools Protocol adapter.
//!
//! Connects to a Chromium instance (an existing one through its debugging
//! endpoint, or a freshly launched one), attaches to the tab that shows the
//! submission page and exposes the few page-level commands the automation
//! needs: script evaluation and target bookkeeping.

mod adapter;
pub mod config;
pub mod error;
pub mod metrics;
mod transport;

pub use adapter::{AttachedPage, CdpAdapter, TargetSummary};
pub use error::{AdapterError, AdapterErrorKind};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
