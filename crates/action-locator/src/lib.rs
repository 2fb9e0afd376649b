//! Element locator for the submission page.
//!
//! Works on flat DOM snapshots pulled from the page and resolves each
//! [`Role`] through an ordered chain of strategies:
//! - exact test-id selectors first
//! - attribute and label heuristics next
//! - geometry (largest visible image) and sequence heuristics last
//!
//! Nothing here talks to the browser; every lookup is a pure function of a
//! [`DomSnapshot`], which keeps the heuristics testable without one.

pub mod errors;
pub mod navigation;
pub mod profile;
pub mod resolver;
pub mod snapshot;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use profile::SiteProfile;
pub use resolver::*;
pub use snapshot::*;
pub use strategies::{Chain, Strategy};
pub use types::*;
