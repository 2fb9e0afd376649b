//! Error types for the locator

use thiserror::Error;

/// Failures while turning page output into a [`crate::DomSnapshot`].
///
/// Locating itself never fails; a missing element is `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// Snapshot payload did not deserialize
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Nodes are not listed in document (pre-)order
    #[error("Snapshot node {node} is out of document order: {reason}")]
    OutOfOrder { node: u32, reason: String },
}
