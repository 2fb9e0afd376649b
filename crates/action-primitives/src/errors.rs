//! Error types for page actions

use cdp_adapter::{AdapterError, AdapterErrorKind};
use stockmeta_core_types::ElementHandle;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// Handle belongs to a snapshot the page no longer keeps
    #[error("Stale element handle {handle}: page is at generation {current}")]
    StaleHandle { handle: ElementHandle, current: u64 },

    /// Element was removed from the document after the snapshot
    #[error("Element {0} is no longer attached to the document")]
    ElementGone(ElementHandle),

    /// The page or the browser connection went away; the run cannot continue
    #[error("Page context lost: {0}")]
    ContextLost(String),

    /// Injected script threw
    #[error("Script error: {0}")]
    Script(String),

    /// CDP command did not answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Clipboard write was refused by the page
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    /// Snapshot payload could not be decoded
    #[error("Malformed snapshot: {0}")]
    Snapshot(String),
}

impl ActionError {
    /// Only a lost context ends a run; everything else is per-step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::ContextLost(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            ActionError::StaleHandle { .. } | ActionError::ElementGone(_)
        )
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.hint.clone().unwrap_or_else(|| err.to_string());
        match err.kind {
            AdapterErrorKind::Disconnected | AdapterErrorKind::TargetNotFound => {
                ActionError::ContextLost(message)
            }
            AdapterErrorKind::Evaluation => ActionError::Script(message),
            AdapterErrorKind::Timeout => ActionError::Timeout(message),
            AdapterErrorKind::CdpIo | AdapterErrorKind::Internal => ActionError::CdpIo(message),
        }
    }
}

impl From<action_locator::LocatorError> for ActionError {
    fn from(err: action_locator::LocatorError) -> Self {
        ActionError::Snapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_maps_to_fatal_context_loss() {
        let err: ActionError = AdapterError::new(AdapterErrorKind::Disconnected)
            .with_hint("page was closed")
            .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("page was closed"));

        let err: ActionError = AdapterError::new(AdapterErrorKind::Evaluation).into();
        assert!(matches!(err, ActionError::Script(_)));
        assert!(!err.is_fatal());
    }
}
