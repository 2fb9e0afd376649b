//! Flow error types

use action_primitives::ActionError;
use ai_metadata::AiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Page detached or browser connection closed; ends the run
    #[error("Page context lost ({0}). Reload the page and re-attach.")]
    ContextLost(String),

    #[error("Could not find any large image (>100px) on the page")]
    NoImage,

    #[error("API key is missing. Set it with `stockmeta settings set api-key <KEY>`.")]
    MissingApiKey,

    #[error("Another run is already in progress")]
    Busy,

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Non-fatal page action failure
    #[error("Page action failed: {0}")]
    Action(ActionError),

    #[error("Settings unavailable: {0}")]
    Settings(String),
}

impl FlowError {
    /// Only a lost context halts a batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlowError::ContextLost(_))
    }
}

impl From<ActionError> for FlowError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::ContextLost(reason) => FlowError::ContextLost(reason),
            other => FlowError::Action(other),
        }
    }
}
