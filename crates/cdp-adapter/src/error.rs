use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorKind {
    #[error("command timed out")]
    Timeout,
    #[error("cdp i/o failure")]
    CdpIo,
    /// The attached tab, its session or the whole connection went away.
    #[error("page context lost")]
    Disconnected,
    #[error("target not found")]
    TargetNotFound,
    #[error("script evaluation failed")]
    Evaluation,
    #[error("internal error")]
    Internal,
}

/// Error surfaced by the adapter, with an optional human hint and the raw
/// protocol payload when there is one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {hint}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub(crate) fn io(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(hint)
    }

    pub(crate) fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }

    pub(crate) fn disconnected(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Disconnected).with_hint(hint)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_disconnected(&self) -> bool {
        self.kind == AdapterErrorKind::Disconnected
    }
}
