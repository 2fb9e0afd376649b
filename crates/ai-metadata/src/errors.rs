use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("API key is not configured")]
    MissingKey,

    #[error("unknown AI provider '{0}'")]
    UnknownProvider(String),

    #[error("failed to download image from URL: {0}")]
    Image(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error object returned in the provider's reply body.
    #[error("{0}")]
    Provider(String),

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} response invalid: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },
}

impl AiError {
    pub fn decode(provider: &'static str, detail: impl Into<String>) -> Self {
        AiError::Decode {
            provider,
            detail: detail.into(),
        }
    }

    /// Failures another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AiError::MissingKey | AiError::UnknownProvider(_) | AiError::Image(_)
        )
    }
}

pub type AiResult<T> = Result<T, AiError>;
