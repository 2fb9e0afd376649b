use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AiError, AiResult};
use crate::types::MetadataResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
    Anthropic,
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::DeepSeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4-turbo",
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
            ProviderKind::DeepSeek => "deepseek-chat",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            other => Err(AiError::UnknownProvider(other.to_string())),
        }
    }
}

/// One metadata request: which provider, with which credentials, for which
/// image.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub provider: ProviderKind,
    pub api_key: String,
    pub system_prompt: String,
    /// `http(s)` URL of the image, or an inline `data:` URL
    pub image_url: String,
    /// Overrides the provider's default model.
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// The AI collaborator: image plus prompt in, structured fields or raw text
/// out.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> AiResult<MetadataResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip_through_settings_strings() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.name().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!(matches!(
            "mistral".parse::<ProviderKind>(),
            Err(AiError::UnknownProvider(name)) if name == "mistral"
        ));
    }

    #[test]
    fn blank_model_falls_back_to_provider_default() {
        let mut request = GenerateRequest {
            provider: ProviderKind::Gemini,
            api_key: "k".into(),
            system_prompt: String::new(),
            image_url: String::new(),
            model: Some(" ".into()),
        };
        assert_eq!(request.model(), "gemini-2.5-flash");
        request.model = Some("gemini-1.5-pro".into());
        assert_eq!(request.model(), "gemini-1.5-pro");
    }
}
