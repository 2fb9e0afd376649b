use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{AiError, AiResult};
use crate::image::{fetch_inline, InlineImage};
use crate::parse::parse_reply;
use crate::provider::{GenerateRequest, MetadataService, ProviderKind};
use crate::retry::RetryPolicy;
use crate::types::MetadataResult;
use crate::{anthropic, gemini, openai};

/// 1x1 JPEG sent by [`MetadataClient::test_connection`].
pub const PIXEL_SHIM: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQEASABIAAD/2wBDAP//////////////////////////////////////////////////////////////////////////////////////wgALCAABAAEBAREA/8QAFBABAAAAAAAAAAAAAAAAAAAAAP/aAAgBAQABPxA=";
pub const TEST_PROMPT: &str = "Reply with 'OK'";

/// Endpoints and transport settings; the `ai` section of the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub openai_url: String,
    pub deepseek_url: String,
    pub anthropic_url: String,
    /// Gemini API root; the model path is appended
    pub gemini_base: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_url: "https://api.openai.com/v1/chat/completions".to_string(),
            deepseek_url: "https://api.deepseek.com/chat/completions".to_string(),
            anthropic_url: "https://api.anthropic.com/v1/messages".to_string(),
            gemini_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct MetadataClient {
    http: Client,
    config: AiConfig,
}

impl MetadataClient {
    pub fn new(config: AiConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    async fn call_once(&self, request: &GenerateRequest, image: &InlineImage) -> AiResult<String> {
        match request.provider {
            ProviderKind::OpenAi => {
                openai::complete(&self.http, "openai", &self.config.openai_url, request, image).await
            }
            ProviderKind::DeepSeek => {
                openai::complete(&self.http, "deepseek", &self.config.deepseek_url, request, image)
                    .await
            }
            ProviderKind::Gemini => {
                gemini::complete(&self.http, &self.config.gemini_base, request, image).await
            }
            ProviderKind::Anthropic => {
                anthropic::complete(&self.http, &self.config.anthropic_url, request, image).await
            }
        }
    }

    /// Check credentials with a one-pixel image and a trivial prompt.
    pub async fn test_connection(
        &self,
        provider: ProviderKind,
        api_key: &str,
        model: Option<String>,
    ) -> AiResult<MetadataResult> {
        info!(target: "ai", %provider, "Testing connection");
        self.generate(&GenerateRequest {
            provider,
            api_key: api_key.to_string(),
            system_prompt: TEST_PROMPT.to_string(),
            image_url: PIXEL_SHIM.to_string(),
            model,
        })
        .await
    }
}

#[async_trait]
impl MetadataService for MetadataClient {
    async fn generate(&self, request: &GenerateRequest) -> AiResult<MetadataResult> {
        if request.api_key.trim().is_empty() {
            return Err(AiError::MissingKey);
        }
        info!(
            target: "ai",
            provider = %request.provider,
            model = request.model(),
            "Requesting metadata"
        );
        let image = &fetch_inline(&self.http, &request.image_url).await?;
        let text = self
            .config
            .retry
            .run(request.provider.name(), move || self.call_once(request, image))
            .await?;
        debug!(target: "ai", reply = %text, "AI reply");
        Ok(parse_reply(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_key_is_rejected_without_network() {
        let client = MetadataClient::new(AiConfig::default()).unwrap();
        let err = client
            .test_connection(ProviderKind::Gemini, "  ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MissingKey));
    }

    #[test]
    fn pixel_shim_is_a_jpeg_data_url() {
        let image = InlineImage::from_data_url(PIXEL_SHIM).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert!(image.data.starts_with("/9j/"));
    }

    #[test]
    fn config_section_fills_missing_fields() {
        let config: AiConfig = serde_json::from_str(r#"{"timeout_secs": 5, "retry": {"max_retries": 1}}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.openai_url, AiConfig::default().openai_url);
    }
}
