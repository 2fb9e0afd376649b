//! Anthropic messages API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AiError, AiResult};
use crate::http::send_json;
use crate::image::InlineImage;
use crate::provider::GenerateRequest;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const USER_TEXT: &str = "Analyze this image.";

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(default)]
    text: Option<String>,
}

pub(crate) fn messages_body(request: &GenerateRequest, image: &InlineImage) -> MessagesRequest {
    MessagesRequest {
        model: request.model().to_string(),
        max_tokens: MAX_TOKENS,
        system: request.system_prompt.clone(),
        messages: vec![Message {
            role: "user",
            content: vec![
                Block::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    },
                },
                Block::Text {
                    text: USER_TEXT.to_string(),
                },
            ],
        }],
    }
}

pub(crate) fn reply_text(body: Value) -> AiResult<String> {
    let response: MessagesResponse =
        serde_json::from_value(body).map_err(|err| AiError::decode(PROVIDER, err.to_string()))?;
    response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| AiError::decode(PROVIDER, "missing content"))
}

pub(crate) async fn complete(
    client: &Client,
    endpoint: &str,
    request: &GenerateRequest,
    image: &InlineImage,
) -> AiResult<String> {
    let body = send_json(
        PROVIDER,
        client
            .post(endpoint)
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&messages_body(request, image)),
    )
    .await?;
    reply_text(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use serde_json::json;

    #[test]
    fn body_puts_prompt_in_system_and_image_first() {
        let request = GenerateRequest {
            provider: ProviderKind::Anthropic,
            api_key: "sk-ant".into(),
            system_prompt: "Describe".into(),
            image_url: String::new(),
            model: None,
        };
        let image = InlineImage {
            mime_type: "image/jpeg".into(),
            data: "CCCC".into(),
        };
        let body = serde_json::to_value(messages_body(&request, &image)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1024,
                "system": "Describe",
                "messages": [{"role": "user", "content": [
                    {"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": "CCCC"}},
                    {"type": "text", "text": "Analyze this image."}
                ]}]
            })
        );
    }

    #[test]
    fn reply_text_skips_non_text_blocks() {
        let body = json!({"content": [{"type": "tool_use"}, {"type": "text", "text": "OK"}]});
        assert_eq!(reply_text(body).unwrap(), "OK");
    }
}
