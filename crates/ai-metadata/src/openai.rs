//! OpenAI-compatible chat completions (OpenAI and DeepSeek).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AiError, AiResult};
use crate::http::send_json;
use crate::image::InlineImage;
use crate::provider::GenerateRequest;

const MAX_TOKENS: u32 = 500;

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub(crate) fn chat_body(request: &GenerateRequest, image: &InlineImage) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model().to_string(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(request.system_prompt.clone()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                }]),
            },
        ],
        max_tokens: MAX_TOKENS,
    }
}

pub(crate) fn reply_text(provider: &'static str, body: Value) -> AiResult<String> {
    let response: ChatCompletionResponse =
        serde_json::from_value(body).map_err(|err| AiError::decode(provider, err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AiError::decode(provider, "missing content"))
}

pub(crate) async fn complete(
    client: &Client,
    provider: &'static str,
    endpoint: &str,
    request: &GenerateRequest,
    image: &InlineImage,
) -> AiResult<String> {
    let body = send_json(
        provider,
        client
            .post(endpoint)
            .bearer_auth(&request.api_key)
            .json(&chat_body(request, image)),
    )
    .await?;
    reply_text(provider, body)
}
