//! Gemini `generateContent`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::errors::{AiError, AiResult};
use crate::http::send_json;
use crate::image::InlineImage;
use crate::provider::GenerateRequest;

const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

pub(crate) fn content_body(request: &GenerateRequest, image: &InlineImage) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: request.system_prompt.clone(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
        },
    }
}

/// `{base}/models/{model}:generateContent?key=...`
pub(crate) fn endpoint(base: &str, model: &str, api_key: &str) -> AiResult<Url> {
    let raw = format!("{}/models/{model}:generateContent", base.trim_end_matches('/'));
    let mut url = Url::parse(&raw).map_err(|err| AiError::decode(PROVIDER, format!("bad endpoint {raw}: {err}")))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

pub(crate) fn reply_text(body: Value) -> AiResult<String> {
    let response: GenerateContentResponse =
        serde_json::from_value(body).map_err(|err| AiError::decode(PROVIDER, err.to_string()))?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| {
            candidate.content.parts.into_iter().find_map(|part| match part {
                Part::Text { text } => Some(text),
                Part::InlineData { .. } => None,
            })
        })
        .ok_or_else(|| AiError::decode(PROVIDER, "missing candidate text"))
}

pub(crate) async fn complete(
    client: &Client,
    base: &str,
    request: &GenerateRequest,
    image: &InlineImage,
) -> AiResult<String> {
    let url = endpoint(base, request.model(), &request.api_key)?;
    tracing::debug!(
        target: "ai",
        model = request.model(),
        mime = %image.mime_type,
        size = image.data.len(),
        "sending image to Gemini"
    );
    let body = send_json(PROVIDER, client.post(url).json(&content_body(request, image))).await?;
    reply_text(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use serde_json::json;

    fn request() -> GenerateRequest {
        GenerateRequest {
            provider: ProviderKind::Gemini,
            api_key: "AIza key".into(),
            system_prompt: "Describe".into(),
            image_url: String::new(),
            model: Some("gemini-1.5-flash".into()),
        }
    }

    #[test]
    fn body_inlines_image_and_requests_json() {
        let image = InlineImage {
            mime_type: "image/png".into(),
            data: "BBBB".into(),
        };
        let body = serde_json::to_value(content_body(&request(), &image)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [
                    {"text": "Describe"},
                    {"inline_data": {"mime_type": "image/png", "data": "BBBB"}}
                ]}],
                "generationConfig": {"response_mime_type": "application/json"}
            })
        );
    }

    #[test]
    fn key_travels_in_the_query() {
        let url = endpoint("https://generativelanguage.googleapis.com/v1beta/", "gemini-2.5-flash", "AIza key").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=AIza+key"
        );
    }

    #[test]
    fn reply_text_reads_first_text_part() {
        let body = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"title\":\"t\"}"}]}}]});
        assert_eq!(reply_text(body).unwrap(), "{\"title\":\"t\"}");
        assert!(reply_text(json!({"candidates": []})).is_err());
    }
}
