use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::warn;

use crate::errors::{AiError, AiResult};

/// Message of an `error` object in a reply body, if any.
pub(crate) fn provider_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(
        error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

/// Send and decode a JSON reply. An `error` object in the body wins over the
/// HTTP status since providers put their explanation there.
pub(crate) async fn send_json(provider: &'static str, request: RequestBuilder) -> AiResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<response unavailable>".to_string());

    let body = serde_json::from_str::<Value>(&text);
    if let Ok(body) = &body {
        if let Some(message) = provider_error(body) {
            warn!(target: "ai", provider, status = status.as_u16(), message = %message, "provider returned an error");
            return Err(AiError::Provider(message));
        }
    }
    if !status.is_success() {
        return Err(AiError::Status {
            provider,
            status: status.as_u16(),
            body: text,
        });
    }
    body.map_err(|err| AiError::decode(provider, err.to_string()))
}
