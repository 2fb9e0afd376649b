//! Image download and base64 inlining. Every provider receives the image
//! inline; the page's CDN URLs are not reachable from the providers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::errors::{AiError, AiResult};

pub const DEFAULT_MIME: &str = "image/jpeg";

static DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(image/[\w.+-]+)?;base64,").expect("valid regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without the `data:` header
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(|m| m.split(';').next().unwrap_or(m).trim())
            .filter(|m| m.starts_with("image/"))
            .unwrap_or(DEFAULT_MIME);
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn from_data_url(url: &str) -> Option<Self> {
        let captures = DATA_URL.captures(url)?;
        let header = captures.get(0)?;
        Some(Self {
            mime_type: captures
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or(DEFAULT_MIME)
                .to_string(),
            data: url[header.end()..].to_string(),
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Inline `url`: `data:` URLs pass through, anything else is downloaded.
pub async fn fetch_inline(client: &Client, url: &str) -> AiResult<InlineImage> {
    if url.starts_with("data:") {
        return InlineImage::from_data_url(url)
            .ok_or_else(|| AiError::Image("unsupported data URL".to_string()));
    }
    let parsed = url::Url::parse(url).map_err(|err| AiError::Image(format!("{url}: {err}")))?;

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|err| AiError::Image(err.to_string()))?;
    if !response.status().is_success() {
        return Err(AiError::Image(format!("{} for {url}", response.status())));
    }
    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|err| AiError::Image(err.to_string()))?;
    debug!(url, size = bytes.len(), mime = ?mime, "downloaded image");
    Ok(InlineImage::from_bytes(&bytes, mime.as_deref()))
}
