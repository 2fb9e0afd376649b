//! Image metadata generation through multimodal AI providers.
//!
//! [`MetadataClient`] downloads the image, inlines it as base64, sends it
//! with the system prompt to the selected provider (retrying with
//! exponential backoff) and parses the reply into a [`MetadataResult`].

mod anthropic;
mod client;
pub mod errors;
mod gemini;
mod http;
pub mod image;
pub mod models;
mod openai;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod types;

pub use client::{AiConfig, MetadataClient, PIXEL_SHIM, TEST_PROMPT};
pub use errors::{AiError, AiResult};
pub use models::{catalog, ModelInfo};
pub use parse::{parse_reply, sanitize_keywords};
pub use prompt::{augment, effective_prompt, CATEGORIES, DEFAULT_SYSTEM_PROMPT};
pub use provider::{GenerateRequest, MetadataService, ProviderKind};
pub use retry::RetryPolicy;
pub use types::MetadataResult;
