//! Selectable models per provider.

use serde::Serialize;

use crate::provider::ProviderKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
}

const fn model(id: &'static str, label: &'static str) -> ModelInfo {
    ModelInfo { id, label }
}

const OPENAI: &[ModelInfo] = &[
    model("gpt-4-turbo", "GPT-4 Turbo"),
    model("gpt-4o", "GPT-4o"),
    model("gpt-4-vision-preview", "GPT-4 Vision"),
];

const ANTHROPIC: &[ModelInfo] = &[
    model("claude-3-haiku-20240307", "Claude 3 Haiku"),
    model("claude-3-sonnet-20240229", "Claude 3 Sonnet"),
    model("claude-3-opus-20240229", "Claude 3 Opus"),
];

const GEMINI: &[ModelInfo] = &[
    model("gemini-2.5-flash", "Gemini 2.5 Flash"),
    model("gemini-2.0-flash-exp", "Gemini 2.0 Flash Exp"),
    model("gemini-1.5-pro", "Gemini 1.5 Pro"),
    model("gemini-1.5-flash", "Gemini 1.5 Flash"),
    model("gemini-1.5-flash-8b", "Gemini 1.5 Flash-8b"),
];

const DEEPSEEK: &[ModelInfo] = &[model("deepseek-chat", "DeepSeek Chat")];

pub fn catalog(provider: ProviderKind) -> &'static [ModelInfo] {
    match provider {
        ProviderKind::OpenAi => OPENAI,
        ProviderKind::Anthropic => ANTHROPIC,
        ProviderKind::Gemini => GEMINI,
        ProviderKind::DeepSeek => DEEPSEEK,
    }
}
