//! User settings as the drivers see them.

use ai_metadata::{AiError, ProviderKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;

pub const DEFAULT_TRIAL_COUNT: u32 = 100;

/// Persisted settings. Key names match the settings file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_model: Option<String>,
    pub auto_ai_check: bool,
    pub auto_no_people: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_count: Option<u32>,
}

impl StoredSettings {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Configured provider, `openai` when unset.
    pub fn provider(&self) -> Result<ProviderKind, AiError> {
        match self.ai_provider.as_deref().map(str::trim) {
            None | Some("") => Ok(ProviderKind::default()),
            Some(name) => name.parse(),
        }
    }

    /// Model override for `provider`; only Gemini has a selectable model.
    pub fn model_for(&self, provider: ProviderKind) -> Option<String> {
        match provider {
            ProviderKind::Gemini => self.gemini_model.clone(),
            _ => None,
        }
    }

    pub fn trials_left(&self) -> u32 {
        self.trial_count.unwrap_or(DEFAULT_TRIAL_COUNT)
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<StoredSettings, FlowError>;

    async fn save(&self, settings: &StoredSettings) -> Result<(), FlowError>;
}

/// Settings held in memory.
#[derive(Default)]
pub struct MemorySettings {
    inner: Mutex<StoredSettings>,
}

impl MemorySettings {
    pub fn new(settings: StoredSettings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> Result<StoredSettings, FlowError> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), FlowError> {
        *self.inner.lock() = settings.clone();
        Ok(())
    }
}
