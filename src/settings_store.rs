//! Settings file at `<config_dir>/stockmeta/settings.json`.

use std::path::{Path, PathBuf};

use action_flow::{FlowError, SettingsStore, StoredSettings};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

pub const SETTINGS_FILE: &str = "settings.json";

pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-user location, `./.stockmeta/settings.json` when no config dir exists.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("stockmeta"))
            .unwrap_or_else(|| PathBuf::from(".stockmeta"))
            .join(SETTINGS_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take one trial use. Returns the count left before the decrement.
    pub async fn consume_trial(&self) -> Result<u32, FlowError> {
        let mut settings = self.load().await?;
        let left = settings.trials_left();
        if left > 0 {
            settings.trial_count = Some(left - 1);
            self.save(&settings).await?;
        }
        Ok(left)
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> FlowError {
    FlowError::Settings(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn load(&self) -> Result<StoredSettings, FlowError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file yet");
                return Ok(StoredSettings::default());
            }
            Err(err) => return Err(io_error(&self.path, err)),
        };
        serde_json::from_str(&raw).map_err(|err| io_error(&self.path, err))
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), FlowError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(parent, err))?;
        }
        let body = serde_json::to_string_pretty(settings).map_err(|err| io_error(&self.path, err))?;
        fs::write(&self.path, body)
            .await
            .map_err(|err| io_error(&self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::DEFAULT_TRIAL_COUNT;

    #[tokio::test]
    async fn missing_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("settings.json"));
        let settings = store.load().await.unwrap();
        assert_eq!(settings, StoredSettings::default());
        assert_eq!(settings.trials_left(), DEFAULT_TRIAL_COUNT);
    }

    #[tokio::test]
    async fn saved_settings_use_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("nested").join("settings.json"));
        let settings = StoredSettings {
            api_key: Some("sk-1".into()),
            ai_provider: Some("anthropic".into()),
            auto_no_people: true,
            ..StoredSettings::default()
        };
        store.save(&settings).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"apiKey\""));
        assert!(raw.contains("\"autoNoPeople\": true"));
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn trials_count_down_and_stop_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("settings.json"));
        store
            .save(&StoredSettings {
                trial_count: Some(1),
                ..StoredSettings::default()
            })
            .await
            .unwrap();

        assert_eq!(store.consume_trial().await.unwrap(), 1);
        assert_eq!(store.consume_trial().await.unwrap(), 0);
        assert_eq!(store.load().await.unwrap().trial_count, Some(0));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileSettings::new(path).load().await.unwrap_err();
        assert!(matches!(err, FlowError::Settings(_)));
    }
}
