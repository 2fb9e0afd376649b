use action_flow::{SettingsStore, StoredSettings};
use ai_metadata::{effective_prompt, ProviderKind, DEFAULT_SYSTEM_PROMPT};
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;

#[derive(Args, Clone)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Clone)]
pub enum SettingsAction {
    /// Print the stored settings (API key masked)
    Show {
        /// Also print the prompt actually sent to the AI
        #[arg(long)]
        prompt: bool,
    },
    /// Change one setting; an empty value clears optional ones
    Set { key: SettingKey, value: String },
    /// Print the settings file location
    Path,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SettingKey {
    ApiKey,
    Provider,
    Prompt,
    GeminiModel,
    AutoAiCheck,
    AutoNoPeople,
    TrialCount,
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => anyhow::bail!("expected true or false, got {other:?}"),
    }
}

pub fn apply_setting(settings: &mut StoredSettings, key: SettingKey, value: &str) -> Result<()> {
    match key {
        SettingKey::ApiKey => settings.api_key = optional(value),
        SettingKey::Provider => {
            settings.ai_provider = match optional(value) {
                Some(name) => Some(name.parse::<ProviderKind>()?.name().to_string()),
                None => None,
            }
        }
        SettingKey::Prompt => settings.system_prompt = optional(value),
        SettingKey::GeminiModel => settings.gemini_model = optional(value),
        SettingKey::AutoAiCheck => settings.auto_ai_check = flag(value)?,
        SettingKey::AutoNoPeople => settings.auto_no_people = flag(value)?,
        SettingKey::TrialCount => {
            settings.trial_count = Some(value.trim().parse().context("trial-count must be a number")?)
        }
    }
    Ok(())
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}{}", "*".repeat(key.chars().count().saturating_sub(4).min(12)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    path: String,
    api_key: Option<String>,
    provider: String,
    model: String,
    custom_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_prompt: Option<String>,
    auto_ai_check: bool,
    auto_no_people: bool,
    trials_left: u32,
}

pub async fn cmd_settings(args: SettingsArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.settings();
    match args.action {
        SettingsAction::Path => {
            println!("{}", store.path().display());
            Ok(())
        }
        SettingsAction::Set { key, value } => {
            let mut settings = store.load().await?;
            apply_setting(&mut settings, key, &value)?;
            store.save(&settings).await?;
            println!("Settings saved to {}", store.path().display());
            Ok(())
        }
        SettingsAction::Show { prompt } => {
            let settings = store.load().await?;
            let provider = settings.provider()?;
            let view = SettingsView {
                path: store.path().display().to_string(),
                api_key: settings.api_key().map(mask),
                provider: provider.to_string(),
                model: settings
                    .model_for(provider)
                    .unwrap_or_else(|| provider.default_model().to_string()),
                custom_prompt: settings
                    .system_prompt
                    .as_deref()
                    .is_some_and(|p| !p.trim().is_empty() && p != DEFAULT_SYSTEM_PROMPT),
                effective_prompt: prompt.then(|| effective_prompt(settings.system_prompt.as_deref())),
                auto_ai_check: settings.auto_ai_check,
                auto_no_people: settings.auto_no_people,
                trials_left: settings.trials_left(),
            };
            emit(ctx.output(), &view, |view| {
                println!("Settings file:  {}", view.path);
                println!(
                    "API key:        {}",
                    view.api_key.as_deref().unwrap_or("(not set)")
                );
                println!("Provider:       {} ({})", view.provider, view.model);
                println!(
                    "Prompt:         {}",
                    if view.custom_prompt { "custom" } else { "default" }
                );
                println!("Auto AI check:  {}", view.auto_ai_check);
                println!("Auto no people: {}", view.auto_no_people);
                println!("Trials left:    {}", view.trials_left);
                if let Some(prompt) = &view.effective_prompt {
                    println!("\n{prompt}");
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_aliases_are_normalised() {
        let mut settings = StoredSettings::default();
        apply_setting(&mut settings, SettingKey::Provider, "Claude").unwrap();
        assert_eq!(settings.ai_provider.as_deref(), Some("anthropic"));
        assert!(apply_setting(&mut settings, SettingKey::Provider, "bard").is_err());
        apply_setting(&mut settings, SettingKey::Provider, "").unwrap();
        assert_eq!(settings.ai_provider, None);
    }

    #[test]
    fn flags_and_counts_are_parsed() {
        let mut settings = StoredSettings::default();
        apply_setting(&mut settings, SettingKey::AutoNoPeople, "yes").unwrap();
        apply_setting(&mut settings, SettingKey::TrialCount, " 7 ").unwrap();
        assert!(settings.auto_no_people);
        assert_eq!(settings.trials_left(), 7);
        assert!(apply_setting(&mut settings, SettingKey::AutoAiCheck, "maybe").is_err());
    }

    #[test]
    fn blank_key_clears_it() {
        let mut settings = StoredSettings::default();
        apply_setting(&mut settings, SettingKey::ApiKey, "sk-abc").unwrap();
        assert_eq!(settings.api_key(), Some("sk-abc"));
        apply_setting(&mut settings, SettingKey::ApiKey, "  ").unwrap();
        assert_eq!(settings.api_key(), None);
    }

    #[test]
    fn masking_keeps_a_short_prefix() {
        assert_eq!(mask("sk-abcdef"), "sk-a*****");
        assert_eq!(mask("abc"), "abc");
    }
}
