use action_flow::SettingsStore;
use ai_metadata::{catalog, MetadataClient, ModelInfo, ProviderKind};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;

#[derive(Args, Clone)]
pub struct TestConnectionArgs {
    /// Provider to test; defaults to the stored one
    #[arg(long)]
    pub provider: Option<String>,

    /// Key to test; defaults to the stored one
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Args, Clone)]
pub struct ModelsArgs {
    /// Only this provider
    pub provider: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionReport {
    provider: String,
    model: String,
    ok: bool,
    reply: String,
}

pub async fn cmd_test_connection(args: TestConnectionArgs, ctx: &CliContext) -> Result<()> {
    let settings = ctx.settings().load().await?;
    let provider = match args.provider.as_deref() {
        Some(name) => name.parse::<ProviderKind>()?,
        None => settings.provider()?,
    };
    let api_key = args
        .api_key
        .or_else(|| settings.api_key().map(str::to_string))
        .context("No API key given or stored")?;
    let model = args.model.or_else(|| settings.model_for(provider));

    let client = MetadataClient::new(ctx.config().ai.clone())?;
    let report = match client.test_connection(provider, &api_key, model.clone()).await {
        Ok(reply) => ConnectionReport {
            provider: provider.to_string(),
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            ok: true,
            reply: reply
                .raw
                .clone()
                .or(reply.title.clone())
                .unwrap_or_else(|| "OK".to_string()),
        },
        Err(err) => ConnectionReport {
            provider: provider.to_string(),
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            ok: false,
            reply: err.to_string(),
        },
    };

    emit(ctx.output(), &report, |report| {
        if report.ok {
            println!(
                "Connection to {} ({}) OK: {}",
                report.provider,
                report.model,
                report.reply.trim()
            );
        } else {
            println!("Connection to {} failed: {}", report.provider, report.reply);
        }
    })?;
    if !report.ok {
        anyhow::bail!("connection test failed");
    }
    Ok(())
}

#[derive(Serialize)]
struct ProviderModels {
    provider: &'static str,
    default: &'static str,
    models: &'static [ModelInfo],
}

pub async fn cmd_models(args: ModelsArgs, ctx: &CliContext) -> Result<()> {
    let providers: Vec<ProviderKind> = match args.provider.as_deref() {
        Some(name) => vec![name.parse()?],
        None => ProviderKind::ALL.to_vec(),
    };
    let listing: Vec<ProviderModels> = providers
        .into_iter()
        .map(|provider| ProviderModels {
            provider: provider.name(),
            default: provider.default_model(),
            models: catalog(provider),
        })
        .collect();

    emit(ctx.output(), &listing, |listing| {
        for entry in listing {
            println!("{}:", entry.provider);
            for model in entry.models {
                let marker = if model.id == entry.default { " (default)" } else { "" };
                println!("  {:<32} {}{}", model.id, model.label, marker);
            }
        }
    })
}
