use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;
use crate::config::load_config;
use crate::settings_store::JsonFileSettings;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();
    let _log_guard = init_logging(&cli.log_level, cli.debug, cli.log_format, cli.log_file.as_deref())?;

    debug!("Starting stockmeta v{}", env!("CARGO_PKG_VERSION"));

    let loaded = load_config(cli.config.as_deref())?;
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(JsonFileSettings::default_path);
    let ctx = CliContext::new(loaded.config, loaded.path, settings_path, cli.output);
    if let Some(path) = ctx.config_path() {
        debug!(config = %path.display(), "configuration in effect");
    }

    match dispatch(&cli, &ctx).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
