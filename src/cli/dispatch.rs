use anyhow::Result;

use super::commands::Commands;
use super::connection::{cmd_models, cmd_test_connection};
use super::context::CliContext;
use super::env::CliArgs;
use super::inspect::cmd_inspect;
use super::process::{cmd_batch, cmd_process};
use super::settings::cmd_settings;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let metrics_file = cli.metrics_file.as_deref();
    match cli.command.clone() {
        Commands::Process(args) => cmd_process(args, ctx, metrics_file).await,
        Commands::Batch(args) => cmd_batch(args, ctx, metrics_file).await,
        Commands::Inspect(args) => cmd_inspect(args, ctx).await,
        Commands::Settings(args) => cmd_settings(args, ctx).await,
        Commands::TestConnection(args) => cmd_test_connection(args, ctx).await,
        Commands::Models(args) => cmd_models(args, ctx).await,
    }
}
