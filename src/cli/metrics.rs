use std::path::Path;

use anyhow::{Context, Result};
use cdp_adapter::metrics;
use serde::Serialize;
use tracing::info;

use super::context::CliContext;

/// CDP traffic of one invocation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpUsage {
    pub commands: u64,
    pub failures: u64,
    pub events: u64,
    pub mean_latency_ms: f64,
}

pub fn cdp_usage() -> CdpUsage {
    let traffic = metrics::traffic();
    CdpUsage {
        commands: traffic.commands,
        failures: traffic.failed,
        events: traffic.events,
        mean_latency_ms: traffic.mean_latency().as_secs_f64() * 1000.0,
    }
}

/// Dump the Prometheus exposition when `--metrics-file` was given.
pub async fn write_metrics(ctx: &CliContext, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    tokio::fs::write(path, metrics::render(ctx.registry()))
        .await
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!("Wrote CDP metrics to {}", path.display());
    Ok(())
}

pub fn print_usage(usage: &CdpUsage) {
    println!(
        "CDP: {} commands, {} failed, {} events, mean latency {:.1} ms",
        usage.commands, usage.failures, usage.events, usage.mean_latency_ms
    );
}
