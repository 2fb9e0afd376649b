use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{BatchDriver, BatchSummary, ItemDriver, ItemOutcome, RunSession, SettingsStore};
use anyhow::{bail, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::commands::AttachArgs;
use super::context::CliContext;
use super::metrics::{cdp_usage, print_usage, write_metrics, CdpUsage};
use super::output::emit;

/// Ctrl-C is the stop button.
fn stop_on_ctrl_c(session: Arc<RunSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested");
            session.request_stop();
        }
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemReport {
    outcome: ItemOutcome,
    cdp: CdpUsage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchReport {
    #[serde(flatten)]
    summary: BatchSummary,
    cdp: CdpUsage,
}

pub async fn cmd_process(args: AttachArgs, ctx: &CliContext, metrics_file: Option<&Path>) -> Result<()> {
    let adapter = ctx.attach(&args).await?;
    let driver = ItemDriver::new(ctx.flow_deps(adapter.clone())?);
    ctx.settings().consume_trial().await?;

    let session = Arc::new(RunSession::new());
    let stopper = stop_on_ctrl_c(session.clone());
    let result = driver.run_single(&session).await;
    stopper.abort();
    adapter.shutdown().await;
    write_metrics(ctx, metrics_file).await?;

    let report = ItemReport {
        outcome: result?,
        cdp: cdp_usage(),
    };
    emit(ctx.output(), &report, |report| {
        match &report.outcome {
            ItemOutcome::Done {
                image_id,
                report: Some(applied),
                ..
            } => {
                let written: Vec<String> = applied.written.iter().map(ToString::to_string).collect();
                println!("Image {}: wrote {}", image_id, written.join(", "));
                if !applied.missing.is_empty() {
                    let missing: Vec<String> = applied.missing.iter().map(ToString::to_string).collect();
                    println!("  not found on page: {}", missing.join(", "));
                }
            }
            ItemOutcome::Done {
                image_id,
                timed_out: true,
                ..
            } => println!("Image {}: metadata application timed out; check the form", image_id),
            ItemOutcome::Done { image_id, .. } => {
                println!("Image {}: AI reply had nothing to write", image_id)
            }
            ItemOutcome::Stopped => println!("Stopped."),
            ItemOutcome::Busy => println!("Already processing."),
            other => println!("{:?}", other),
        }
        print_usage(&report.cdp);
    })
}

pub async fn cmd_batch(args: AttachArgs, ctx: &CliContext, metrics_file: Option<&Path>) -> Result<()> {
    let settings = ctx.settings().load().await?;
    if settings.trials_left() == 0 {
        bail!("Trial expired. Please upgrade.");
    }

    let adapter = ctx.attach(&args).await?;
    let driver = BatchDriver::new(ctx.flow_deps(adapter.clone())?);
    ctx.settings().consume_trial().await?;

    let session = Arc::new(RunSession::new());
    let stopper = stop_on_ctrl_c(session.clone());
    info!(run = %session.run_id(), "Batch processing started");
    let result = driver.run(&session).await;
    stopper.abort();
    adapter.shutdown().await;
    write_metrics(ctx, metrics_file).await?;

    let report = BatchReport {
        summary: result?,
        cdp: cdp_usage(),
    };
    emit(ctx.output(), &report, |report| {
        let s = &report.summary;
        let elapsed = humantime::format_duration(Duration::from_secs(s.elapsed_ms / 1000));
        let verdict = if s.stopped { "Batch stopped" } else { "Batch complete" };
        println!(
            "{}: {}/{} processed, {} failed, {} skipped, {} stuck in {}",
            verdict, s.processed, s.total, s.failed, s.skipped, s.stuck, elapsed
        );
        print_usage(&report.cdp);
    })
}
