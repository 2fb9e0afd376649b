//! CDP traffic accounting.
//!
//! Each command and event is counted twice: into Prometheus collectors (for
//! `--metrics-file`) and into plain atomics the CLI summarises after a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use tracing::error;

const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0];

struct Collectors {
    commands: IntCounterVec,
    latency: HistogramVec,
    events: IntCounterVec,
}

impl Collectors {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            commands: IntCounterVec::new(
                opts!("stockmeta_cdp_commands_total", "CDP commands by method and outcome"),
                &["method", "outcome"],
            )?,
            latency: HistogramVec::new(
                histogram_opts!(
                    "stockmeta_cdp_command_duration_seconds",
                    "CDP command round trip",
                    LATENCY_BUCKETS.to_vec()
                ),
                &["method"],
            )?,
            events: IntCounterVec::new(
                opts!("stockmeta_cdp_events_total", "CDP events by method"),
                &["method"],
            )?,
        })
    }
}

lazy_static! {
    static ref COLLECTORS: Collectors =
        Collectors::new().expect("cdp metric definitions are valid");
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);
static LATENCY_US: AtomicU64 = AtomicU64::new(0);

/// Process-wide CDP totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traffic {
    pub commands: u64,
    pub failed: u64,
    pub events: u64,
    pub latency_total: Duration,
}

impl Traffic {
    pub fn mean_latency(&self) -> Duration {
        match self.commands {
            0 => Duration::ZERO,
            n => self.latency_total / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }
}

/// Add the CDP collectors to `registry`. Registering twice is harmless.
pub fn register_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
        Box::new(COLLECTORS.commands.clone()),
        Box::new(COLLECTORS.latency.clone()),
        Box::new(COLLECTORS.events.clone()),
    ];
    for collector in collectors {
        match registry.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(err) => error!(%err, "could not register cdp metric"),
        }
    }
}

/// Prometheus text exposition of `registry`.
pub fn render(registry: &Registry) -> String {
    let mut out = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&registry.gather(), &mut out) {
        error!(%err, "could not encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn observe_command(method: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "error" };
    COLLECTORS
        .commands
        .with_label_values(&[method, outcome])
        .inc();
    COLLECTORS
        .latency
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());

    COMMANDS.fetch_add(1, Ordering::Relaxed);
    if !ok {
        FAILED.fetch_add(1, Ordering::Relaxed);
    }
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    LATENCY_US.fetch_add(micros, Ordering::Relaxed);
}

pub fn observe_event(method: &str) {
    COLLECTORS.events.with_label_values(&[method]).inc();
    EVENTS.fetch_add(1, Ordering::Relaxed);
}

pub fn traffic() -> Traffic {
    Traffic {
        commands: COMMANDS.load(Ordering::Relaxed),
        failed: FAILED.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
        latency_total: Duration::from_micros(LATENCY_US.load(Ordering::Relaxed)),
    }
}
