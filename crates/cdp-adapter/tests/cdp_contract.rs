//! Contract tests against a real Chromium. Ignored by default because they
//! need a browser on the host.
//!
//! ```bash
//! export STOCKMETA_CDP_CONTRACT=1
//! export STOCKMETA_CHROME=/usr/bin/google-chrome  # optional
//! cargo test -p cdp-adapter --test cdp_contract -- --ignored --nocapture
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::config::CdpConfig;
use cdp_adapter::{metrics, AdapterErrorKind, CdpAdapter};
use serde_json::json;
use tempfile::TempDir;
use tokio::time::sleep;

fn contract_enabled() -> bool {
    env::var("STOCKMETA_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn contract_config(start_url: &str) -> (CdpConfig, TempDir) {
    let profile = tempfile::tempdir().expect("create temporary chrome profile");
    let cfg = CdpConfig {
        headless: true,
        user_data_dir: profile.path().into(),
        start_url: Some(start_url.to_string()),
        ..CdpConfig::default()
    };
    (cfg, profile)
}

async fn started(cfg: CdpConfig) -> Arc<CdpAdapter> {
    let adapter = Arc::new(CdpAdapter::new(cfg));
    Arc::clone(&adapter).start().await.expect("adapter start");
    adapter
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set STOCKMETA_CDP_CONTRACT=1"]
async fn contract_attach_and_evaluate() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (STOCKMETA_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = contract_config("https://example.com/");
    let adapter = started(cfg).await;
    let page = adapter.attach("example.com").await.expect("attach to tab");
    assert!(page.url.contains("example.com"));

    sleep(Duration::from_secs(2)).await;
    let title = adapter.evaluate("document.title").await.expect("evaluate");
    assert!(title.as_str().is_some_and(|t| !t.is_empty()));

    let sum = adapter
        .evaluate("new Promise(r => setTimeout(() => r(20 + 22), 50))")
        .await
        .expect("awaited promise");
    assert_eq!(sum, json!(42));

    assert!(metrics::traffic().commands >= 3);
    adapter.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set STOCKMETA_CDP_CONTRACT=1"]
async fn contract_script_errors_surface_as_evaluation() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (STOCKMETA_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = contract_config("about:blank");
    let adapter = started(cfg).await;
    adapter.attach("").await.expect("attach to any tab");

    let err = adapter
        .evaluate("(() => { throw new Error('boom'); })()")
        .await
        .unwrap_err();
    assert_eq!(err.kind, AdapterErrorKind::Evaluation);
    assert!(err.hint.unwrap_or_default().contains("boom"));
    adapter.shutdown().await;
}
