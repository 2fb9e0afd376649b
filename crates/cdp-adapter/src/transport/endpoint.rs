//! Locating the browser-level DevTools websocket: an explicit url, the
//! `/json/version` of a running browser, or the banner a freshly launched
//! Chromium prints on stderr.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::CdpConfig;
use crate::error::AdapterError;

const LAUNCH_WAIT: Duration = Duration::from_secs(20);

const LAUNCH_FLAGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-popup-blocking",
    "--no-first-run",
    "--no-default-browser-check",
    "--remote-allow-origins=*",
];

pub(super) struct Endpoint {
    pub ws_url: String,
    /// Set when we launched the browser ourselves.
    pub browser: Option<Child>,
}

pub(super) async fn resolve(cfg: &CdpConfig) -> Result<Endpoint, AdapterError> {
    if let Some(url) = cfg.websocket_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(Endpoint {
            ws_url: url.to_string(),
            browser: None,
        });
    }
    if let Some(addr) = cfg.remote_debugging_addr.as_deref() {
        let ws_url = discover(addr, cfg.deadline()).await?;
        return Ok(Endpoint {
            ws_url,
            browser: None,
        });
    }
    launch(cfg).await
}

#[derive(Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: String,
}

fn version_endpoint(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        format!("{addr}/json/version")
    } else {
        format!("http://{addr}/json/version")
    }
}

async fn discover(addr: &str, deadline: Duration) -> Result<String, AdapterError> {
    let endpoint = version_endpoint(addr);
    let unreachable = |err: reqwest::Error| {
        AdapterError::io(format!("{endpoint}: {err}")).with_data(json!({
            "addr": addr,
            "hint": "Start Chrome with --remote-debugging-port and keep it open.",
        }))
    };
    let client = reqwest::Client::builder()
        .timeout(deadline)
        .build()
        .map_err(|err| AdapterError::internal(format!("http client: {err}")))?;
    let info: VersionInfo = client
        .get(&endpoint)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(unreachable)?
        .json()
        .await
        .map_err(unreachable)?;
    Ok(info.ws_url)
}

fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    let dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| AdapterError::internal(format!("current dir: {err}")))?
            .join(&cfg.user_data_dir)
    };
    std::fs::create_dir_all(&dir)
        .map_err(|err| AdapterError::internal(format!("profile dir {}: {err}", dir.display())))?;
    Ok(dir)
}

fn sandbox_disabled() -> bool {
    std::env::var("STOCKMETA_DISABLE_SANDBOX")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let has_executable = !cfg.executable.as_os_str().is_empty();
    if has_executable && !cfg.executable.exists() {
        return Err(AdapterError::io(format!(
            "chrome executable not found at {}",
            cfg.executable.display()
        ))
        .with_data(json!({ "hint": "Set STOCKMETA_CHROME to the full path of chrome/chromium." })));
    }

    let mut args = LAUNCH_FLAGS.to_vec();
    let mut builder = BrowserConfig::builder()
        .request_timeout(cfg.deadline())
        .launch_timeout(LAUNCH_WAIT)
        .user_data_dir(profile_dir(cfg)?);
    if cfg.headless {
        args.extend(["--headless=new", "--mute-audio"]);
    } else {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    if has_executable {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder
        .args(args)
        .build()
        .map_err(|err| AdapterError::internal(format!("browser config: {err}")))
}

async fn launch(cfg: &CdpConfig) -> Result<Endpoint, AdapterError> {
    let mut child = browser_config(cfg)?
        .launch()
        .map_err(|err| AdapterError::internal(format!("failed to launch chromium: {err}")))?;
    let ws_url = read_banner(&mut child).await?;
    info!(target: "cdp-transport", %ws_url, "launched chromium");
    Ok(Endpoint {
        ws_url,
        browser: Some(child),
    })
}

/// Wait for `DevTools listening on ws://...` on the child's stderr.
async fn read_banner(child: &mut Child) -> Result<String, AdapterError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AdapterError::internal("chromium stderr is not piped"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut seen = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| AdapterError::io(format!("chromium stderr: {err}")))?;
            if let Some(url) = banner_url(&line) {
                return Ok(url);
            }
            if seen.len() < 8 {
                seen.push(line);
            }
        }
        Err(AdapterError::io(format!(
            "chromium exited without a devtools url; stderr: {}",
            seen.join(" | ")
        )))
    };

    tokio::time::timeout(LAUNCH_WAIT, scan)
        .await
        .map_err(|_| AdapterError::io("timed out waiting for the chromium devtools url"))?
}

fn banner_url(line: &str) -> Option<String> {
    let (_, url) = line.rsplit_once("listening on ")?;
    let url = url.trim();
    (url.starts_with("ws") && url.contains("devtools/browser")).then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_line_yields_browser_socket() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123";
        assert_eq!(
            banner_url(line).as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123")
        );
        assert!(banner_url("[1234:ERROR] gpu process crashed").is_none());
    }

    #[test]
    fn version_endpoint_accepts_bare_and_http_addresses() {
        assert_eq!(version_endpoint("127.0.0.1:9222"), "http://127.0.0.1:9222/json/version");
        assert_eq!(
            version_endpoint("http://localhost:9222/"),
            "http://localhost:9222/json/version"
        );
    }

    #[tokio::test]
    async fn explicit_websocket_wins() {
        let cfg = CdpConfig {
            websocket_url: Some(" ws://127.0.0.1:9222/devtools/browser/x ".into()),
            remote_debugging_addr: Some("127.0.0.1:1".into()),
            ..CdpConfig::default()
        };
        let endpoint = resolve(&cfg).await.unwrap();
        assert_eq!(endpoint.ws_url, "ws://127.0.0.1:9222/devtools/browser/x");
        assert!(endpoint.browser.is_none());
    }

    #[test]
    fn missing_executable_is_reported() {
        let cfg = CdpConfig {
            executable: PathBuf::from("/nonexistent/chrome-for-tests"),
            ..CdpConfig::default()
        };
        let err = browser_config(&cfg).unwrap_err();
        assert!(err.hint.unwrap_or_default().contains("not found"));
    }
}
