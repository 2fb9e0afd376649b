//! Where Chromium lives and how to reach it.
//!
//! Environment overrides: `STOCKMETA_CHROME` (executable),
//! `STOCKMETA_CHROME_PROFILE` (profile dir), `STOCKMETA_DEBUG_ADDR`
//! (debugging address of an already running browser).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use which::which;

#[cfg(target_os = "windows")]
const CHROME_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const CHROME_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Only used when the adapter launches its own browser.
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Per-command reply deadline.
    pub default_deadline_ms: u64,
    /// Browser-level websocket, e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`.
    pub websocket_url: Option<String>,
    /// `host:port` of a Chromium started with `--remote-debugging-port`.
    pub remote_debugging_addr: Option<String>,
    /// Keepalive ping period; 0 disables the ping.
    pub heartbeat_interval_ms: u64,
    /// Opened in a new tab when no tab matches the configured host.
    pub start_url: Option<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: env_value("STOCKMETA_CHROME_PROFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.stockmeta-profile")),
            headless: false,
            default_deadline_ms: 30_000,
            websocket_url: None,
            remote_debugging_addr: env_value("STOCKMETA_DEBUG_ADDR"),
            heartbeat_interval_ms: 15_000,
            start_url: None,
        }
    }
}

impl CdpConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }

    pub fn heartbeat(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

fn env_value(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `STOCKMETA_CHROME`, then `PATH`, then the usual install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Some(path) = env_value("STOCKMETA_CHROME").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }
    CHROME_NAMES
        .iter()
        .find_map(|name| which(name).ok())
        .or_else(|| install_locations().into_iter().find(|p| p.exists()))
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|key| env_value(key))
        .flat_map(|root| {
            let root = PathBuf::from(root);
            [
                root.join("Google/Chrome/Application/chrome.exe"),
                root.join("Microsoft/Edge/Application/msedge.exe"),
            ]
        })
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn install_locations() -> Vec<PathBuf> {
    ["google-chrome-stable", "google-chrome", "chromium-browser", "chromium"]
        .iter()
        .map(|name| PathBuf::from("/usr/bin").join(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_disables_heartbeat() {
        let cfg = CdpConfig {
            heartbeat_interval_ms: 0,
            ..CdpConfig::default()
        };
        assert!(cfg.heartbeat().is_none());
        assert_eq!(CdpConfig::default().heartbeat(), Some(Duration::from_secs(15)));
        assert_eq!(cfg.deadline(), Duration::from_secs(30));
    }

    #[test]
    fn every_platform_has_candidates() {
        assert!(!CHROME_NAMES.is_empty());
        assert!(!install_locations().is_empty());
    }
}
