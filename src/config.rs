//! Layered runtime configuration.
//!
//! `config/stockmeta.yaml` (or `--config FILE`, or
//! `<config_dir>/stockmeta/config.yaml`) under `STOCKMETA__*` environment
//! variables, e.g. `STOCKMETA__TIMING__PANEL_LOAD_MS=4000`.

use std::path::{Path, PathBuf};

use action_flow::DEFAULT_STUCK_CAP;
use action_locator::SiteProfile;
use action_primitives::Timing;
use ai_metadata::AiConfig;
use anyhow::{Context, Result};
use cdp_adapter::config::CdpConfig;
use config::{Config as Layers, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ENV_PREFIX: &str = "STOCKMETA";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cdp: CdpConfig,
    pub site: SiteProfile,
    pub timing: Timing,
    pub ai: AiConfig,
    /// Recovery attempts on one stuck item before it is skipped
    pub stuck_cap: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp: CdpConfig::default(),
            site: SiteProfile::default(),
            timing: Timing::default(),
            ai: AiConfig::default(),
            stuck_cap: DEFAULT_STUCK_CAP,
        }
    }
}

pub struct LoadedConfig {
    pub config: Config,
    /// File the settings came from; `None` when only defaults and env applied
    pub path: Option<PathBuf>,
}

/// `./config/stockmeta.yaml`, else the per-user config file.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("config/stockmeta.yaml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("stockmeta").join("config.yaml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };
    let file = match candidate {
        Some(path) if path.exists() => Some(path),
        Some(path) if explicit.is_some() => {
            anyhow::bail!("config file not found: {}", path.display())
        }
        Some(path) => {
            warn!("Config file not found, using defaults: {}", path.display());
            None
        }
        None => None,
    };

    let mut layers = Layers::builder();
    if let Some(path) = &file {
        layers = layers.add_source(File::from(path.as_path()));
    }
    layers = layers.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config: Config = layers
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    if let Some(path) = &file {
        info!("Loaded configuration from: {}", path.display());
    }
    Ok(LoadedConfig { config, path: file })
}
