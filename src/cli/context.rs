use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_flow::FlowDeps;
use action_locator::Locator;
use action_primitives::{CdpPage, PageDriver};
use ai_metadata::MetadataClient;
use anyhow::{Context, Result};
use cdp_adapter::CdpAdapter;
use prometheus::Registry;
use tracing::info;

use super::commands::AttachArgs;
use super::output::OutputFormat;
use crate::config::Config;
use crate::settings_store::JsonFileSettings;
use crate::status::ConsoleStatus;

pub struct CliContext {
    config: Arc<Config>,
    config_path: Option<PathBuf>,
    settings: Arc<JsonFileSettings>,
    output: OutputFormat,
    registry: Registry,
}

impl CliContext {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        settings_path: PathBuf,
        output: OutputFormat,
    ) -> Self {
        let registry = Registry::new();
        cdp_adapter::metrics::register_metrics(&registry);
        Self {
            config: Arc::new(config),
            config_path,
            settings: Arc::new(JsonFileSettings::new(settings_path)),
            output,
            registry,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn settings(&self) -> &Arc<JsonFileSettings> {
        &self.settings
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Connect to Chromium and attach to the submission tab.
    pub async fn attach(&self, args: &AttachArgs) -> Result<Arc<CdpAdapter>> {
        let mut cdp = self.config.cdp.clone();
        if let Some(ws) = &args.ws_url {
            cdp.websocket_url = Some(ws.clone());
        }
        if let Some(addr) = &args.debug_addr {
            cdp.remote_debugging_addr = Some(addr.clone());
        }
        let host = args
            .host
            .clone()
            .unwrap_or_else(|| self.config.site.host.clone());

        let adapter = Arc::new(CdpAdapter::new(cdp));
        Arc::clone(&adapter)
            .start()
            .await
            .context("Failed to connect to Chromium")?;
        let page = adapter
            .attach(&host)
            .await
            .with_context(|| format!("No usable tab on {host}"))?;
        info!("Attached to {}", page.url);
        Ok(adapter)
    }

    pub fn locator(&self) -> Arc<Locator> {
        Arc::new(Locator::new(self.config.site.clone()))
    }

    /// Everything the drivers need, wired to the attached page.
    pub fn flow_deps(&self, adapter: Arc<CdpAdapter>) -> Result<FlowDeps> {
        let page: Arc<dyn PageDriver> = Arc::new(CdpPage::new(adapter));
        let ai = MetadataClient::new(self.config.ai.clone()).context("Failed to build HTTP client")?;
        Ok(FlowDeps::new(page, Arc::new(ai), self.settings.clone())
            .with_locator(self.locator())
            .with_timing(self.config.timing.clone())
            .with_status(Arc::new(ConsoleStatus::new(self.output.is_human())))
            .with_stuck_cap(self.config.stuck_cap))
    }
}
