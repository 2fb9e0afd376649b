use clap::{Args, Subcommand};

use super::connection::{ModelsArgs, TestConnectionArgs};
use super::settings::SettingsArgs;

/// Where to find the browser and the submission tab.
#[derive(Args, Clone, Debug, Default)]
pub struct AttachArgs {
    /// Browser websocket (`ws://127.0.0.1:9222/devtools/browser/<id>`)
    #[arg(long, value_name = "URL")]
    pub ws_url: Option<String>,

    /// `host:port` of a Chromium started with --remote-debugging-port
    #[arg(long, value_name = "ADDR")]
    pub debug_addr: Option<String>,

    /// Attach to the first tab on this host instead of the configured one
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Generate and fill metadata for the image currently open in the editor
    Process(AttachArgs),

    /// Walk every card in the portfolio grid and fill its metadata
    Batch(AttachArgs),

    /// Show which element each locator role resolves to on the attached page
    Inspect(AttachArgs),

    /// Show or change stored settings
    Settings(SettingsArgs),

    /// Check the AI provider credentials with a one-pixel image
    TestConnection(TestConnectionArgs),

    /// List the models known for each provider
    Models(ModelsArgs),
}
