//! stockmeta library
//!
//! Exposes the CLI building blocks for integration testing

pub mod cli;
pub mod config;
pub mod settings_store;
pub mod status;

pub use config::{load_config, Config, LoadedConfig};
pub use settings_store::JsonFileSettings;
pub use status::ConsoleStatus;
