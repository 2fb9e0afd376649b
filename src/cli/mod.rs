//! Command-line surface: argument parsing, dispatch and the subcommands.

pub mod app;
pub mod commands;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod inspect;
pub mod metrics;
pub mod output;
pub mod process;
pub mod runtime;
pub mod settings;

pub use app::run;
pub use commands::{AttachArgs, Commands};
pub use output::OutputFormat;
