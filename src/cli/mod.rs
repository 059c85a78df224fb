//! Command-line interface components
//!
//! This module contains CLI-specific code for the CSV Mirror application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, StatusArgs, SyncArgs,
};
pub use commands::{handle_config, handle_status, handle_sync};
pub use progress::{ProgressBarObserver, ProgressConfig};
