//! Command-line argument parsing for CSV Mirror
//!
//! This module defines the CLI structure using clap derive macros: one
//! command to run a freshness cycle, one to inspect the mirror and one to
//! manage the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CSV Mirror - Keep reference CSV datasets fresh
#[derive(Parser, Debug)]
#[command(
    name = "csv_mirror",
    version,
    about = "Mirror reference CSV datasets from a remote dataset host",
    long_about = "Keeps a small set of reference CSV files mirrored locally.
Remote checks are rate limited by a cooldown window, downloads are published atomically,
and corrupt or missing files are re-downloaded on the next run."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror root directory (overrides the configuration)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check for updates and download stale or missing files
    Sync(SyncArgs),

    /// Show the state of the mirror without touching the network
    Status(StatusArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the sync command
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Check the remote host even if the cooldown has not elapsed
    #[arg(short, long)]
    pub force: bool,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the status command
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level requested by the global flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}
