//! CSV Mirror CLI application
//!
//! Command-line interface for keeping reference CSV datasets mirrored from a
//! remote dataset host.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library (module is public but not re-exported)
use csv_mirror::cli::{handle_config, handle_status, handle_sync, Cli, Commands};
use csv_mirror::config::AppConfig;
use csv_mirror::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();
    let flag_level = cli.log_level();

    // `config init` must work even when the existing file is broken
    if let Commands::Config(args) = cli.command {
        init_logging(&cli.global, flag_level, None);
        return handle_config(&cli.global, args).await;
    }

    let config = AppConfig::load(cli.global.config.as_deref())
        .await?
        .with_root(cli.global.root.clone());

    // Initialize logging based on verbosity
    init_logging(&cli.global, flag_level, Some(&config.logging.level));

    info!("CSV Mirror v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Sync(args) => {
            info!("Executing sync command");
            handle_sync(&config, args, cli.global.quiet).await
        }
        Commands::Status(args) => {
            info!("Executing status command");
            handle_status(&config, args).await
        }
        Commands::Config(_) => Ok(()),
    }
}

/// Initialize logging from the CLI flags, falling back to the configured level
fn init_logging(
    global: &csv_mirror::cli::GlobalArgs,
    flag_level: Option<tracing::Level>,
    config_level: Option<&str>,
) {
    let level = match (flag_level, config_level) {
        (Some(level), _) => level.to_string().to_lowercase(),
        (None, Some(level)) => level.to_lowercase(),
        (None, None) => csv_mirror::constants::logging::DEFAULT_LOG_LEVEL.to_string(),
    };

    // Create environment filter
    let mut filter = EnvFilter::from_default_env();
    match format!("csv_mirror={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(global.very_verbose) // Show levels only in very verbose mode
        .init();

    if global.very_verbose {
        info!("Very verbose logging enabled");
    } else if global.verbose {
        info!("Verbose logging enabled");
    }
}
