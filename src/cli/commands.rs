//! Command handlers for the CLI interface
//!
//! Each handler wires the configuration into the library components and
//! prints a human summary. Recovered failures inside a run are part of its
//! report; a sync that did not fully succeed is turned into an error here so
//! the process exits non-zero.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::app::status::{self, StatusReport};
use crate::app::{
    DatasetClient, FileOutcome, FreshnessCoordinator, FreshnessService, MetadataStore,
    RemoteCheck, TransferObserver, TriggerResponse,
};
use crate::cli::args::{ConfigAction, ConfigArgs, GlobalArgs, StatusArgs, SyncArgs};
use crate::cli::progress::{ProgressBarObserver, ProgressConfig};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the sync command
pub async fn handle_sync(config: &AppConfig, args: SyncArgs, quiet: bool) -> Result<()> {
    config.validate()?;
    let layout = config.layout()?;
    let (client_config, coordinator_config) = config.to_runtime_config();

    let mut client = DatasetClient::new(client_config, layout.temp_dir())?;
    if config.coordinator.show_progress && !args.no_progress && !quiet {
        let observer = ProgressBarObserver::new(ProgressConfig::default());
        if observer.is_enabled() {
            let observer: Arc<dyn TransferObserver> = Arc::new(observer);
            client = client.with_observer(observer);
        }
    }

    let coordinator = FreshnessCoordinator::new(coordinator_config, layout, client).await?;
    let service = FreshnessService::new(coordinator);

    info!("Running freshness check (force: {})", args.force);
    let response = service.trigger(args.force).await;

    if !quiet {
        print_sync_summary(&response);
    }

    if response.success {
        Ok(())
    } else {
        Err(AppError::generic(response.message))
    }
}

fn print_sync_summary(response: &TriggerResponse) {
    let report = &response.report;

    if report.skipped {
        println!("ℹ️  {}", report.summary());
        println!("   Run 'csv_mirror sync --force' to check anyway.");
        return;
    }

    println!("\n📊 Sync Summary:");
    for dataset in &report.datasets {
        let check = match &dataset.remote_check {
            RemoteCheck::Skipped => "skipped (cooldown)".to_string(),
            RemoteCheck::Completed => "completed".to_string(),
            RemoteCheck::Incomplete { failed } => format!("incomplete ({} failed)", failed),
        };
        println!("  {} - remote check {}", dataset.dataset_id, check);

        for file in &dataset.files {
            match &file.outcome {
                FileOutcome::UpToDate => println!("    ✅ {} up to date", file.file_name),
                FileOutcome::Downloaded { bytes } => {
                    println!("    ⬇️  {} downloaded ({} bytes)", file.file_name, bytes)
                }
                FileOutcome::Failed { error } => {
                    println!("    ❌ {} failed: {}", file.file_name, error)
                }
            }
            if let Some(reason) = &file.reason {
                debug!("{} was downloaded because {}", file.file_name, reason);
            }
        }
    }

    match response.last_remote_check {
        Some(checked) => println!("  Last remote check: {}", checked.to_rfc3339()),
        None => println!("  Last remote check: never"),
    }
    println!("  {}", response.message);
}

/// Handle the status command
pub async fn handle_status(config: &AppConfig, args: StatusArgs) -> Result<()> {
    config.validate()?;
    let layout = config.layout()?;
    let (_, coordinator_config) = config.to_runtime_config();

    let store = MetadataStore::new(layout.metadata_path(), coordinator_config.sources.clone());
    let loaded = store.load().await;
    let report = status::collect(&layout, &loaded, &coordinator_config, Utc::now()).await;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::generic(format!("Failed to render status: {}", e)))?;
        println!("{}", json);
    } else {
        print_status(&report);
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!("📁 Mirror root: {}", report.root.display());
    println!(
        "   Metadata: {}",
        if report.metadata_exists {
            "present"
        } else {
            "missing or unusable"
        }
    );
    if !report.check_updates_on_startup {
        println!("   Update checks on startup are disabled");
    }
    println!();

    for dataset in &report.datasets {
        let last_check = dataset
            .last_remote_check
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("{}", dataset.dataset_id);
        println!(
            "  Last remote check: {}{}",
            last_check,
            if dataset.check_due { " (check due)" } else { "" }
        );

        for file in &dataset.files {
            let size = file
                .size
                .map(|s| format!("{} bytes", s))
                .unwrap_or_else(|| "missing".to_string());
            println!("  {} ({})", file.file_name, size);
            println!(
                "    downloaded: {}  remote modified: {}",
                file.last_download.as_deref().unwrap_or("-"),
                file.last_modified_remote.as_deref().unwrap_or("-")
            );
            if let Some(reason) = &file.would_download {
                println!("    ⚠️  next sync downloads it: {}", reason);
            }
        }
        println!();
    }

    if !report.extra_files.is_empty() {
        println!("Untracked CSV files:");
        for name in &report.extra_files {
            println!("  • {}", name);
        }
    }
}

/// Handle configuration management commands
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => {
            let path = match &global.config {
                Some(path) => path.clone(),
                None => AppConfig::default_config_path()?,
            };
            AppConfig::write_default(&path, force).await?;
            println!("📁 Created default configuration file:");
            println!("   {}", path.display());
            println!("   You can customize settings by editing this file.");
            Ok(())
        }
        ConfigAction::Show => {
            let source = AppConfig::locate(global.config.as_deref())?;
            let config = AppConfig::load(global.config.as_deref())
                .await?
                .with_root(global.root.clone());

            match source {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# Built-in defaults (no configuration file found)"),
            }
            println!("# Mirror root: {}", config.storage_root()?.display());
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
