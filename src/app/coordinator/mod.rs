//! Freshness orchestration
//!
//! This module provides the coordination layer that decides when the remote
//! host is consulted and which tracked files are downloaded, then drives the
//! metadata store, the remote probe and the download executor in that order.
//!
//! # Run sequence
//!
//! One run walks every configured dataset in turn:
//!
//! 1. **Check-due**: probe the remote host if forced, if the dataset was never
//!    checked, or if the cooldown has elapsed since the last check
//! 2. **Remote check**: refresh each file's remote modification time; the
//!    dataset's check time only advances when every probe succeeded
//! 3. **Download-due**: evaluate [`decision::download_reason`] per file
//! 4. **Download**: fetch flagged files one at a time
//!
//! and finally persists the metadata document, whatever happened before.
//!
//! # Architecture
//!
//! - [`config`] - Tracked sources and cooldown
//! - [`decision`] - Pure check-due and download-due rules
//! - [`report`] - Run outcome structures
//! - [`service`] - Single-flight trigger around one coordinator
//!
//! # Examples
//!
//! ```rust,no_run
//! use csv_mirror::app::{ClientConfig, CoordinatorConfig, DataLayout, DatasetClient};
//! use csv_mirror::app::FreshnessCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = DataLayout::new("/tmp/csv-mirror");
//! let client = DatasetClient::new(ClientConfig::default(), layout.temp_dir())?;
//!
//! let mut coordinator =
//!     FreshnessCoordinator::new(CoordinatorConfig::default(), layout, client).await?;
//! let report = coordinator.run(false).await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decision;
pub mod report;
pub mod service;

#[cfg(test)]
pub mod tests;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::app::client::RemoteHost;
use crate::app::layout::{is_valid_local_file, DataLayout};
use crate::app::metadata::MetadataStore;
use crate::app::models::{format_timestamp, DatasetSource, MetadataDocument};
use crate::errors::{display_chain, Result};

pub use config::CoordinatorConfig;
pub use decision::{download_reason, is_check_due, DownloadReason};
pub use report::{DatasetReport, FileOutcome, FileReport, RemoteCheck, RunReport};
pub use service::{FreshnessService, TriggerResponse};

/// Coordinator for keeping the tracked files fresh
///
/// Owns the in-memory metadata document for the whole session. Runs are not
/// reentrant; share a coordinator through [`FreshnessService`].
pub struct FreshnessCoordinator<H: RemoteHost> {
    config: CoordinatorConfig,
    layout: DataLayout,
    store: MetadataStore,
    host: H,
    document: MetadataDocument,
    existed_at_start: bool,
}

impl<H: RemoteHost> FreshnessCoordinator<H> {
    /// Create a coordinator and load the session's metadata document
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the data
    /// directories cannot be created. An unusable metadata document is not an
    /// error: the built-in default is used instead.
    pub async fn new(config: CoordinatorConfig, layout: DataLayout, host: H) -> Result<Self> {
        config.validate()?;
        layout.ensure_directories().await?;

        let store = MetadataStore::new(layout.metadata_path(), config.sources.clone());
        let loaded = store.load().await;

        info!(
            "Tracking {} file(s) from {} dataset(s) in {}",
            config.file_count(),
            config.sources.len(),
            layout.data_dir().display()
        );

        Ok(Self {
            config,
            layout,
            store,
            host,
            document: loaded.document,
            existed_at_start: loaded.existed_at_start,
        })
    }

    /// Current in-memory metadata document
    pub fn document(&self) -> &MetadataDocument {
        &self.document
    }

    /// Whether every file is still distrusted because no metadata existed
    ///
    /// Cleared once a run has persisted a document.
    pub fn existed_at_start(&self) -> bool {
        self.existed_at_start
    }

    /// Storage layout
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Remote host the coordinator talks to
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Last remote check of the first configured dataset
    pub fn last_remote_check(&self) -> Option<DateTime<Utc>> {
        self.config
            .sources
            .first()
            .and_then(|source| self.document.dataset(&source.id))
            .and_then(|dataset| dataset.last_remote_check_at())
    }

    /// Run one check-and-download cycle against the wall clock
    pub async fn run(&mut self, force: bool) -> RunReport {
        self.run_at(Utc::now(), force).await
    }

    /// Run one check-and-download cycle using `now` as the current instant
    pub async fn run_at(&mut self, now: DateTime<Utc>, force: bool) -> RunReport {
        if !force && !self.document.check_updates_on_startup {
            info!("Update checks on startup are disabled. Skipping check and download");
            return RunReport::skipped(now);
        }

        info!("Starting freshness run{}", if force { " (forced)" } else { "" });

        if let Err(e) = self.layout.ensure_directories().await {
            warn!("Failed to create data directories: {}", e);
        }

        let sources = self.config.sources.clone();
        self.document.reconcile(&sources);

        let mut datasets = Vec::with_capacity(sources.len());
        for source in &sources {
            datasets.push(self.process_dataset(source, now, force).await);
        }

        let persisted = match self.store.save(&self.document).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to save metadata, keeping in-memory state: {}",
                    display_chain(&e)
                );
                false
            }
        };

        if persisted && !self.existed_at_start {
            debug!("Metadata persisted; stored timestamps are trusted from now on");
            self.existed_at_start = true;
        }

        let report = RunReport {
            started_at: now,
            skipped: false,
            datasets,
            persisted,
        };
        info!("Freshness run finished: {}", report.summary());
        report
    }

    async fn process_dataset(
        &mut self,
        source: &DatasetSource,
        now: DateTime<Utc>,
        force: bool,
    ) -> DatasetReport {
        let last_check = self.document.dataset_entry(&source.id).last_remote_check_at();

        let remote_check = if is_check_due(last_check, now, self.config.cooldown, force) {
            self.check_remote(source, now).await
        } else {
            debug!(
                "Skipping remote check for {}: last checked {}",
                source.id,
                last_check.map(format_timestamp).unwrap_or_default()
            );
            RemoteCheck::Skipped
        };

        let mut files = Vec::with_capacity(source.files.len());
        for file_name in &source.files {
            files.push(self.refresh_file(&source.id, file_name, now).await);
        }

        DatasetReport {
            dataset_id: source.id.clone(),
            remote_check,
            last_remote_check: self.document.dataset_entry(&source.id).last_remote_check_at(),
            files,
        }
    }

    async fn check_remote(&mut self, source: &DatasetSource, now: DateTime<Utc>) -> RemoteCheck {
        info!("Checking {} for file updates", source.id);

        let mut failed = 0;
        for file_name in &source.files {
            match self.host.last_modified(&source.id, file_name).await {
                Ok(modified) => {
                    debug!("{} last modified remotely at {}", file_name, modified);
                    self.document
                        .dataset_entry(&source.id)
                        .file_entry(file_name)
                        .last_modified_remote = Some(format_timestamp(modified));
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        "Failed to get remote last modified time for {}: {}",
                        file_name,
                        display_chain(&e)
                    );
                }
            }
        }

        if failed == 0 {
            self.document
                .dataset_entry(&source.id)
                .advance_remote_check(now);
            RemoteCheck::Completed
        } else {
            warn!(
                "Could not refresh all remote timestamps for {}. Will try again next run",
                source.id
            );
            RemoteCheck::Incomplete { failed }
        }
    }

    async fn refresh_file(
        &mut self,
        dataset_id: &str,
        file_name: &str,
        now: DateTime<Utc>,
    ) -> FileReport {
        let final_path = self.layout.file_path(file_name);
        let local_valid = is_valid_local_file(&final_path).await;

        let entry = self.document.dataset_entry(dataset_id).file_entry(file_name);
        let Some(reason) = download_reason(self.existed_at_start, local_valid, entry) else {
            debug!("{} is up to date", file_name);
            return FileReport {
                file_name: file_name.to_string(),
                reason: None,
                outcome: FileOutcome::UpToDate,
            };
        };

        if reason.resets_timestamps() {
            entry.clear_timestamps();
        }

        info!("Queuing download for {}: {}", file_name, reason);

        let outcome = match self.host.fetch(dataset_id, file_name, &final_path).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", file_name, bytes);
                self.document
                    .dataset_entry(dataset_id)
                    .file_entry(file_name)
                    .last_download = Some(format_timestamp(now));
                FileOutcome::Downloaded { bytes }
            }
            Err(e) => {
                let error = display_chain(&e);
                warn!("Failed to download {}: {}", file_name, error);
                FileOutcome::Failed { error }
            }
        };

        FileReport {
            file_name: file_name.to_string(),
            reason: Some(reason),
            outcome,
        }
    }
}
