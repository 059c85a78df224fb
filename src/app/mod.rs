//! Core application logic for CSV Mirror
//!
//! This module contains the freshness subsystem: the HTTP client for the
//! dataset host, the data models and metadata store, the local storage
//! layout, the freshness coordinator and the read-only status view.
//!
//! # Examples
//!
//! ```rust,no_run
//! use csv_mirror::app::{
//!     ClientConfig, CoordinatorConfig, DataLayout, DatasetClient, FreshnessCoordinator,
//!     FreshnessService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = DataLayout::new(DataLayout::default_root()?);
//! let client = DatasetClient::new(ClientConfig::default(), layout.temp_dir())?;
//! let coordinator =
//!     FreshnessCoordinator::new(CoordinatorConfig::default(), layout, client).await?;
//!
//! // Startup run: respects the cooldown
//! let service = FreshnessService::new(coordinator);
//! let response = service.trigger(false).await;
//! println!("{} (last check: {:?})", response.message, response.last_remote_check);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod coordinator;
pub mod layout;
pub mod metadata;
pub mod models;
pub mod status;

// Re-export main public API
pub use client::{
    ClientConfig, DatasetClient, DownloadExecutor, NoopObserver, RemoteHost, RemoteProbe,
    TransferObserver,
};
pub use coordinator::{
    CoordinatorConfig, DatasetReport, DownloadReason, FileOutcome, FileReport,
    FreshnessCoordinator, FreshnessService, RemoteCheck, RunReport, TriggerResponse,
};
pub use layout::DataLayout;
pub use metadata::{LoadedMetadata, MetadataStore};
pub use models::{DatasetSource, MetadataDocument, TrackedDataset, TrackedFile};
pub use status::StatusReport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.url_template.contains("{file}"));
        assert_eq!(CoordinatorConfig::default().sources, DatasetSource::default_sources());
    }
}
