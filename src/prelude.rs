//! Prelude module for CSV Mirror Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use csv_mirror::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use csv_mirror::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let layout = DataLayout::new(DataLayout::default_root()?);
//!     let client = DatasetClient::new(ClientConfig::default(), layout.temp_dir())?;
//!     let mut coordinator =
//!         FreshnessCoordinator::new(CoordinatorConfig::default(), layout, client).await?;
//!
//!     let report = coordinator.run(false).await;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Remote access
    ClientConfig,
    DatasetClient,
    RemoteHost,
    TransferObserver,

    // Core orchestration
    CoordinatorConfig,
    FreshnessCoordinator,
    FreshnessService,
    TriggerResponse,

    // Storage
    DataLayout,
    MetadataStore,

    // Data and result types
    DatasetSource,
    DownloadReason,
    FileOutcome,
    MetadataDocument,
    RunReport,
    StatusReport,
};

// Configuration file
pub use crate::config::AppConfig;
