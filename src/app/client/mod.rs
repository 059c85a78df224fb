//! HTTP client for the remote dataset host
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration, building and URL templating
//! - `http`: Core HTTP operations with request spacing
//! - `probe`: Metadata-only requests for a file's last-modified time
//! - `download`: Streaming transfers with atomic publishing
//!
//! [`RemoteHost`] is the seam the freshness coordinator talks to;
//! [`DatasetClient`] is its network-backed implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{DownloadError, DownloadResult, ProbeError, ProbeResult, Result};

// Module declarations
pub mod config;
pub mod download;
pub mod http;
pub mod probe;

pub use config::{build_file_url, ClientConfig};
pub use download::{DownloadExecutor, NoopObserver, TransferObserver};
pub use probe::{parse_http_date, RemoteProbe};

use http::HttpHandler;

/// Remote operations needed by one freshness cycle
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Last-modified instant of a tracked file on the remote host
    async fn last_modified(&self, dataset_id: &str, file_name: &str)
        -> ProbeResult<DateTime<Utc>>;

    /// Download a tracked file and publish it at `final_path`, returning its size
    async fn fetch(
        &self,
        dataset_id: &str,
        file_name: &str,
        final_path: &Path,
    ) -> DownloadResult<u64>;
}

/// Network-backed [`RemoteHost`]
#[derive(Debug)]
pub struct DatasetClient {
    http_handler: HttpHandler,
    config: ClientConfig,
    executor: DownloadExecutor,
}

impl DatasetClient {
    /// Creates a client whose transfers stage files in `temp_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the rate limit
    /// is zero
    pub fn new(config: ClientConfig, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps)?;
        let executor = DownloadExecutor::new(temp_dir).with_timeout(config.download_timeout);

        tracing::debug!("Created dataset client for {}", config.url_template);

        Ok(Self {
            http_handler,
            config,
            executor,
        })
    }

    /// Report transfer progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteHost for DatasetClient {
    async fn last_modified(
        &self,
        dataset_id: &str,
        file_name: &str,
    ) -> ProbeResult<DateTime<Utc>> {
        let url = self
            .config
            .file_url(dataset_id, file_name)
            .map_err(|e| ProbeError::InvalidUrl {
                url: self.config.url_template.clone(),
                error: e.to_string(),
            })?;

        RemoteProbe::new(&self.http_handler, self.config.probe_timeout)
            .last_modified(&url)
            .await
    }

    async fn fetch(
        &self,
        dataset_id: &str,
        file_name: &str,
        final_path: &Path,
    ) -> DownloadResult<u64> {
        let url = self
            .config
            .file_url(dataset_id, file_name)
            .map_err(|e| DownloadError::InvalidUrl {
                url: self.config.url_template.clone(),
                error: e.to_string(),
            })?;

        self.executor
            .fetch(&self.http_handler, &url, final_path)
            .await
    }
}
