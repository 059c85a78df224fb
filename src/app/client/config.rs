//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! used for remote probes and file transfers.

use std::time::Duration;

use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{http, limits, remote};
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for the dataset host client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Download URL template with `{dataset}` and `{file}` placeholders
    pub url_template: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Timeout for metadata-only requests
    pub probe_timeout: Duration,
    /// Timeout for a complete file transfer
    pub download_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url_template: remote::DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: http::USER_AGENT.to_string(),
            probe_timeout: http::PROBE_TIMEOUT,
            download_timeout: http::DOWNLOAD_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// No client-wide request timeout is set: probes and transfers each apply
    /// their own bound.
    pub fn build_http_client(&self) -> DownloadResult<Client> {
        let mut client_builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(redirect::Policy::limited(http::MAX_REDIRECTS))
            .tcp_nodelay(true);

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(DownloadError::Http)
    }

    /// Resolve the URL of a tracked file
    pub fn file_url(&self, dataset_id: &str, file_name: &str) -> Result<Url, url::ParseError> {
        build_file_url(&self.url_template, dataset_id, file_name)
    }
}

/// Substitute a dataset identifier and file name into a URL template
pub fn build_file_url(
    template: &str,
    dataset_id: &str,
    file_name: &str,
) -> Result<Url, url::ParseError> {
    let raw = template
        .replace(remote::DATASET_PLACEHOLDER, dataset_id.trim_matches('/'))
        .replace(remote::FILE_PLACEHOLDER, file_name);
    Url::parse(&raw)
}
