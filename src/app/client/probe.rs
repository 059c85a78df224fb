//! Remote probe: learn a file's last-modified time without downloading it

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::errors::{ProbeError, ProbeResult};

/// Metadata-only requests against the dataset host
pub struct RemoteProbe<'a> {
    http_handler: &'a HttpHandler,
    timeout: Duration,
}

impl<'a> RemoteProbe<'a> {
    /// Creates a probe bounded by `timeout` per request
    pub fn new(http_handler: &'a HttpHandler, timeout: Duration) -> Self {
        Self {
            http_handler,
            timeout,
        }
    }

    /// Fetch the `Last-Modified` header of `url` as a UTC instant
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` on network failure, timeout, non-success status,
    /// or a missing or unparseable header.
    pub async fn last_modified(&self, url: &Url) -> ProbeResult<DateTime<Utc>> {
        let response = self
            .http_handler
            .head(url, self.timeout)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    ProbeError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(ProbeError::ServerError {
                status: response.status().as_u16(),
            });
        }

        let header = response
            .headers()
            .get(LAST_MODIFIED)
            .ok_or(ProbeError::MissingLastModified)?;
        let value = header
            .to_str()
            .map_err(|_| ProbeError::InvalidLastModified {
                value: String::from_utf8_lossy(header.as_bytes()).into_owned(),
            })?;

        parse_http_date(value).ok_or_else(|| ProbeError::InvalidLastModified {
            value: value.to_string(),
        })
    }
}

/// Parse an HTTP date header value into a UTC instant
///
/// Accepts the preferred IMF-fixdate form and the two obsolete forms HTTP
/// recipients must still understand (RFC 850 and asctime). Forms without a
/// zone are taken as UTC.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const OBSOLETE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];
    OBSOLETE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
