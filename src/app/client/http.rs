//! Core HTTP operations with request spacing
//!
//! Every request to the dataset host goes through [`HttpHandler`], which waits
//! on a shared rate limiter first. There is no retry here: a failed request is
//! reported and the next check cycle tries again.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use reqwest::{Client, Response};
use url::Url;

use crate::errors::{ConfigError, ConfigResult};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with request spacing
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> ConfigResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "client.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    async fn wait_turn(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }

    /// Issue a metadata-only request
    pub async fn head(&self, url: &Url, timeout: Duration) -> reqwest::Result<Response> {
        self.wait_turn().await;
        tracing::debug!("HEAD {}", url);
        self.client.head(url.as_str()).timeout(timeout).send().await
    }

    /// Issue a full request; the body is left unread for streaming
    pub async fn get(&self, url: &Url) -> reqwest::Result<Response> {
        self.wait_turn().await;
        tracing::debug!("GET {}", url);
        self.client.get(url.as_str()).send().await
    }
}
