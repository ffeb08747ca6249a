//! Network settings for [`WebClient`](super::WebClient)
//!
//! Connection tuning for the shared `reqwest::Client` plus the page-level
//! retry schedule. Size probes and file transfers are not covered by
//! [`PageRetry`]: their attempts are counted by the download pipeline.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};
use crate::errors::{DownloadError, DownloadResult};

/// Transient-failure retries for page requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRetry {
    /// Retries after the first request; 0 disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub base_delay: Duration,
}

impl Default for PageRetry {
    fn default() -> Self {
        Self {
            max_retries: limits::PAGE_MAX_RETRIES,
            base_delay: Duration::from_millis(limits::PAGE_RETRY_BASE_DELAY_MS),
        }
    }
}

impl PageRetry {
    /// Wait before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Settings of the shared HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    pub pool_idle_timeout: Option<Duration>,
    /// Idle connections kept per host; Bandcamp serves media from few hosts
    pub pool_max_per_host: usize,
    /// Whole-request timeout, body included. Must cover the slowest track.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Page requests per second
    pub rate_limit_rps: u32,
    pub page_retry: PageRetry,
    pub user_agent: String,
    /// Honour `HTTP(S)_PROXY` and friends
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(http::TCP_KEEPALIVE),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::PAGE_RATE_LIMIT_RPS,
            page_retry: PageRetry::default(),
            user_agent: http::USER_AGENT.to_string(),
            use_system_proxy: true,
        }
    }
}

impl ClientConfig {
    /// Builds the `reqwest::Client` shared by pages, probes and transfers
    ///
    /// Cookies are kept for the whole run since release pages set the
    /// session cookie the media host expects.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::InvalidClientConfig` if reqwest rejects the settings
    pub fn build_http_client(&self) -> DownloadResult<Client> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent.as_str())
            .redirect(Policy::limited(http::MAX_REDIRECTS))
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }
        if let Some(idle) = self.pool_idle_timeout {
            builder = builder.pool_idle_timeout(idle);
        }
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }

        builder
            .build()
            .map_err(|e| DownloadError::InvalidClientConfig(e.to_string()))
    }
}
