//! HTTP client for Bandcamp pages and media files
//!
//! The download pipeline only depends on three narrow collaborator traits:
//! [`PageFetcher`], [`SizeProber`] and [`FileFetcher`]. [`WebClient`]
//! implements all of them over reqwest; tests substitute in-memory fakes.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and page retries
//! - `download`: Streaming file transfers with atomic writes

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{DownloadError, DownloadResult};

pub mod config;
pub mod download;
pub mod http;

pub use config::{ClientConfig, PageRetry};

use download::DownloadHandler;
use http::HttpHandler;

/// Request method used to learn a resource's size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    /// Header-only request (artwork)
    Head,
    /// Full request whose body is never read (media, some origins reject HEAD)
    Get,
}

/// Fetches the text of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the page body, or `DownloadError::Cancelled` once `cancel` fires
    async fn fetch_page(&self, url: &str, cancel: &CancellationToken) -> DownloadResult<String>;
}

/// Learns a resource's byte size without downloading it
#[async_trait]
pub trait SizeProber: Send + Sync {
    async fn probe_size(&self, url: &str, method: ProbeMethod) -> DownloadResult<u64>;
}

/// Downloads one resource to disk in a single attempt
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Writes `url` to `destination`, returning the number of bytes written
    ///
    /// `on_progress` receives the running byte count. When `cancel` fires the
    /// transfer stops with `DownloadError::Cancelled` and leaves no file at
    /// `destination`.
    async fn fetch_file(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64>;
}

/// reqwest-backed implementation of every collaborator trait
#[derive(Debug)]
pub struct WebClient {
    http_handler: HttpHandler,
}

impl WebClient {
    /// Creates a client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if HTTP client creation fails
    pub fn new() -> DownloadResult<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if HTTP client creation fails or the rate limit is zero
    pub fn with_config(config: &ClientConfig) -> DownloadResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps, config.page_retry)?;
        tracing::debug!("Created web client with {} page requests/s", config.rate_limit_rps);
        Ok(Self { http_handler })
    }
}

fn parse_url(url: &str) -> DownloadResult<Url> {
    Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        error: e.to_string(),
    })
}

#[async_trait]
impl PageFetcher for WebClient {
    async fn fetch_page(&self, url: &str, cancel: &CancellationToken) -> DownloadResult<String> {
        let url = parse_url(url)?;
        self.http_handler.get_page(&url, cancel).await
    }
}

#[async_trait]
impl SizeProber for WebClient {
    async fn probe_size(&self, url: &str, method: ProbeMethod) -> DownloadResult<u64> {
        let url = parse_url(url)?;
        self.http_handler.probe_size(&url, method).await
    }
}

#[async_trait]
impl FileFetcher for WebClient {
    async fn fetch_file(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64> {
        let url = parse_url(url)?;
        DownloadHandler::new(&self.http_handler)
            .download_file(&url, destination, cancel, on_progress)
            .await
    }
}
