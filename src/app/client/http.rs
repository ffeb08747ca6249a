//! Core HTTP operations with rate limiting and retry logic
//!
//! Page requests go through a rate limiter and are retried on transport
//! errors and on HTTP 429/503 with exponential backoff. Size probes and file
//! transfers are sent once; their retries are driven by the download
//! pipeline's own cooldown policy.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{DownloadError, DownloadResult};

use super::config::PageRetry;
use super::ProbeMethod;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    page_retry: PageRetry,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use for requests
    /// * `rate_limit_rps` - Page requests per second
    /// * `page_retry` - Retry schedule for transient page failures
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the rate limit is zero
    pub fn new(
        client: Client,
        rate_limit_rps: u32,
        page_retry: PageRetry,
    ) -> DownloadResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            page_retry,
        })
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> DownloadResult<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let rate = NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            DownloadError::InvalidClientConfig("Rate limit must be non-zero".to_string())
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rate)))
    }

    /// Fetches a page response with rate limiting and transient retries
    ///
    /// Every attempt waits for the rate limiter. `cancel` is observed while
    /// waiting for the limiter, during the request and during the backoff
    /// sleep.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::Cancelled` once `cancel` fires, otherwise
    /// `DownloadError` if the request still fails once the page retries are
    /// used up, or the server answers with a non-retryable error status
    pub async fn get_response(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> DownloadResult<Response> {
        let mut retries = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                _ = self
                    .rate_limiter
                    .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100))) => {}
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                sent = self.client.get(url.as_str()).send() => sent,
            };
            let failure = match sent {
                Ok(response) => match response.status() {
                    StatusCode::TOO_MANY_REQUESTS => DownloadError::RateLimitExceeded,
                    StatusCode::SERVICE_UNAVAILABLE => DownloadError::ServerOverloaded,
                    status if !status.is_success() => {
                        return Err(DownloadError::ServerError {
                            status: status.as_u16(),
                        })
                    }
                    _ => {
                        tracing::debug!("Successfully fetched response: {}", url);
                        return Ok(response);
                    }
                },
                Err(e) => DownloadError::Http(e),
            };

            let max_retries = self.page_retry.max_retries;
            if retries >= max_retries {
                tracing::error!(
                    "Request to {} failed after {} retries: {}",
                    url,
                    max_retries,
                    failure
                );
                return Err(failure);
            }

            retries += 1;
            let delay = self.page_retry.delay(retries);
            tracing::warn!(
                "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                retries,
                max_retries,
                failure,
                delay.as_millis()
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Fetches the text content of a web page
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails after retries, is
    /// cancelled, or the body cannot be decoded
    pub async fn get_page(&self, url: &Url, cancel: &CancellationToken) -> DownloadResult<String> {
        let response = self.get_response(url, cancel).await?;
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            text = response.text() => text?,
        };
        tracing::debug!("Successfully fetched page: {} ({} bytes)", url, text.len());
        Ok(text)
    }

    /// Asks the server for a resource's size without downloading it
    ///
    /// The body of a GET probe is never read; dropping the response closes
    /// the transfer.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on transport failure, error status, or when the
    /// response has no Content-Length header
    pub async fn probe_size(&self, url: &Url, method: ProbeMethod) -> DownloadResult<u64> {
        let request = match method {
            ProbeMethod::Head => self.client.head(url.as_str()),
            ProbeMethod::Get => self.client.get(url.as_str()),
        };
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }

        content_length(&response).ok_or_else(|| DownloadError::MissingContentLength {
            url: url.to_string(),
        })
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Reads the Content-Length header
///
/// `Response::content_length` reports the body size hint, which is zero for
/// HEAD responses, so the header is parsed directly.
fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
