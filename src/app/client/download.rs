//! File download operations with atomic writes and streaming
//!
//! A transfer streams the response body into `<destination>.part`, reporting
//! the running byte count after every chunk, and renames the file into place
//! once the body is complete. Cancellation is observed while waiting for the
//! response and between chunks; an aborted or failed transfer removes its
//! partial file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler with the given HTTP handler
    pub fn new(http_handler: &'a HttpHandler) -> Self {
        Self { http_handler }
    }

    /// Downloads a file to the specified path with atomic operations
    ///
    /// Makes exactly one attempt. Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to download from
    /// * `destination` - The path to save the file to
    /// * `cancel` - Aborts the transfer when cancelled
    /// * `on_progress` - Receives the number of bytes written so far
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The HTTP request fails or returns an error status
    /// - File I/O operations fail
    /// - The transfer is cancelled (`DownloadError::Cancelled`)
    pub async fn download_file(
        &self,
        url: &Url,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(destination);

        match self
            .download_file_attempt(url, &temp_path, cancel, on_progress)
            .await
        {
            Ok(received) => {
                tokio::fs::rename(&temp_path, destination)
                    .await
                    .map_err(|_e| DownloadError::AtomicOperationFailed {
                        temp_path: temp_path.clone(),
                        final_path: destination.to_path_buf(),
                    })?;
                tracing::debug!(
                    "Downloaded {} ({} bytes) to {}",
                    url,
                    received,
                    destination.display()
                );
                Ok(received)
            }
            Err(e) => {
                if tokio::fs::try_exists(&temp_path).await.unwrap_or(false) {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                }
                Err(e)
            }
        }
    }

    async fn download_file_attempt(
        &self,
        url: &Url,
        temp_path: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.http_handler.client().get(url.as_str()).send() => response?,
        };

        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }

        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk).await?;
                    received += chunk.len() as u64;
                    on_progress(received);
                }
                Some(Err(e)) => return Err(DownloadError::Http(e)),
                None => break,
            }
        }

        file.flush().await?;
        Ok(received)
    }
}

/// Path of the in-progress file for a destination
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_owned();
    name.push(files::TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}
