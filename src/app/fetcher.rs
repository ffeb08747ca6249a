//! Per-unit download with bounded retries
//!
//! [`RetryingFetcher::fetch`] drives one unit through
//! `Pending → Transferring → Succeeded | Abandoned | Cancelled`. Each attempt
//! waits for its cooldown, takes a slot in the transfer pool, registers with
//! the session's [`TransferRegistry`] and runs one transfer. Failures of one
//! unit never affect its siblings.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::app::client::FileFetcher;
use crate::app::events::{EventSender, LogKind};
use crate::app::progress::ProgressAggregator;
use crate::app::retry::CooldownPolicy;
use crate::app::session::config::SessionConfig;
use crate::app::session::registry::TransferRegistry;
use crate::errors::DownloadError;

/// Terminal state of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Transferred in this call
    Downloaded { bytes: u64, attempts: u32 },
    /// A file of acceptable size was already on disk
    AlreadyPresent { bytes: u64 },
    /// The unit had already succeeded earlier in the session
    AlreadyDownloaded,
    /// Every attempt failed
    Abandoned { attempts: u32 },
    /// The session was cancelled
    Cancelled,
}

impl FetchOutcome {
    /// Whether the unit's file is in place
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FetchOutcome::Downloaded { .. }
                | FetchOutcome::AlreadyPresent { .. }
                | FetchOutcome::AlreadyDownloaded
        )
    }

    /// Whether a transfer actually happened in this call
    pub fn transferred(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded { .. })
    }
}

/// Whether an existing file of `existing` bytes can stand in for the download
///
/// Only applies when the expected size is known.
pub fn within_tolerance(existing: u64, expected: u64, tolerance: f64) -> bool {
    expected > 0 && existing.abs_diff(expected) as f64 <= expected as f64 * tolerance
}

/// Downloads units with retries, cooldown and cooperative cancellation
pub struct RetryingFetcher {
    files: Arc<dyn FileFetcher>,
    progress: Arc<ProgressAggregator>,
    registry: Arc<TransferRegistry>,
    slots: Semaphore,
    cooldown: CooldownPolicy,
    max_tries: u32,
    tolerance: f64,
    events: EventSender,
}

impl RetryingFetcher {
    pub fn new(
        files: Arc<dyn FileFetcher>,
        progress: Arc<ProgressAggregator>,
        registry: Arc<TransferRegistry>,
        config: &SessionConfig,
        events: EventSender,
    ) -> Self {
        Self {
            files,
            progress,
            registry,
            slots: Semaphore::new(config.max_concurrent_downloads.max(1)),
            cooldown: config.cooldown_policy(),
            max_tries: config.download_max_tries.max(1),
            tolerance: config.allowable_file_size_difference,
            events,
        }
    }

    /// Fetches `url` to `destination`
    ///
    /// `label` names the unit in log entries (track title, "cover art").
    pub async fn fetch(&self, url: &str, destination: &Path, label: &str) -> FetchOutcome {
        if self.progress.is_downloaded(url) {
            return FetchOutcome::AlreadyDownloaded;
        }
        if self.registry.is_cancelled() {
            return FetchOutcome::Cancelled;
        }

        if let Some(bytes) = self.existing_file(url, destination).await {
            self.progress.mark_downloaded(url, bytes);
            self.events.verbose(format!(
                "{} already exists at {}, skipping download",
                label,
                destination.display()
            ));
            return FetchOutcome::AlreadyPresent { bytes };
        }

        let cancel = self.registry.session_token();

        for attempt in 0..self.max_tries {
            if !self.cooldown.wait(attempt, &cancel).await {
                return FetchOutcome::Cancelled;
            }

            let _slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return FetchOutcome::Cancelled,
                slot = self.slots.acquire() => match slot {
                    Ok(slot) => slot,
                    Err(_) => return FetchOutcome::Cancelled,
                },
            };

            let Some(handle) = self.registry.register() else {
                return FetchOutcome::Cancelled;
            };

            self.events.verbose(format!("Downloading {} from {}", label, url));
            let on_progress = |bytes: u64| {
                self.progress.record(url, bytes);
            };
            let result = self
                .files
                .fetch_file(url, destination, handle.token(), &on_progress)
                .await;
            drop(handle);

            let tries = attempt + 1;
            match result {
                Ok(bytes) => {
                    self.progress.mark_downloaded(url, bytes);
                    self.events
                        .log(LogKind::IntermediateSuccess, format!("Downloaded {}", label));
                    return FetchOutcome::Downloaded {
                        bytes,
                        attempts: tries,
                    };
                }
                Err(DownloadError::Cancelled) => return FetchOutcome::Cancelled,
                Err(_) if self.registry.is_cancelled() => return FetchOutcome::Cancelled,
                Err(e) if tries < self.max_tries => {
                    self.events.warning(format!(
                        "Unable to download {}. Try {} of {}: {}",
                        label, tries, self.max_tries, e
                    ));
                }
                Err(e) => {
                    self.events.error(format!(
                        "Unable to download {}. Hit max retries of {}: {}",
                        label, self.max_tries, e
                    ));
                }
            }
        }

        FetchOutcome::Abandoned {
            attempts: self.max_tries,
        }
    }

    /// Size of an existing file at `destination` if it matches the probed size
    async fn existing_file(&self, url: &str, destination: &Path) -> Option<u64> {
        let metadata = tokio::fs::metadata(destination).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        let expected = self.progress.expected_size(url);
        within_tolerance(metadata.len(), expected, self.tolerance).then_some(metadata.len())
    }
}
