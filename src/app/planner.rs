//! Download planning and size probing
//!
//! Flattens albums into the ordered list of download units: each album's
//! cover art first (when requested), then its tracks. With size probing
//! enabled every unit is probed before any transfer starts, HEAD for artwork
//! and GET for audio. A unit whose probe keeps failing keeps an expected size
//! of 0, which switches progress reporting to unit counts.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::app::client::{ProbeMethod, SizeProber};
use crate::app::events::EventSender;
use crate::app::models::{Album, DownloadUnit, UnitKind};
use crate::app::retry::CooldownPolicy;
use crate::app::session::config::SessionConfig;

/// Builds the session's download units from resolved albums
pub struct DownloadPlanner {
    prober: Arc<dyn SizeProber>,
    cancel: CancellationToken,
    cooldown: CooldownPolicy,
    max_tries: u32,
    probe_sizes: bool,
    concurrency: usize,
    events: EventSender,
}

impl DownloadPlanner {
    pub fn new(
        prober: Arc<dyn SizeProber>,
        cancel: CancellationToken,
        config: &SessionConfig,
        events: EventSender,
    ) -> Self {
        Self {
            prober,
            cancel,
            cooldown: config.cooldown_policy(),
            max_tries: config.download_max_tries.max(1),
            probe_sizes: config.retrieve_file_sizes,
            concurrency: config.probe_concurrency.max(1),
            events,
        }
    }

    /// Plans every unit for `albums`, in album then track order
    ///
    /// Albums without artwork contribute no artwork unit; a URL shared by
    /// several albums yields a single unit. Returns an empty list if the
    /// session is cancelled while probing.
    pub async fn plan(&self, albums: &[Album], include_artwork: bool) -> Vec<DownloadUnit> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for album in albums {
            if include_artwork && album.has_artwork() && seen.insert(album.artwork_url.clone()) {
                candidates.push((album.artwork_url.clone(), UnitKind::Artwork));
            }
            for track in &album.tracks {
                if seen.insert(track.mp3_url.clone()) {
                    candidates.push((track.mp3_url.clone(), UnitKind::Track));
                }
            }
        }

        if !self.probe_sizes {
            return candidates
                .into_iter()
                .map(|(url, kind)| DownloadUnit::new(url, kind, 0))
                .collect();
        }

        self.events.info("Computing files size...");

        let units: Vec<DownloadUnit> = stream::iter(candidates)
            .map(|(url, kind)| async move {
                let size = self.probe_with_retries(&url, kind).await;
                DownloadUnit::new(url, kind, size)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            return Vec::new();
        }

        let unsized_count = units.iter().filter(|unit| !unit.is_sized()).count();
        if unsized_count > 0 {
            self.events.warning(format!(
                "Size of {} of {} files is unknown, progress is counted in files",
                unsized_count,
                units.len()
            ));
        }
        units
    }

    /// Probes one unit, retrying with the session's cooldown; 0 on failure
    async fn probe_with_retries(&self, url: &str, kind: UnitKind) -> u64 {
        let method = match kind {
            UnitKind::Artwork => ProbeMethod::Head,
            UnitKind::Track => ProbeMethod::Get,
        };

        for attempt in 0..self.max_tries {
            if !self.cooldown.wait(attempt, &self.cancel).await {
                return 0;
            }

            let probed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return 0,
                probed = self.prober.probe_size(url, method) => probed,
            };
            match probed {
                Ok(size) => {
                    self.events
                        .verbose(format!("Size of {} {}: {} bytes", kind, url, size));
                    return size;
                }
                Err(e) if attempt + 1 < self.max_tries => {
                    self.events.verbose(format!(
                        "Retrieving size of {} failed. Try {} of {}: {}",
                        url,
                        attempt + 1,
                        self.max_tries,
                        e
                    ));
                }
                Err(e) => {
                    self.events.warning(format!(
                        "Could not retrieve size of {}. Hit max retries of {}: {}",
                        url, self.max_tries, e
                    ));
                }
            }
        }
        0
    }
}
