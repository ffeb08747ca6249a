//! Album metadata loading
//!
//! Fetches each album page and runs it through the [`MetadataExtractor`].
//! Pages that cannot be fetched or parsed are logged and skipped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::client::PageFetcher;
use crate::app::events::EventSender;
use crate::app::extractor::MetadataExtractor;
use crate::app::models::Album;
use crate::errors::DownloadError;

/// Resolves album URLs into album metadata
pub struct AlbumLoader {
    pages: Arc<dyn PageFetcher>,
    extractor: Arc<dyn MetadataExtractor>,
    cancel: CancellationToken,
    events: EventSender,
}

impl AlbumLoader {
    pub fn new(
        pages: Arc<dyn PageFetcher>,
        extractor: Arc<dyn MetadataExtractor>,
        cancel: CancellationToken,
        events: EventSender,
    ) -> Self {
        Self {
            pages,
            extractor,
            cancel,
            events,
        }
    }

    /// Loads every album in URL order; empty when cancelled
    pub async fn load(&self, urls: &[String]) -> Vec<Album> {
        let mut albums = Vec::with_capacity(urls.len());

        for url in urls {
            self.events.info(format!("Retrieving album data for {}", url));

            if self.cancel.is_cancelled() {
                return Vec::new();
            }

            let page = match self.pages.fetch_page(url, &self.cancel).await {
                Ok(page) => page,
                Err(DownloadError::Cancelled) => return Vec::new(),
                Err(e) => {
                    self.events
                        .error(format!("Could not retrieve data for {}: {}", url, e));
                    continue;
                }
            };

            match self.extractor.extract_album(&page) {
                Ok(album) => {
                    self.events.verbose(format!(
                        "Found \"{}\" by {} with {} tracks",
                        album.title,
                        album.artist,
                        album.tracks.len()
                    ));
                    albums.push(album);
                }
                Err(e) => self
                    .events
                    .error(format!("Could not retrieve album info for {}: {}", url, e)),
            }
        }

        albums
    }
}
