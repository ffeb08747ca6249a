//! Artist discography expansion
//!
//! Turns seed URLs (artist, album or track pages) into the set of album URLs
//! to download. Failures are reported on the event channel and never abort
//! the batch.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::app::client::PageFetcher;
use crate::app::events::EventSender;
use crate::app::extractor::MetadataExtractor;
use crate::constants::bandcamp::MUSIC_PATH;
use crate::errors::DownloadError;

/// Expands seed URLs into every album URL of their artists
pub struct DiscographyResolver {
    pages: Arc<dyn PageFetcher>,
    extractor: Arc<dyn MetadataExtractor>,
    cancel: CancellationToken,
    events: EventSender,
}

impl DiscographyResolver {
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

    /// Resolves seeds into a deduplicated list of album URLs
    ///
    /// A seed whose page has no discography pointer, or whose artist has a
    /// single release, is forwarded unchanged. Returns an empty list as soon
    /// as cancellation is observed.
    pub async fn resolve(&self, seeds: &[String]) -> Vec<String> {
        let mut album_urls = Vec::new();

        for seed in seeds {
            self.events
                .info(format!("Retrieving artist discography from {}", seed));

            if self.cancel.is_cancelled() {
                return Vec::new();
            }
            let page = match self.pages.fetch_page(seed, &self.cancel).await {
                Ok(page) => page,
                Err(DownloadError::Cancelled) => return Vec::new(),
                Err(e) => {
                    self.events
                        .error(format!("Could not retrieve data for {}: {}", seed, e));
                    continue;
                }
            };

            let Some(artist_url) = self.extractor.discography_pointer(&page) else {
                self.events.warning(format!(
                    "No discography could be found on {}. Downloading it as a single release",
                    seed
                ));
                album_urls.push(seed.clone());
                continue;
            };
            let listing_url = format!("{}{}", artist_url, MUSIC_PATH);

            if self.cancel.is_cancelled() {
                return Vec::new();
            }
            let listing = match self.pages.fetch_page(&listing_url, &self.cancel).await {
                Ok(listing) => listing,
                Err(DownloadError::Cancelled) => return Vec::new(),
                Err(e) => {
                    self.events
                        .error(format!("Could not retrieve data for {}: {}", listing_url, e));
                    continue;
                }
            };

            if !self.extractor.has_release_listing(&listing) {
                self.events.verbose(format!(
                    "{} lists a single release, keeping {}",
                    listing_url, seed
                ));
                album_urls.push(seed.clone());
                continue;
            }

            let found = Url::parse(&listing_url)
                .map_err(|e| e.to_string())
                .and_then(|base| {
                    self.extractor
                        .album_urls(&listing, &base)
                        .map_err(|e| e.to_string())
                });
            match found {
                Ok(urls) => {
                    self.events.verbose(format!(
                        "Found {} releases on {}",
                        urls.len(),
                        listing_url
                    ));
                    album_urls.extend(urls);
                }
                Err(e) => self.events.error(format!(
                    "Could not retrieve album URLs from {}: {}",
                    listing_url, e
                )),
            }
        }

        deduplicate(album_urls)
    }
}

/// Removes duplicates, keeping the first occurrence of each URL
pub fn deduplicate(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.into_iter().filter(|url| seen.insert(url.clone())).collect()
}
