//! Page metadata extraction
//!
//! [`MetadataExtractor`] is a pure function over page markup: no network, no
//! retries, no side effects. [`TralbumExtractor`] reads the JSON blob Bandcamp
//! embeds in the `data-tralbum` attribute of release pages and the release
//! grid of artist music pages.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::app::models::Album;
use crate::constants::selectors;
use crate::errors::{ExtractError, ExtractResult};

mod json;

pub use json::{artwork_url, normalize_scheme};

/// Turns page markup into album metadata and release links
pub trait MetadataExtractor: Send + Sync {
    /// Extracts the album described by a release page
    ///
    /// Tracks without a media URL are dropped, track number 0 becomes 1 and
    /// protocol-relative media URLs get an `http:` scheme.
    fn extract_album(&self, markup: &str) -> ExtractResult<Album>;

    /// Artist base URL referenced by a release or artist page, if any
    fn discography_pointer(&self, markup: &str) -> Option<String>;

    /// Whether a music page lists several releases
    fn has_release_listing(&self, markup: &str) -> bool;

    /// Absolute album/track URLs listed on a music page
    fn album_urls(&self, markup: &str, page_url: &Url) -> ExtractResult<Vec<String>>;
}

/// Extractor for Bandcamp's embedded album JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TralbumExtractor;

impl TralbumExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn selector(css: &str) -> ExtractResult<Selector> {
    Selector::parse(css).map_err(|_| ExtractError::InvalidSelector {
        selector: css.to_string(),
    })
}

fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Legacy inline script: `band_url = "https://artist.bandcamp.com"`
fn band_url_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r#"band_url\s*=\s*"([^"]+)""#)
}

/// Legacy inline script marking a music page that lists releases
fn legacy_listing_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"TralbumData.*\n.*url:.*'/music'\n")
}

impl MetadataExtractor for TralbumExtractor {
    fn extract_album(&self, markup: &str) -> ExtractResult<Album> {
        let document = Html::parse_document(markup);
        let tralbum = selector(selectors::TRALBUM_SELECTOR)?;

        let blob = document
            .select(&tralbum)
            .find_map(|element| element.value().attr("data-tralbum"))
            .ok_or(ExtractError::NoAlbumData)?;

        let parsed: json::TralbumJson = serde_json::from_str(blob)?;
        Ok(parsed.into_album())
    }

    fn discography_pointer(&self, markup: &str) -> Option<String> {
        if let Some(url) = band_url_regex()
            .and_then(|re| re.captures(markup))
            .and_then(|captures| captures.get(1))
        {
            return Some(url.as_str().trim_end_matches('/').to_string());
        }

        let document = Html::parse_document(markup);
        let band = selector(selectors::BAND_DATA_SELECTOR).ok()?;
        document
            .select(&band)
            .filter_map(|element| element.value().attr("data-band"))
            .filter_map(|blob| serde_json::from_str::<serde_json::Value>(blob).ok())
            .find_map(|value| value.get("url").and_then(|url| url.as_str()).map(str::to_string))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    fn has_release_listing(&self, markup: &str) -> bool {
        if legacy_listing_regex().is_some_and(|re| re.is_match(markup)) {
            return true;
        }
        let document = Html::parse_document(markup);
        selector(selectors::MUSIC_GRID_SELECTOR)
            .map(|grid| document.select(&grid).next().is_some())
            .unwrap_or(false)
    }

    fn album_urls(&self, markup: &str, page_url: &Url) -> ExtractResult<Vec<String>> {
        let document = Html::parse_document(markup);
        let links = selector(selectors::MUSIC_GRID_LINK_SELECTOR)?;
        let client_items = selector(selectors::CLIENT_ITEMS_SELECTOR)?;

        let mut hrefs: Vec<String> = document
            .select(&links)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect();

        // Releases past the first page are only present as JSON
        for blob in document
            .select(&client_items)
            .filter_map(|element| element.value().attr("data-client-items"))
        {
            match serde_json::from_str::<Vec<serde_json::Value>>(blob) {
                Ok(items) => hrefs.extend(items.iter().filter_map(|item| {
                    item.get("page_url")
                        .and_then(|url| url.as_str())
                        .map(str::to_string)
                })),
                Err(e) => tracing::debug!("Ignoring unparseable client items: {}", e),
            }
        }

        let mut seen = HashSet::new();
        let urls: Vec<String> = hrefs
            .iter()
            .filter_map(|href| page_url.join(href).ok())
            .filter(|url| {
                let path = url.path();
                path.contains("/album/") || path.contains("/track/")
            })
            .map(|mut url| {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            })
            .filter(|url| seen.insert(url.clone()))
            .collect();

        if urls.is_empty() {
            return Err(ExtractError::NoAlbumFound);
        }
        Ok(urls)
    }
}
