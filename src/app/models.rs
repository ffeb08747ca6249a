//! Data models for Bandcamp Fetcher
//!
//! Albums and tracks as extracted from release pages, and the download units
//! the planner derives from them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One release as described by its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Artist name
    pub artist: String,
    /// Album title
    pub title: String,
    /// Cover art URL, empty when the release has no artwork
    pub artwork_url: String,
    /// Release date
    pub release_date: NaiveDate,
    /// Tracks in page order; may be empty for artwork-only releases
    pub tracks: Vec<Track>,
}

impl Album {
    /// Whether the album references cover art
    pub fn has_artwork(&self) -> bool {
        !self.artwork_url.is_empty()
    }

    /// Release year
    pub fn year(&self) -> i32 {
        self.release_date.year()
    }

    /// Release month (1-12)
    pub fn month(&self) -> u32 {
        self.release_date.month()
    }

    /// Release day of month
    pub fn day(&self) -> u32 {
        self.release_date.day()
    }
}

/// One downloadable track of an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track title
    pub title: String,
    /// Track number, always at least 1
    pub number: u32,
    /// Absolute MP3 URL including scheme
    pub mp3_url: String,
    /// Lyrics when the page provides them
    pub lyrics: Option<String>,
}

/// What a download unit fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Album cover art, probed with HEAD
    Artwork,
    /// Track audio, probed with GET
    Track,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Artwork => write!(f, "artwork"),
            UnitKind::Track => write!(f, "track"),
        }
    }
}

/// One fetchable resource of a session, keyed by URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUnit {
    /// Resource URL, unique within a session
    pub url: String,
    /// Artwork or track
    pub kind: UnitKind,
    /// Bytes received so far; never decreases while the unit is active
    pub bytes_received: u64,
    /// Probed size in bytes, 0 when unknown
    pub expected_size: u64,
    /// Set once, on success
    pub downloaded: bool,
}

impl DownloadUnit {
    /// Creates a fresh unit with no progress
    pub fn new(url: impl Into<String>, kind: UnitKind, expected_size: u64) -> Self {
        Self {
            url: url.into(),
            kind,
            bytes_received: 0,
            expected_size,
            downloaded: false,
        }
    }

    /// Whether the unit's size was probed successfully
    pub fn is_sized(&self) -> bool {
        self.expected_size > 0
    }
}
