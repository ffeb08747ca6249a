//! Album JSON blob embedded in release pages
//!
//! Only the fields the downloader uses are modelled; everything else in the
//! blob is ignored.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::app::models::{Album, Track};
use crate::constants::bandcamp;

#[derive(Debug, Deserialize)]
pub(super) struct TralbumJson {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    art_id: Option<ArtId>,
    #[serde(default)]
    album_release_date: Option<String>,
    #[serde(default)]
    trackinfo: Vec<TrackJson>,
    #[serde(default)]
    current: CurrentJson,
}

/// Art id, serialised as a number on most pages and as a string on some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtId {
    Number(u64),
    Text(String),
}

impl ArtId {
    fn value(&self) -> Option<u64> {
        match self {
            ArtId::Number(id) => Some(*id),
            ArtId::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CurrentJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackJson {
    #[serde(default)]
    file: Option<FileJson>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    track_num: Option<u32>,
    #[serde(default)]
    lyrics: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileJson {
    #[serde(rename = "mp3-128", default)]
    mp3_128: Option<String>,
}

impl TralbumJson {
    /// Converts the blob into an album, dropping tracks without audio
    pub(super) fn into_album(self) -> Album {
        let release_date = self
            .album_release_date
            .as_deref()
            .or(self.current.release_date.as_deref())
            .and_then(parse_release_date)
            .unwrap_or_default();

        let artwork_url = self
            .art_id
            .as_ref()
            .and_then(ArtId::value)
            .map(artwork_url)
            .unwrap_or_default();

        let tracks = self
            .trackinfo
            .into_iter()
            .filter_map(TrackJson::into_track)
            .collect();

        Album {
            artist: self.artist.unwrap_or_default(),
            title: self.current.title.unwrap_or_default(),
            artwork_url,
            release_date,
            tracks,
        }
    }
}

impl TrackJson {
    fn into_track(self) -> Option<Track> {
        let url = self.file.and_then(|file| file.mp3_128)?;
        if url.trim().is_empty() {
            return None;
        }

        Some(Track {
            title: self.title.unwrap_or_default(),
            // Single-track pages report no number
            number: self.track_num.filter(|&n| n > 0).unwrap_or(1),
            mp3_url: normalize_scheme(&url),
            lyrics: self.lyrics.filter(|lyrics| !lyrics.trim().is_empty()),
        })
    }
}

/// Adds an explicit `http:` scheme to protocol-relative URLs
pub fn normalize_scheme(url: &str) -> String {
    if url.starts_with("//") {
        format!("http:{}", url)
    } else {
        url.to_string()
    }
}

/// Full-size cover art URL for an art id
pub fn artwork_url(art_id: u64) -> String {
    format!(
        "{}{:0width$}{}",
        bandcamp::ARTWORK_URL_PREFIX,
        art_id,
        bandcamp::ARTWORK_URL_SUFFIX,
        width = bandcamp::ARTWORK_ID_WIDTH
    )
}

fn parse_release_date(value: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(value.trim(), bandcamp::RELEASE_DATE_FORMAT)
        .map(|datetime| datetime.date())
        .ok()
}
