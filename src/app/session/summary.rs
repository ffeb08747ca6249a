//! Per-album outcomes and the end-of-session summary

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::models::Album;
use crate::app::progress::ProgressSnapshot;

/// How far an album got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlbumOutcome {
    /// Every unit of the album is on disk
    Complete,
    /// Some units were abandoned, cancelled or the folder could not be created
    Partial { downloaded: usize, total: usize },
    /// Cancelled before the album started
    NotAttempted,
}

/// Result of one album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumReport {
    pub artist: String,
    pub title: String,
    pub outcome: AlbumOutcome,
}

impl AlbumReport {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, outcome: AlbumOutcome) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            outcome,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == AlbumOutcome::Complete
    }
}

/// Final result of a download session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// One report per album, in input order
    pub albums: Vec<AlbumReport>,
    /// Whether the user cancelled the session
    pub cancelled: bool,
    /// Progress at the end of the session
    pub progress: Option<ProgressSnapshot>,
    /// Wall time of the download phase
    pub elapsed: Duration,
}

impl SessionSummary {
    /// Summary of a run that never reached the download phase
    pub fn empty(cancelled: bool) -> Self {
        Self {
            albums: Vec::new(),
            cancelled,
            progress: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Summary of a run cancelled after `albums` were loaded but before
    /// any of them started
    pub fn not_attempted(albums: &[Album]) -> Self {
        Self {
            albums: albums
                .iter()
                .map(|album| {
                    AlbumReport::new(&album.artist, &album.title, AlbumOutcome::NotAttempted)
                })
                .collect(),
            ..Self::empty(true)
        }
    }

    pub fn complete_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, AlbumOutcome::Complete))
    }

    pub fn partial_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, AlbumOutcome::Partial { .. }))
    }

    pub fn not_attempted_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, AlbumOutcome::NotAttempted))
    }

    fn count(&self, predicate: impl Fn(&AlbumOutcome) -> bool) -> usize {
        self.albums
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }

    /// Whether every album was fully downloaded
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.albums.iter().all(AlbumReport::is_complete)
    }

    /// Total bytes received during the session
    pub fn total_bytes(&self) -> u64 {
        self.progress
            .as_ref()
            .map_or(0, |snapshot| snapshot.total_received_bytes)
    }

    /// Average rate over the whole download phase
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes() as f64 / secs
        } else {
            0.0
        }
    }

    /// One-line description of the session result
    pub fn summary(&self) -> String {
        if self.albums.is_empty() {
            return if self.cancelled {
                "Session cancelled before any download started".to_string()
            } else {
                "No albums to download".to_string()
            };
        }

        let totals = format!(
            "{} in {} ({})",
            format_bytes(self.total_bytes()),
            format_duration(self.elapsed),
            format_rate(self.average_rate())
        );

        if self.is_success() {
            format!(
                "Downloaded {} albums successfully: {}",
                self.albums.len(),
                totals
            )
        } else {
            format!(
                "{}: {} complete, {} partial, {} not attempted, {}",
                if self.cancelled {
                    "Session cancelled"
                } else {
                    "Session finished with errors"
                },
                self.complete_count(),
                self.partial_count(),
                self.not_attempted_count(),
                totals
            )
        }
    }
}

/// Formats a byte count as B, KB, MB or GB
pub fn format_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Formats a transfer rate in bytes per second
pub fn format_rate(bytes_per_second: f64) -> String {
    if bytes_per_second < 1024.0 {
        format!("{:.1} B/s", bytes_per_second)
    } else if bytes_per_second < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", bytes_per_second / 1024.0)
    } else {
        format!("{:.1} MB/s", bytes_per_second / (1024.0 * 1024.0))
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}
