//! Download session configuration

use serde::{Deserialize, Serialize};

use crate::app::retry::CooldownPolicy;
use crate::constants::defaults;
use crate::errors::{ConfigError, ConfigResult};

/// Every option that shapes a download run
///
/// Passed explicitly to the coordinator and session; nothing reads
/// configuration from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Expand every seed URL into its artist's full discography
    pub download_artist_discography: bool,
    /// Download albums one after the other instead of all at once
    pub download_one_album_at_a_time: bool,
    /// Probe sizes before downloading (enables byte-based progress)
    pub retrieve_file_sizes: bool,
    /// Attempts per unit and per size probe
    pub download_max_tries: u32,
    /// Cooldown before the first retry, in seconds
    pub download_retry_cooldown_secs: f64,
    /// Cooldown growth factor
    pub download_retry_exponential_base: f64,
    /// Relative size tolerance for keeping an existing file
    pub allowable_file_size_difference: f64,
    /// Embed cover art in track tags
    pub save_cover_art_in_tags: bool,
    /// Keep the cover art file in the album folder
    pub save_cover_art_in_folder: bool,
    /// Write album/track metadata into the tags
    pub tag_tracks: bool,
    /// Re-encode cover art as JPEG
    pub convert_cover_art_to_jpg: bool,
    /// Shrink cover art to `cover_art_max_size`
    pub resize_cover_art: bool,
    /// Longest edge of resized cover art, in pixels
    pub cover_art_max_size: u32,
    /// Track file name template
    pub filename_format: String,
    /// Album directory template
    pub downloads_location: String,
    /// Maximum number of transfers at once
    pub max_concurrent_downloads: usize,
    /// Maximum number of size probes at once
    pub probe_concurrency: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            download_artist_discography: false,
            download_one_album_at_a_time: false,
            retrieve_file_sizes: true,
            download_max_tries: defaults::DOWNLOAD_MAX_TRIES,
            download_retry_cooldown_secs: defaults::RETRY_COOLDOWN_SECS,
            download_retry_exponential_base: defaults::RETRY_EXPONENTIAL_BASE,
            allowable_file_size_difference: defaults::ALLOWABLE_FILE_SIZE_DIFFERENCE,
            save_cover_art_in_tags: true,
            save_cover_art_in_folder: false,
            tag_tracks: true,
            convert_cover_art_to_jpg: true,
            resize_cover_art: true,
            cover_art_max_size: defaults::COVER_ART_MAX_SIZE,
            filename_format: defaults::FILENAME_FORMAT.to_string(),
            downloads_location: default_downloads_location(),
            max_concurrent_downloads: defaults::MAX_CONCURRENT_DOWNLOADS,
            probe_concurrency: defaults::PROBE_CONCURRENCY,
        }
    }
}

/// `<music dir>/{artist}/{album}`, falling back to the working directory
pub fn default_downloads_location() -> String {
    dirs::audio_dir()
        .or_else(dirs::download_dir)
        .map(|dir| dir.join(defaults::DOWNLOADS_LOCATION))
        .unwrap_or_else(|| defaults::DOWNLOADS_LOCATION.into())
        .to_string_lossy()
        .into_owned()
}

impl SessionConfig {
    /// Cooldown schedule shared by probes and transfers
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy::new(
            self.download_retry_cooldown_secs,
            self.download_retry_exponential_base,
        )
    }

    /// Whether cover art has to be downloaded at all
    pub fn downloads_artwork(&self) -> bool {
        self.save_cover_art_in_tags || self.save_cover_art_in_folder
    }

    /// Validates the configuration, collecting every problem
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` listing each invalid field
    pub fn validate(&self) -> ConfigResult<()> {
        let mut problems = Vec::new();

        if self.download_max_tries == 0 {
            problems.push("download_max_tries must be at least 1".to_string());
        }
        if !non_negative(self.download_retry_cooldown_secs) {
            problems.push("download_retry_cooldown_secs must not be negative".to_string());
        }
        if !non_negative(self.download_retry_exponential_base) {
            problems.push("download_retry_exponential_base must not be negative".to_string());
        }
        if !non_negative(self.allowable_file_size_difference) {
            problems.push("allowable_file_size_difference must not be negative".to_string());
        }
        if self.resize_cover_art && self.cover_art_max_size == 0 {
            problems.push("cover_art_max_size must be positive when resizing".to_string());
        }
        if self.filename_format.trim().is_empty() {
            problems.push("filename_format must not be empty".to_string());
        }
        if self.downloads_location.trim().is_empty() {
            problems.push("downloads_location must not be empty".to_string());
        }
        if self.max_concurrent_downloads == 0 {
            problems.push("max_concurrent_downloads must be at least 1".to_string());
        }
        if self.probe_concurrency == 0 {
            problems.push("probe_concurrency must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }

    pub fn with_discography(mut self, enabled: bool) -> Self {
        self.download_artist_discography = enabled;
        self
    }

    pub fn with_one_album_at_a_time(mut self, enabled: bool) -> Self {
        self.download_one_album_at_a_time = enabled;
        self
    }

    pub fn with_file_sizes(mut self, enabled: bool) -> Self {
        self.retrieve_file_sizes = enabled;
        self
    }

    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.download_max_tries = tries;
        self
    }

    pub fn with_cooldown(mut self, cooldown_secs: f64, exponential_base: f64) -> Self {
        self.download_retry_cooldown_secs = cooldown_secs;
        self.download_retry_exponential_base = exponential_base;
        self
    }

    pub fn with_downloads_location(mut self, location: impl Into<String>) -> Self {
        self.downloads_location = location.into();
        self
    }

    pub fn with_filename_format(mut self, format: impl Into<String>) -> Self {
        self.filename_format = format.into();
        self
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
