//! Application constants for Bandcamp Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Bandcamp-Fetcher/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// TCP keep-alive interval
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

/// Rate limiting and page-level retry configuration
pub mod limits {
    /// Page request rate limit (requests per second)
    pub const PAGE_RATE_LIMIT_RPS: u32 = 5;

    /// Maximum transient retries for a page request
    pub const PAGE_MAX_RETRIES: u32 = 3;

    /// Base delay for page retry backoff in milliseconds
    pub const PAGE_RETRY_BASE_DELAY_MS: u64 = 500;
}

/// Defaults for the download session settings
pub mod defaults {
    /// Total attempts allowed per unit (and per size probe)
    pub const DOWNLOAD_MAX_TRIES: u32 = 7;

    /// Cooldown before the first retry, in seconds
    pub const RETRY_COOLDOWN_SECS: f64 = 0.2;

    /// Growth factor of the cooldown between retries
    pub const RETRY_EXPONENTIAL_BASE: f64 = 4.0;

    /// Relative size difference under which an existing file is kept
    pub const ALLOWABLE_FILE_SIZE_DIFFERENCE: f64 = 0.05;

    /// Longest edge of resized cover art, in pixels
    pub const COVER_ART_MAX_SIZE: u32 = 1000;

    /// JPEG quality used when converting cover art
    pub const COVER_ART_JPEG_QUALITY: u8 = 90;

    /// Track file name template
    pub const FILENAME_FORMAT: &str = "{tracknum} {artist} - {title}.mp3";

    /// Album directory template, relative to the user's music directory
    pub const DOWNLOADS_LOCATION: &str = "{artist}/{album}";

    /// Maximum number of transfers running at the same time
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 16;

    /// Maximum number of size probes running at the same time
    pub const PROBE_CONCURRENCY: usize = 8;
}

/// Path composition constants
pub mod paths {
    /// Longest destination path accepted before the file name is shortened
    pub const MAX_PATH_LENGTH: usize = 256;

    /// Number of hex digits of the name hash kept when shortening
    pub const HASH_SUFFIX_LENGTH: usize = 8;

    /// Separator between a shortened stem and its hash
    pub const HASH_SEPARATOR: char = '~';

    /// Characters replaced by the sanitizer
    pub const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

    /// Replacement for forbidden characters
    pub const REPLACEMENT_CHAR: char = '_';
}

/// Bandcamp page structure and asset locations
pub mod bandcamp {
    /// Artwork host prefix, followed by the zero-padded art id
    pub const ARTWORK_URL_PREFIX: &str = "https://f4.bcbits.com/img/a";

    /// Artwork size/format suffix (original size JPEG)
    pub const ARTWORK_URL_SUFFIX: &str = "_10.jpg";

    /// Width art ids are zero-padded to
    pub const ARTWORK_ID_WIDTH: usize = 10;

    /// Path appended to an artist URL to reach the release listing
    pub const MUSIC_PATH: &str = "/music";

    /// Format of release dates inside the album JSON
    pub const RELEASE_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S GMT";
}

/// Page parsing CSS selectors
pub mod selectors {
    /// Element carrying the album JSON blob in its `data-tralbum` attribute
    pub const TRALBUM_SELECTOR: &str = "[data-tralbum]";

    /// Element carrying band data in its `data-band` attribute
    pub const BAND_DATA_SELECTOR: &str = "[data-band]";

    /// Release grid on an artist's music page
    pub const MUSIC_GRID_SELECTOR: &str = "#music-grid, .music-grid";

    /// Release links inside the grid
    pub const MUSIC_GRID_LINK_SELECTOR: &str = "#music-grid li a[href], .music-grid li a[href]";

    /// Grid element carrying lazily loaded releases as JSON
    pub const CLIENT_ITEMS_SELECTOR: &str = "[data-client-items]";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".part";

    /// Prefix of the per-session scratch directory
    pub const SCRATCH_DIR_PREFIX: &str = "bandcamp-fetcher-";

    /// Configuration file name looked up in the working directory
    pub const LOCAL_CONFIG_FILE: &str = "bandcamp-fetcher.toml";

    /// Application directory name under the user config directory
    pub const CONFIG_DIR_NAME: &str = "bandcamp-fetcher";

    /// Configuration file name under the application config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Progress reporting and monitoring
pub mod progress {
    use super::Duration;

    /// Minimum interval between throughput recomputations
    pub const THROUGHPUT_INTERVAL: Duration = Duration::from_millis(500);

    /// Progress bar refresh rate (Hz)
    pub const MAX_UPDATE_HZ: u8 = 10;
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

pub use files::TEMP_FILE_SUFFIX;
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use paths::MAX_PATH_LENGTH;
