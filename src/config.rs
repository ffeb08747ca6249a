//! Configuration management for Bandcamp Fetcher
//!
//! Settings live in a TOML file with one section per concern. The file is
//! optional: every field has a default, and a partial file only overrides
//! what it names. Command-line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::session::config::default_downloads_location;
use crate::app::{ClientConfig, PageRetry, SessionConfig};
use crate::constants::{defaults, files, http, limits, logging};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// What to download and how persistently
    pub download: DownloadConfigToml,
    /// Cover art handling
    pub cover_art: CoverArtConfigToml,
    /// Folder and file naming
    pub naming: NamingConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly download settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Expand every URL into the artist's discography
    pub discography: bool,
    /// Download albums one after the other
    pub one_album_at_a_time: bool,
    /// Probe file sizes before downloading
    pub retrieve_file_sizes: bool,
    /// Attempts per file
    pub max_tries: u32,
    /// Cooldown before the first retry, in seconds
    pub retry_cooldown_secs: f64,
    /// Cooldown growth factor
    pub retry_exponential_base: f64,
    /// Relative size difference under which an existing file is kept
    pub allowable_file_size_difference: f64,
    /// Write album and track metadata into the files
    pub tag_tracks: bool,
    /// Maximum simultaneous transfers
    pub max_concurrent_downloads: usize,
    /// Maximum simultaneous size probes
    pub probe_concurrency: usize,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            discography: false,
            one_album_at_a_time: false,
            retrieve_file_sizes: true,
            max_tries: defaults::DOWNLOAD_MAX_TRIES,
            retry_cooldown_secs: defaults::RETRY_COOLDOWN_SECS,
            retry_exponential_base: defaults::RETRY_EXPONENTIAL_BASE,
            allowable_file_size_difference: defaults::ALLOWABLE_FILE_SIZE_DIFFERENCE,
            tag_tracks: true,
            max_concurrent_downloads: defaults::MAX_CONCURRENT_DOWNLOADS,
            probe_concurrency: defaults::PROBE_CONCURRENCY,
        }
    }
}

/// TOML-friendly cover art settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverArtConfigToml {
    /// Embed the cover in every track
    pub save_in_tags: bool,
    /// Keep the cover file in the album folder
    pub save_in_folder: bool,
    /// Re-encode as JPEG
    pub convert_to_jpg: bool,
    /// Shrink large covers
    pub resize: bool,
    /// Longest edge after resizing, in pixels
    pub max_size: u32,
}

impl Default for CoverArtConfigToml {
    fn default() -> Self {
        Self {
            save_in_tags: true,
            save_in_folder: false,
            convert_to_jpg: true,
            resize: true,
            max_size: defaults::COVER_ART_MAX_SIZE,
        }
    }
}

/// TOML-friendly naming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfigToml {
    /// Album folder template; empty means `<music dir>/{artist}/{album}`
    pub downloads_location: String,
    /// Track file name template
    pub filename_format: String,
}

impl Default for NamingConfigToml {
    fn default() -> Self {
        Self {
            downloads_location: String::new(),
            filename_format: defaults::FILENAME_FORMAT.to_string(),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Page requests per second
    pub rate_limit_rps: u32,
    /// Retries of a page request after transient failures
    pub page_max_retries: u32,
    /// Delay before the first page retry in milliseconds, doubled per retry
    pub page_retry_base_delay_ms: u64,
    /// User agent header
    pub user_agent: String,
    /// Honour system proxy settings
    pub use_system_proxy: bool,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(http::TCP_KEEPALIVE.as_secs()),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::PAGE_RATE_LIMIT_RPS,
            page_max_retries: limits::PAGE_MAX_RETRIES,
            page_retry_base_delay_ms: limits::PAGE_RETRY_BASE_DELAY_MS,
            user_agent: http::USER_AGENT.to_string(),
            use_system_proxy: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
    /// Colour log lines on terminals
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (SessionConfig, ClientConfig) {
        (self.session_config(), self.client.to_runtime_config())
    }

    fn session_config(&self) -> SessionConfig {
        let downloads_location = if self.naming.downloads_location.trim().is_empty() {
            default_downloads_location()
        } else {
            self.naming.downloads_location.clone()
        };

        SessionConfig {
            download_artist_discography: self.download.discography,
            download_one_album_at_a_time: self.download.one_album_at_a_time,
            retrieve_file_sizes: self.download.retrieve_file_sizes,
            download_max_tries: self.download.max_tries,
            download_retry_cooldown_secs: self.download.retry_cooldown_secs,
            download_retry_exponential_base: self.download.retry_exponential_base,
            allowable_file_size_difference: self.download.allowable_file_size_difference,
            save_cover_art_in_tags: self.cover_art.save_in_tags,
            save_cover_art_in_folder: self.cover_art.save_in_folder,
            tag_tracks: self.download.tag_tracks,
            convert_cover_art_to_jpg: self.cover_art.convert_to_jpg,
            resize_cover_art: self.cover_art.resize,
            cover_art_max_size: self.cover_art.max_size,
            filename_format: self.naming.filename_format.clone(),
            downloads_location,
            max_concurrent_downloads: self.download.max_concurrent_downloads,
            probe_concurrency: self.download.probe_concurrency,
        }
    }

    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, else the first standard location found)
    ///
    /// CLI overrides are applied by the caller.
    ///
    /// # Errors
    ///
    /// Fails when an explicitly given file does not exist or any file
    /// cannot be read or parsed
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file()?,
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Writes the commented default configuration
    ///
    /// Uses the user config location when `path` is `None`. An existing file
    /// is only replaced when `force` is set.
    pub async fn write_default_config(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ConfigError::Io)?;
            }
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(ConfigError::Io)?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::Serialize)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Result<Option<PathBuf>> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
        if let Ok(user_path) = Self::get_default_config_path() {
            search_paths.push(user_path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir
            .join(files::CONFIG_DIR_NAME)
            .join(files::CONFIG_FILE_NAME))
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidToml)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Bandcamp Fetcher Configuration
# Every setting is optional; remove a line to fall back to its default.

[download]
# Download every release of the artist behind each URL
discography = false
# Download albums one after the other (tracks of an album still run in parallel)
one_album_at_a_time = false
# Probe file sizes first for byte-accurate progress
retrieve_file_sizes = true
# Attempts per file
max_tries = {max_tries}
# Cooldown before retry n is retry_cooldown_secs * retry_exponential_base^(n-1)
retry_cooldown_secs = {cooldown:?}
retry_exponential_base = {base:?}
# Keep an existing file whose size differs from the expected size by at most this ratio
allowable_file_size_difference = {tolerance:?}
# Write album and track metadata into the MP3 tags
tag_tracks = true
max_concurrent_downloads = {max_downloads}
probe_concurrency = {probe_concurrency}

[cover_art]
save_in_tags = true
save_in_folder = false
convert_to_jpg = true
resize = true
max_size = {max_size}

[naming]
# Placeholders: {{artist}} {{album}} {{year}} {{month}} {{day}}
# Leave empty for <music dir>/{{artist}}/{{album}}
downloads_location = ""
# Placeholders: {{artist}} {{album}} {{title}} {{tracknum}} {{year}} {{month}} {{day}}
filename_format = "{filename_format}"

[client]
tcp_keepalive_secs = {keepalive}
tcp_nodelay = true
pool_idle_timeout_secs = {pool_idle}
pool_max_per_host = {pool_max}
request_timeout_secs = {request_timeout}
connect_timeout_secs = {connect_timeout}
# Page requests per second
rate_limit_rps = {rps}
# Retries of a failing page request, waiting {page_delay} ms then doubling
page_max_retries = {page_retries}
page_retry_base_delay_ms = {page_delay}
user_agent = "{user_agent}"
use_system_proxy = true

[logging]
level = "{level}"  # error, warn, info, debug, trace
colored_output = true
"#,
            max_tries = defaults::DOWNLOAD_MAX_TRIES,
            cooldown = defaults::RETRY_COOLDOWN_SECS,
            base = defaults::RETRY_EXPONENTIAL_BASE,
            tolerance = defaults::ALLOWABLE_FILE_SIZE_DIFFERENCE,
            max_downloads = defaults::MAX_CONCURRENT_DOWNLOADS,
            probe_concurrency = defaults::PROBE_CONCURRENCY,
            max_size = defaults::COVER_ART_MAX_SIZE,
            filename_format = defaults::FILENAME_FORMAT,
            pool_idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max = http::POOL_MAX_PER_HOST,
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            rps = limits::PAGE_RATE_LIMIT_RPS,
            keepalive = http::TCP_KEEPALIVE.as_secs(),
            page_retries = limits::PAGE_MAX_RETRIES,
            page_delay = limits::PAGE_RETRY_BASE_DELAY_MS,
            user_agent = http::USER_AGENT,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            page_retry: PageRetry {
                max_retries: self.page_max_retries,
                base_delay: Duration::from_millis(self.page_retry_base_delay_ms),
            },
            user_agent: self.user_agent.clone(),
            use_system_proxy: self.use_system_proxy,
        }
    }
}
