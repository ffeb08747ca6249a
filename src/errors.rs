//! Error types for Bandcamp Fetcher
//!
//! Errors are grouped by concern (network transfers, page extraction, tagging,
//! configuration) and folded into [`AppError`] at the application boundary.
//! Inside the download pipeline none of these terminate a run: they are caught
//! at the unit or album boundary and turned into log entries and outcomes.

use std::path::PathBuf;
use thiserror::Error;

/// Download and HTTP client errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Probe response carried no usable Content-Length header
    #[error("No content length reported for {url}")]
    MissingContentLength { url: String },

    /// Transfer aborted because the session was cancelled
    #[error("Transfer cancelled")]
    Cancelled,

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for request")]
    MaxRetriesExceeded { max_retries: u32 },

    /// Invalid client configuration (rate limit, builder failure)
    #[error("Invalid client configuration: {0}")]
    InvalidClientConfig(String),
}

impl DownloadError {
    /// Whether the failure was caused by cancellation rather than the network
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

/// Errors raised while turning page markup into album metadata
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The page does not carry an album data blob
    #[error("No parseable album data found on page")]
    NoAlbumData,

    /// The release listing page references no albums
    #[error("No album found on release listing page")]
    NoAlbumFound,

    /// Album data blob is not valid JSON
    #[error("Album data is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A CSS selector could not be compiled
    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },
}

/// Tag writing and artwork processing errors
#[derive(Error, Debug)]
pub enum TagError {
    /// Tag library failure
    #[error("Tag error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),

    /// Image decoding or encoding failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while reading or writing the file
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File format has no writable tag
    #[error("No writable tag available for {path}")]
    NoWritableTag { path: PathBuf },

    /// Blocking task panicked or was cancelled
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid TOML syntax
    #[error("Invalid TOML syntax")]
    InvalidToml(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Could not serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Validation failures collected from a runtime configuration
    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// I/O error reading or writing configuration
    #[error("Configuration file I/O error")]
    Io(#[from] std::io::Error),
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download errors
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Extraction errors
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Tagging errors
    #[error(transparent)]
    Tag(#[from] TagError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command-line input problems
    #[error("Invalid input: {0}")]
    Input(String),

    /// Generic errors with context
    #[error("{message}")]
    Generic { message: String },
}

impl AppError {
    /// Creates a generic error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Returns true if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Download(DownloadError::Http(_)) => true,
            AppError::Download(DownloadError::RateLimitExceeded) => true,
            AppError::Download(DownloadError::ServerOverloaded) => true,
            AppError::Download(DownloadError::MissingContentLength { .. }) => true,
            AppError::Download(DownloadError::ServerError { status }) => *status >= 500,
            AppError::Download(DownloadError::Io(_)) => true,
            AppError::Io(_) => true,
            _ => false,
        }
    }

    /// Returns the error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Download(_) => "download",
            AppError::Extract(_) => "extract",
            AppError::Tag(_) => "tag",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Input(_) => "input",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for download operations
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Result type alias for extraction operations
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for tagging operations
pub type TagResult<T> = std::result::Result<T, TagError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for application operations
pub type Result<T> = std::result::Result<T, AppError>;
