//! Prelude module for Bandcamp Fetcher Library
//!
//! Re-exports the items needed to embed the downloader with a single
//! `use bandcamp_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bandcamp_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Arc::new(WebClient::new()?);
//!     let coordinator = Coordinator::new(
//!         SessionConfig::default(),
//!         Collaborators::web(client),
//!         EventSender::discard(),
//!     );
//!     let summary = coordinator.run("https://artist.bandcamp.com/album/x").await?;
//!     println!("{}", summary.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Orchestration
pub use crate::app::{
    Collaborators, Coordinator, SessionConfig, SessionSummary, SignalHandler, TransferRegistry,
};

// Events and progress
pub use crate::app::{
    EventReceiver, EventSender, LogKind, ProgressMode, ProgressSnapshot, SessionEvent,
};

// Data types and collaborators
pub use crate::app::{
    Album, ClientConfig, MetadataExtractor, Track, TralbumExtractor, WebClient,
};

// Commonly used constants
pub use crate::constants::{MAX_PATH_LENGTH, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
