//! Core download pipeline for Bandcamp Fetcher
//!
//! Stages, in the order the [`Coordinator`] runs them:
//!
//! - [`discography`] - expands seed URLs into album URLs
//! - [`albums`] - fetches and parses album pages
//! - [`planner`] - flattens albums into download units and probes sizes
//! - [`session`] - downloads units per album with retries and cancellation
//!
//! Supporting modules: [`client`] (HTTP), [`extractor`] (page parsing),
//! [`fetcher`] (per-unit retry loop), [`progress`], [`tagging`], [`paths`],
//! [`retry`] and [`events`], the outbound channel every stage reports on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bandcamp_fetcher::app::{Collaborators, Coordinator, EventSender, SessionConfig, WebClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (events, mut rx) = EventSender::channel();
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", event);
//!     }
//! });
//!
//! let config = SessionConfig::default().with_discography(true);
//! let coordinator = Coordinator::new(config, Collaborators::web(Arc::new(WebClient::new()?)), events);
//! coordinator.run("https://artist.bandcamp.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod albums;
pub mod client;
pub mod coordinator;
pub mod discography;
pub mod events;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod paths;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod session;
pub mod tagging;

// Re-export main public API
pub use albums::AlbumLoader;
pub use client::{
    ClientConfig, FileFetcher, PageFetcher, PageRetry, ProbeMethod, SizeProber, WebClient,
};
pub use coordinator::{parse_urls, Collaborators, Coordinator, SignalHandler};
pub use discography::DiscographyResolver;
pub use events::{EventReceiver, EventSender, LogKind, SessionEvent};
pub use extractor::{MetadataExtractor, TralbumExtractor};
pub use fetcher::{FetchOutcome, RetryingFetcher};
pub use models::{Album, DownloadUnit, Track, UnitKind};
pub use planner::DownloadPlanner;
pub use progress::{ProgressAggregator, ProgressMode, ProgressSnapshot};
pub use retry::CooldownPolicy;
pub use session::{
    AlbumOutcome, AlbumReport, DownloadSession, SessionConfig, SessionSummary, TransferRegistry,
};
pub use tagging::{ArtworkOptions, ArtworkProcessor, ImageArtworkProcessor, LoftyTagWriter, TagWriter};
