//! Download orchestration
//!
//! The [`Coordinator`] is the single controlling procedure of a run. It
//! sequences the stages explicitly, each stage's output feeding the next:
//!
//! 1. parse the newline-delimited input into seed URLs
//! 2. expand seeds into album URLs ([`DiscographyResolver`]) when requested
//! 3. load album metadata ([`AlbumLoader`])
//! 4. plan and probe the download units ([`DownloadPlanner`])
//! 5. download everything ([`DownloadSession`])
//!
//! Every stage observes the same [`TransferRegistry`], so one cancellation
//! request (Ctrl-C, see [`signals`]) winds down whichever stage is running.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bandcamp_fetcher::app::{Collaborators, Coordinator, EventSender, SessionConfig, WebClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(WebClient::new()?);
//! let coordinator = Coordinator::new(
//!     SessionConfig::default(),
//!     Collaborators::web(client),
//!     EventSender::discard(),
//! );
//!
//! let summary = coordinator
//!     .run("https://artist.bandcamp.com/album/first-light")
//!     .await?;
//! println!("{}", summary.summary());
//! # Ok(())
//! # }
//! ```

pub mod signals;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::albums::AlbumLoader;
use crate::app::client::{FileFetcher, PageFetcher, SizeProber, WebClient};
use crate::app::discography::{deduplicate, DiscographyResolver};
use crate::app::events::{EventSender, SessionEvent};
use crate::app::extractor::{MetadataExtractor, TralbumExtractor};
use crate::app::planner::DownloadPlanner;
use crate::app::session::{DownloadSession, SessionConfig, SessionSummary, TransferRegistry};
use crate::app::tagging::{ArtworkProcessor, ImageArtworkProcessor, LoftyTagWriter, TagWriter};
use crate::errors::{AppError, Result};

pub use signals::SignalHandler;

/// External collaborators of the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub pages: Arc<dyn PageFetcher>,
    pub prober: Arc<dyn SizeProber>,
    pub files: Arc<dyn FileFetcher>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub tagger: Arc<dyn TagWriter>,
    pub artwork_processor: Arc<dyn ArtworkProcessor>,
}

impl Collaborators {
    /// Network access through `client`, Bandcamp page parsing, lofty tags
    /// and image-based cover art processing
    pub fn web(client: Arc<WebClient>) -> Self {
        Self {
            pages: client.clone(),
            prober: client.clone(),
            files: client,
            extractor: Arc::new(TralbumExtractor::new()),
            tagger: Arc::new(LoftyTagWriter),
            artwork_processor: Arc::new(ImageArtworkProcessor),
        }
    }
}

/// Runs the whole pipeline for one batch of input URLs
pub struct Coordinator {
    config: SessionConfig,
    collaborators: Collaborators,
    registry: Arc<TransferRegistry>,
    events: EventSender,
}

impl Coordinator {
    pub fn new(config: SessionConfig, collaborators: Collaborators, events: EventSender) -> Self {
        Self {
            config,
            collaborators,
            registry: TransferRegistry::new(),
            events,
        }
    }

    /// Registry whose [`TransferRegistry::cancel`] stops this run
    pub fn cancel_handle(&self) -> Arc<TransferRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Downloads everything referenced by the newline-delimited `input`
    ///
    /// Signals `ControlStateChanged` around the run and requests a
    /// notification sound at the end, also when the run was cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration, an input without any URL
    /// or when the session scratch directory cannot be created. Failures of
    /// individual pages or files are reported through events instead.
    pub async fn run(&self, input: &str) -> Result<SessionSummary> {
        self.config.validate()?;

        let seeds = parse_urls(input);
        if seeds.is_empty() {
            return Err(AppError::Input("no URL to download".to_string()));
        }
        info!("Starting run with {} input URLs", seeds.len());

        self.events
            .send(SessionEvent::ControlStateChanged { downloading: true });

        let result = self.run_stages(&seeds).await;

        if self.registry.is_cancelled() {
            self.events.info("Downloads cancelled by user");
        }
        self.events
            .send(SessionEvent::ControlStateChanged { downloading: false });
        self.events.send(SessionEvent::PlaySound);

        if let Ok(summary) = &result {
            info!("{}", summary.summary());
        }
        result
    }

    async fn run_stages(&self, seeds: &[String]) -> Result<SessionSummary> {
        let cancel = self.registry.session_token();
        let parts = &self.collaborators;

        let album_urls = if self.config.download_artist_discography {
            DiscographyResolver::new(
                parts.pages.clone(),
                parts.extractor.clone(),
                cancel.clone(),
                self.events.clone(),
            )
            .resolve(seeds)
            .await
        } else {
            deduplicate(seeds.to_vec())
        };
        if self.registry.is_cancelled() {
            return Ok(SessionSummary::empty(true));
        }
        debug!("{} album URLs to load", album_urls.len());

        let albums = AlbumLoader::new(
            parts.pages.clone(),
            parts.extractor.clone(),
            cancel.clone(),
            self.events.clone(),
        )
        .load(&album_urls)
        .await;
        if self.registry.is_cancelled() {
            return Ok(SessionSummary::empty(true));
        }
        if albums.is_empty() {
            self.events.warning("No album could be retrieved");
            return Ok(SessionSummary::empty(false));
        }

        let units = DownloadPlanner::new(
            parts.prober.clone(),
            cancel,
            &self.config,
            self.events.clone(),
        )
        .plan(&albums, self.config.downloads_artwork())
        .await;
        if self.registry.is_cancelled() {
            return Ok(SessionSummary::not_attempted(&albums));
        }

        let session = DownloadSession::new(
            self.config.clone(),
            units,
            parts.files.clone(),
            self.registry.clone(),
            self.events.clone(),
        )?
        .with_tag_writer(parts.tagger.clone())
        .with_artwork_processor(parts.artwork_processor.clone());

        let progress = session.progress();
        let snapshot = progress.snapshot();
        self.events.send(SessionEvent::ProgressStarted {
            total_units: snapshot.total_unit_count,
            total_expected_bytes: snapshot.total_expected_bytes,
            mode: progress.mode(),
        });

        Ok(session.run(albums).await)
    }
}

/// Splits newline-delimited input into unique, trimmed, non-empty URLs
///
/// The first occurrence of each URL keeps its position.
pub fn parse_urls(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}
