//! Download session
//!
//! A [`DownloadSession`] owns every planned unit of one run and fans
//! [`RetryingFetcher`] calls out per album. Within an album all tracks
//! download concurrently; albums either run one after the other or all at
//! once depending on [`SessionConfig::download_one_album_at_a_time`]. An
//! album's cover art is always fetched (and converted) before its tracks are
//! spawned, since tagging embeds the artwork bytes. Cover art shared by
//! several albums is downloaded once; the other albums reuse its bytes.
//!
//! Every spawned task is joined before [`DownloadSession::run`] returns, also
//! after cancellation, so callers always observe a quiesced session.
//!
//! - [`config`] - session options
//! - [`registry`] - in-flight transfer registry and cancellation flag
//! - [`summary`] - per-album outcomes

pub mod config;
pub mod registry;
pub mod summary;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tempfile::TempDir;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::app::client::FileFetcher;
use crate::app::events::{EventSender, LogKind};
use crate::app::fetcher::{FetchOutcome, RetryingFetcher};
use crate::app::models::{Album, DownloadUnit, Track};
use crate::app::paths::{album_directory, artwork_file_name, fit_path, sanitize, track_file_name};
use crate::app::progress::ProgressAggregator;
use crate::app::tagging::{
    ArtworkOptions, ArtworkProcessor, ImageArtworkProcessor, LoftyTagWriter, TagWriter,
};
use crate::constants::files::SCRATCH_DIR_PREFIX;
use crate::errors::Result;

pub use config::SessionConfig;
pub use registry::{TransferHandle, TransferRegistry};
pub use summary::{AlbumOutcome, AlbumReport, SessionSummary};

/// Cover art of one album after download
struct Artwork {
    /// Whether the artwork unit ended up on disk
    ok: bool,
    /// Encoded image bytes for embedding, when requested
    bytes: Option<Arc<Vec<u8>>>,
}

/// Cover art as left by the album that downloaded it
#[derive(Debug, Clone)]
struct SharedArtwork {
    /// Index of the downloading album
    owner: usize,
    /// File extension after processing
    extension: Option<String>,
    /// Processed image, `None` if it could not be read back
    bytes: Option<Arc<Vec<u8>>>,
}

/// Download slot of one cover art URL; `None` once the download failed
type ArtworkSlot = Arc<OnceCell<Option<SharedArtwork>>>;

/// One run over a fixed set of download units
pub struct DownloadSession {
    config: SessionConfig,
    fetcher: RetryingFetcher,
    progress: Arc<ProgressAggregator>,
    registry: Arc<TransferRegistry>,
    tagger: Arc<dyn TagWriter>,
    artwork_processor: Arc<dyn ArtworkProcessor>,
    scratch: Option<TempDir>,
    artwork: Mutex<HashMap<String, ArtworkSlot>>,
    events: EventSender,
}

impl DownloadSession {
    /// Creates a session over the planned `units`
    ///
    /// A scratch directory is created when cover art has to be downloaded
    /// but not kept in the album folder; it is removed with the session.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the scratch directory cannot be created
    pub fn new(
        config: SessionConfig,
        units: Vec<DownloadUnit>,
        files: Arc<dyn FileFetcher>,
        registry: Arc<TransferRegistry>,
        events: EventSender,
    ) -> Result<Self> {
        let progress = Arc::new(ProgressAggregator::new(units, events.clone()));
        let fetcher = RetryingFetcher::new(
            files,
            progress.clone(),
            registry.clone(),
            &config,
            events.clone(),
        );

        let scratch = if config.downloads_artwork() && !config.save_cover_art_in_folder {
            Some(
                tempfile::Builder::new()
                    .prefix(SCRATCH_DIR_PREFIX)
                    .tempdir()?,
            )
        } else {
            None
        };

        Ok(Self {
            config,
            fetcher,
            progress,
            registry,
            tagger: Arc::new(LoftyTagWriter),
            artwork_processor: Arc::new(ImageArtworkProcessor),
            scratch,
            artwork: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Replaces the tag writer
    pub fn with_tag_writer(mut self, tagger: Arc<dyn TagWriter>) -> Self {
        self.tagger = tagger;
        self
    }

    /// Replaces the cover art processor
    pub fn with_artwork_processor(mut self, processor: Arc<dyn ArtworkProcessor>) -> Self {
        self.artwork_processor = processor;
        self
    }

    /// The aggregator owning this session's units
    pub fn progress(&self) -> Arc<ProgressAggregator> {
        self.progress.clone()
    }

    /// Downloads every album and waits for all tasks to finish
    pub async fn run(self, albums: Vec<Album>) -> SessionSummary {
        let started = Instant::now();
        let session = Arc::new(self);
        let albums: Vec<Arc<Album>> = albums.into_iter().map(Arc::new).collect();

        let reports = if session.config.download_one_album_at_a_time {
            session.run_sequential(albums).await
        } else {
            session.run_parallel(albums).await
        };

        SessionSummary {
            albums: reports,
            cancelled: session.registry.is_cancelled(),
            progress: Some(session.progress.snapshot()),
            elapsed: started.elapsed(),
        }
    }

    async fn run_sequential(self: &Arc<Self>, albums: Vec<Arc<Album>>) -> Vec<AlbumReport> {
        let mut reports = Vec::with_capacity(albums.len());
        for (index, album) in albums.into_iter().enumerate() {
            reports.push(self.download_album(index, album).await);
        }
        reports
    }

    async fn run_parallel(self: &Arc<Self>, albums: Vec<Arc<Album>>) -> Vec<AlbumReport> {
        let mut tasks = JoinSet::new();
        for (index, album) in albums.iter().enumerate() {
            let session = Arc::clone(self);
            let album = Arc::clone(album);
            tasks.spawn(async move { (index, session.download_album(index, album).await) });
        }

        let mut reports: Vec<Option<AlbumReport>> = vec![None; albums.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => tracing::error!("Album task failed: {}", e),
            }
        }

        reports
            .into_iter()
            .zip(&albums)
            .map(|(report, album)| {
                report.unwrap_or_else(|| {
                    AlbumReport::new(
                        &album.artist,
                        &album.title,
                        AlbumOutcome::Partial {
                            downloaded: 0,
                            total: self.unit_total(album),
                        },
                    )
                })
            })
            .collect()
    }

    /// Number of units an album contributes to the session
    fn unit_total(&self, album: &Album) -> usize {
        let artwork = usize::from(self.config.downloads_artwork() && album.has_artwork());
        artwork + album.tracks.len()
    }

    async fn download_album(self: &Arc<Self>, index: usize, album: Arc<Album>) -> AlbumReport {
        if self.registry.is_cancelled() {
            return AlbumReport::new(&album.artist, &album.title, AlbumOutcome::NotAttempted);
        }

        let total = self.unit_total(&album);
        self.events.info(format!(
            "Downloading album \"{}\" by {}",
            album.title, album.artist
        ));

        let directory = album_directory(&self.config.downloads_location, &album);
        if let Err(e) = tokio::fs::create_dir_all(&directory).await {
            self.events.error(format!(
                "An error occurred when trying to create the folder {}: {}",
                directory.display(),
                e
            ));
            return AlbumReport::new(
                &album.artist,
                &album.title,
                AlbumOutcome::Partial {
                    downloaded: 0,
                    total,
                },
            );
        }

        let mut downloaded = 0;
        let mut artwork_bytes = None;
        if self.config.downloads_artwork() && album.has_artwork() {
            let artwork = self.fetch_artwork(index, &album, &directory).await;
            if artwork.ok {
                downloaded += 1;
            }
            artwork_bytes = artwork.bytes;
        }

        let mut tasks = JoinSet::new();
        for track in &album.tracks {
            let session = Arc::clone(self);
            let album = Arc::clone(&album);
            let track = track.clone();
            let artwork = artwork_bytes.clone();
            let directory = directory.clone();
            tasks.spawn(async move {
                session
                    .download_track(&album, &track, &directory, artwork)
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) if outcome.is_success() => downloaded += 1,
                Ok(_) => {}
                Err(e) => self.events.error(format!("Track task failed: {}", e)),
            }
        }

        if downloaded == total {
            self.events.log(
                LogKind::Success,
                format!("Successfully downloaded album \"{}\"", album.title),
            );
            return AlbumReport::new(&album.artist, &album.title, AlbumOutcome::Complete);
        }

        if !self.registry.is_cancelled() {
            self.events.warning(format!(
                "Finished downloading album \"{}\". Some tracks were not downloaded",
                album.title
            ));
        }
        AlbumReport::new(
            &album.artist,
            &album.title,
            AlbumOutcome::Partial { downloaded, total },
        )
    }

    /// Provides an album's cover art, downloading each URL once per session
    ///
    /// The first album needing a URL downloads and converts it; later albums
    /// wait for that result and get a copy in their own folder when cover art
    /// is kept there.
    async fn fetch_artwork(&self, index: usize, album: &Album, directory: &Path) -> Artwork {
        let slot = self.artwork_slot(&album.artwork_url);
        let shared = slot
            .get_or_init(|| self.download_artwork(index, album, directory))
            .await
            .clone();
        let Some(shared) = shared else {
            return Artwork {
                ok: false,
                bytes: None,
            };
        };

        if shared.owner != index && self.config.save_cover_art_in_folder {
            let Some(bytes) = &shared.bytes else {
                self.events.error(format!(
                    "Cover art of \"{}\" could not be copied from another album",
                    album.title
                ));
                return Artwork {
                    ok: false,
                    bytes: None,
                };
            };
            let file_name = match &shared.extension {
                Some(extension) => format!("{}.{}", sanitize(&album.title), extension),
                None => artwork_file_name(album),
            };
            let destination = fit_path(directory, &file_name);
            if let Err(e) = tokio::fs::write(&destination, bytes.as_slice()).await {
                self.events.error(format!(
                    "Could not save cover art to {}: {}",
                    destination.display(),
                    e
                ));
                return Artwork {
                    ok: false,
                    bytes: None,
                };
            }
        }

        let bytes = if self.config.save_cover_art_in_tags {
            shared.bytes
        } else {
            None
        };
        Artwork { ok: true, bytes }
    }

    fn artwork_slot(&self, url: &str) -> ArtworkSlot {
        let mut slots = self.artwork.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(url.to_string()).or_default().clone()
    }

    /// Downloads and converts cover art for the album at `index`
    async fn download_artwork(
        &self,
        index: usize,
        album: &Album,
        directory: &Path,
    ) -> Option<SharedArtwork> {
        let file_name = artwork_file_name(album);
        let destination = match (&self.scratch, self.config.save_cover_art_in_folder) {
            (Some(scratch), false) => fit_path(scratch.path(), &format!("{}-{}", index, file_name)),
            _ => fit_path(directory, &file_name),
        };

        let label = format!("cover art of \"{}\"", album.title);
        let outcome = self
            .fetcher
            .fetch(&album.artwork_url, &destination, &label)
            .await;
        if !outcome.is_success() {
            return None;
        }

        let path = if outcome.transferred() {
            self.process_artwork(destination).await
        } else {
            destination
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(e) => {
                self.events.warning(format!(
                    "Cover art not readable at {}: {}",
                    path.display(),
                    e
                ));
                None
            }
        };

        if !self.config.save_cover_art_in_folder {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::debug!("Could not remove {}: {}", path.display(), e);
            }
        }

        Some(SharedArtwork {
            owner: index,
            extension: path
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_string),
            bytes,
        })
    }

    /// Converts and resizes freshly downloaded artwork; the original path on failure
    async fn process_artwork(&self, path: PathBuf) -> PathBuf {
        let options = ArtworkOptions {
            convert_to_jpeg: self.config.convert_cover_art_to_jpg,
            max_size: self
                .config
                .resize_cover_art
                .then_some(self.config.cover_art_max_size),
        };
        if options.is_noop() {
            return path;
        }

        let processor = self.artwork_processor.clone();
        let source = path.clone();
        match tokio::task::spawn_blocking(move || processor.process(&source, options)).await {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                self.events
                    .warning(format!("Could not process cover art {}: {}", path.display(), e));
                path
            }
            Err(e) => {
                self.events.warning(format!("Cover art processing failed: {}", e));
                path
            }
        }
    }

    async fn download_track(
        &self,
        album: &Arc<Album>,
        track: &Track,
        directory: &Path,
        artwork: Option<Arc<Vec<u8>>>,
    ) -> FetchOutcome {
        let file_name = track_file_name(&self.config.filename_format, album, track);
        let destination = fit_path(directory, &file_name);

        let outcome = self
            .fetcher
            .fetch(&track.mp3_url, &destination, &track.title)
            .await;

        if outcome.transferred() && (self.config.tag_tracks || artwork.is_some()) {
            self.tag_track(destination, album, track, artwork).await;
        }
        outcome
    }

    /// Writes tags in a blocking task; failures only warn
    async fn tag_track(
        &self,
        path: PathBuf,
        album: &Arc<Album>,
        track: &Track,
        artwork: Option<Arc<Vec<u8>>>,
    ) {
        let tagger = self.tagger.clone();
        let album = Arc::clone(album);
        let track_owned = track.clone();
        let write_metadata = self.config.tag_tracks;
        let tagged_path = path.clone();

        let result = tokio::task::spawn_blocking(move || {
            tagger.write_tags(
                &tagged_path,
                &album,
                &track_owned,
                artwork.as_deref().map(Vec::as_slice),
                write_metadata,
            )
        })
        .await;

        match result {
            Ok(Ok(())) => self
                .events
                .verbose(format!("Tags saved for \"{}\"", track.title)),
            Ok(Err(e)) => self.events.warning(format!(
                "Could not save tags for {}: {}",
                path.display(),
                e
            )),
            Err(e) => self
                .events
                .warning(format!("Tagging task for \"{}\" failed: {}", track.title, e)),
        }
    }
}
