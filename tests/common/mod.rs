//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use bandcamp_fetcher::app::{
    Album, ArtworkOptions, ArtworkProcessor, Collaborators, EventReceiver, FileFetcher,
    PageFetcher, ProbeMethod, SessionEvent, SizeProber, TagWriter, Track, TralbumExtractor,
};
use bandcamp_fetcher::errors::{DownloadError, DownloadResult, TagResult};

/// Pages and files served from memory
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, u32>>,
    hanging: HashSet<String>,
    transfer_delay: Option<Duration>,
    page_delay: Option<Duration>,
    probe_delay: Option<Duration>,
    page_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
    probe_calls: Mutex<Vec<(String, ProbeMethod)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, markup: String) -> Self {
        self.pages.insert(url.to_string(), markup);
        self
    }

    pub fn file(mut self, url: &str, body: &[u8]) -> Self {
        self.files.insert(url.to_string(), body.to_vec());
        self
    }

    /// The first `count` transfers of `url` fail
    pub fn failing(self, url: &str, count: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
        self
    }

    /// Transfers of `url` block until aborted
    pub fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// Every transfer takes at least `delay`
    pub fn slow(mut self, delay: Duration) -> Self {
        self.transfer_delay = Some(delay);
        self
    }

    /// Every page takes `delay` to arrive, or until cancelled
    pub fn slow_pages(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Every size probe takes `delay`
    pub fn slow_probes(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn page_calls(&self) -> Vec<String> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetch_calls().iter().filter(|call| *call == url).count()
    }

    pub fn probe_calls(&self) -> Vec<(String, ProbeMethod)> {
        self.probe_calls.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self, url: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(url) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64> {
        if self.hanging.contains(url) {
            cancel.cancelled().await;
            return Err(DownloadError::Cancelled);
        }
        if let Some(delay) = self.transfer_delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.take_failure(url) {
            return Err(DownloadError::ServerError { status: 500 });
        }

        let body = self
            .files
            .get(url)
            .ok_or(DownloadError::ServerError { status: 404 })?;
        let half = body.len() / 2;
        on_progress(half as u64);
        tokio::task::yield_now().await;
        tokio::fs::write(destination, body).await?;
        on_progress(body.len() as u64);
        Ok(body.len() as u64)
    }
}

#[async_trait]
impl PageFetcher for FakeWeb {
    async fn fetch_page(&self, url: &str, cancel: &CancellationToken) -> DownloadResult<String> {
        self.page_calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.page_delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or(DownloadError::ServerError { status: 404 })
    }
}

#[async_trait]
impl SizeProber for FakeWeb {
    async fn probe_size(&self, url: &str, method: ProbeMethod) -> DownloadResult<u64> {
        self.probe_calls
            .lock()
            .unwrap()
            .push((url.to_string(), method));
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.files
            .get(url)
            .map(|body| body.len() as u64)
            .ok_or(DownloadError::MissingContentLength {
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl FileFetcher for FakeWeb {
    async fn fetch_file(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> DownloadResult<u64> {
        self.fetch_calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.transfer(url, destination, cancel, on_progress).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// One recorded tagging call
#[derive(Debug, Clone)]
pub struct TagCall {
    pub path: PathBuf,
    pub title: String,
    pub artwork: Option<Vec<u8>>,
    pub write_metadata: bool,
}

/// Tag writer that only records its calls
#[derive(Default)]
pub struct RecordingTagger {
    calls: Mutex<Vec<TagCall>>,
}

impl RecordingTagger {
    pub fn calls(&self) -> Vec<TagCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TagWriter for RecordingTagger {
    fn write_tags(
        &self,
        path: &Path,
        _album: &Album,
        track: &Track,
        artwork: Option<&[u8]>,
        write_metadata: bool,
    ) -> TagResult<()> {
        self.calls.lock().unwrap().push(TagCall {
            path: path.to_path_buf(),
            title: track.title.clone(),
            artwork: artwork.map(<[u8]>::to_vec),
            write_metadata,
        });
        Ok(())
    }
}

/// Artwork processor that leaves files untouched
#[derive(Default)]
pub struct KeepArtwork {
    processed: Mutex<Vec<PathBuf>>,
}

impl KeepArtwork {
    pub fn processed(&self) -> Vec<PathBuf> {
        self.processed.lock().unwrap().clone()
    }
}

impl ArtworkProcessor for KeepArtwork {
    fn process(&self, path: &Path, _options: ArtworkOptions) -> TagResult<PathBuf> {
        self.processed.lock().unwrap().push(path.to_path_buf());
        Ok(path.to_path_buf())
    }
}

/// Collaborators backed by `web`, the real page parser and recording fakes
pub fn collaborators(
    web: &Arc<FakeWeb>,
    tagger: &Arc<RecordingTagger>,
    artwork: &Arc<KeepArtwork>,
) -> Collaborators {
    Collaborators {
        pages: web.clone(),
        prober: web.clone(),
        files: web.clone(),
        extractor: Arc::new(TralbumExtractor::new()),
        tagger: tagger.clone(),
        artwork_processor: artwork.clone(),
    }
}

/// Release page markup as served by Bandcamp
pub fn album_page(
    artist: &str,
    title: &str,
    art_id: Option<u64>,
    tracks: &[(&str, &str)],
    band_url: Option<&str>,
) -> String {
    let trackinfo: Vec<serde_json::Value> = tracks
        .iter()
        .enumerate()
        .map(|(i, (track_title, url))| {
            serde_json::json!({
                "title": track_title,
                "track_num": i + 1,
                "file": {"mp3-128": url},
            })
        })
        .collect();

    let tralbum = serde_json::json!({
        "artist": artist,
        "art_id": art_id,
        "album_release_date": "12 Jun 2020 00:00:00 GMT",
        "current": {"title": title},
        "trackinfo": trackinfo,
    });

    let script = band_url
        .map(|url| format!("<script>var band_url = \"{}\";</script>", url))
        .unwrap_or_default();

    format!(
        r#"<html><head>
        <script type="text/javascript" data-tralbum="{}"></script>
        {}
        </head><body></body></html>"#,
        tralbum.to_string().replace('"', "&quot;"),
        script
    )
}

/// Artist music page listing the given release paths
pub fn music_page(release_paths: &[&str]) -> String {
    let items: String = release_paths
        .iter()
        .map(|path| format!(r#"<li><a href="{}">release</a></li>"#, path))
        .collect();
    format!(
        r#"<html><body><ol id="music-grid" class="music-grid">{}</ol></body></html>"#,
        items
    )
}

/// Music page of an artist with a single release
pub fn single_release_music_page() -> String {
    "<html><body><div class=\"trackView\"></div></body></html>".to_string()
}

/// Cover art URL the extractor derives from an art id
pub fn artwork_url(art_id: u64) -> String {
    bandcamp_fetcher::app::extractor::artwork_url(art_id)
}

/// Every event currently queued on `rx`
pub fn drain(rx: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Messages of every log event
pub fn log_messages(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
