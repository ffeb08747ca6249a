//! End-to-end runs of the coordinator against in-memory collaborators

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use bandcamp_fetcher::app::{
    AlbumOutcome, Coordinator, EventSender, ProbeMethod, ProgressMode, SessionConfig,
    SessionEvent,
};
use bandcamp_fetcher::errors::AppError;

use common::{
    album_page, artwork_url, collaborators, drain, log_messages, music_page,
    single_release_music_page, FakeWeb, KeepArtwork, RecordingTagger,
};

const ALBUM_URL: &str = "https://artist.bandcamp.com/album/first-light";
const SECOND_URL: &str = "https://artist.bandcamp.com/album/second-wind";
const ARTIST_URL: &str = "https://artist.bandcamp.com";
const MUSIC_URL: &str = "https://artist.bandcamp.com/music";

const TRACK_ONE: &str = "https://t4.bcbits.com/stream/first/1.mp3";
const TRACK_TWO: &str = "https://t4.bcbits.com/stream/first/2.mp3";
const SECOND_TRACK: &str = "https://t4.bcbits.com/stream/second/1.mp3";

const ART_ID: u64 = 1234567;
const SECOND_ART_ID: u64 = 7654321;

fn test_config(root: &Path) -> SessionConfig {
    SessionConfig {
        resize_cover_art: false,
        ..SessionConfig::default()
    }
    .with_downloads_location(root.join("{artist}").join("{album}").to_string_lossy())
    .with_filename_format("{tracknum} {title}.mp3")
    .with_cooldown(0.0, 1.0)
    .with_max_tries(2)
}

fn first_album_page(band_url: Option<&str>) -> String {
    album_page(
        "The Artist",
        "First Light",
        Some(ART_ID),
        &[("Dawn", TRACK_ONE), ("Noon", TRACK_TWO)],
        band_url,
    )
}

fn second_album_page() -> String {
    album_page(
        "The Artist",
        "Second Wind",
        Some(SECOND_ART_ID),
        &[("Gust", SECOND_TRACK)],
        Some(ARTIST_URL),
    )
}

fn first_album_web() -> FakeWeb {
    FakeWeb::new()
        .page(ALBUM_URL, first_album_page(None))
        .file(&artwork_url(ART_ID), b"cover-art-bytes")
        .file(TRACK_ONE, b"first track audio")
        .file(TRACK_TWO, b"second track audio, a little longer")
}

fn with_second_album(web: FakeWeb) -> FakeWeb {
    web.page(SECOND_URL, second_album_page())
        .file(&artwork_url(SECOND_ART_ID), b"other cover")
        .file(SECOND_TRACK, b"gust audio")
}

struct Harness {
    web: Arc<FakeWeb>,
    tagger: Arc<RecordingTagger>,
    artwork: Arc<KeepArtwork>,
    coordinator: Coordinator,
    events: bandcamp_fetcher::app::EventReceiver,
}

fn harness(web: FakeWeb, config: SessionConfig) -> Harness {
    let web = Arc::new(web);
    let tagger = Arc::new(RecordingTagger::default());
    let artwork = Arc::new(KeepArtwork::default());
    let (sender, events) = EventSender::channel();
    let coordinator = Coordinator::new(config, collaborators(&web, &tagger, &artwork), sender);
    Harness {
        web,
        tagger,
        artwork,
        coordinator,
        events,
    }
}

#[tokio::test]
async fn test_single_album_end_to_end() {
    let root = TempDir::new().unwrap();
    let mut h = harness(first_album_web(), test_config(root.path()));

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.albums.len(), 1);
    assert_eq!(summary.albums[0].outcome, AlbumOutcome::Complete);

    let album_dir = root.path().join("The Artist").join("First Light");
    assert_eq!(
        std::fs::read(album_dir.join("01 Dawn.mp3")).unwrap(),
        b"first track audio"
    );
    assert!(album_dir.join("02 Noon.mp3").exists());
    // Cover art is only embedded, not kept in the folder
    assert!(!album_dir.join("First Light.jpg").exists());

    let calls = h.tagger.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert!(call.write_metadata);
        assert_eq!(call.artwork.as_deref(), Some(&b"cover-art-bytes"[..]));
    }
    assert_eq!(h.artwork.processed().len(), 1);

    let events = drain(&mut h.events);
    assert!(matches!(
        events.first(),
        Some(SessionEvent::ControlStateChanged { downloading: true })
    ));
    assert!(matches!(events.last(), Some(SessionEvent::PlaySound)));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ProgressStarted {
            total_units: 3,
            mode: ProgressMode::Bytes,
            ..
        }
    )));
    assert!(log_messages(&events)
        .iter()
        .any(|message| message == "Successfully downloaded album \"First Light\""));
}

#[tokio::test]
async fn test_progress_snapshots_never_go_backwards() {
    let root = TempDir::new().unwrap();
    let mut h = harness(first_album_web(), test_config(root.path()));

    h.coordinator.run(ALBUM_URL).await.unwrap();

    let events = drain(&mut h.events);
    let expected = events
        .iter()
        .find_map(|event| match event {
            SessionEvent::ProgressStarted {
                total_expected_bytes,
                ..
            } => Some(*total_expected_bytes),
            _ => None,
        })
        .unwrap();
    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Progress(snapshot) => Some(snapshot.clone()),
            _ => None,
        })
        .collect();

    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(pair[1].total_received_bytes >= pair[0].total_received_bytes);
        assert!(pair[1].downloaded_unit_count >= pair[0].downloaded_unit_count);
    }
    let last = snapshots.last().unwrap();
    assert!(last.total_received_bytes <= expected);
    assert_eq!(last.downloaded_unit_count, 3);
}

#[tokio::test]
async fn test_without_size_probing_progress_counts_files() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path()).with_file_sizes(false);
    let mut h = harness(first_album_web(), config);

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    assert!(h.web.probe_calls().is_empty());
    let events = drain(&mut h.events);
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ProgressStarted {
            mode: ProgressMode::Units,
            total_expected_bytes: 0,
            ..
        }
    )));
}

#[tokio::test]
async fn test_probe_method_per_unit_kind() {
    let root = TempDir::new().unwrap();
    let h = harness(first_album_web(), test_config(root.path()));

    h.coordinator.run(ALBUM_URL).await.unwrap();

    let probes = h.web.probe_calls();
    assert_eq!(probes.len(), 3);
    for (url, method) in &probes {
        let expected = if url.ends_with(".mp3") {
            ProbeMethod::Get
        } else {
            ProbeMethod::Head
        };
        assert_eq!(*method, expected, "{}", url);
    }
}

#[tokio::test]
async fn test_discography_expands_artist_releases() {
    let root = TempDir::new().unwrap();
    let web = with_second_album(first_album_web())
        .page(ALBUM_URL, first_album_page(Some(ARTIST_URL)))
        .page(
            MUSIC_URL,
            music_page(&["/album/first-light", "/album/second-wind?from=grid"]),
        );
    let config = test_config(root.path()).with_discography(true);
    let h = harness(web, config);

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    let titles: Vec<_> = summary.albums.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["First Light", "Second Wind"]);
    assert!(root
        .path()
        .join("The Artist")
        .join("Second Wind")
        .join("01 Gust.mp3")
        .exists());
    // The seed is listed again on the music page but downloaded once
    assert_eq!(h.web.fetch_count(TRACK_ONE), 1);
}

#[tokio::test]
async fn test_single_release_artist_keeps_seed() {
    let root = TempDir::new().unwrap();
    let web = first_album_web()
        .page(ALBUM_URL, first_album_page(Some(ARTIST_URL)))
        .page(MUSIC_URL, single_release_music_page());
    let config = test_config(root.path()).with_discography(true);
    let h = harness(web, config);

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.albums.len(), 1);
    assert_eq!(summary.albums[0].title, "First Light");
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let root = TempDir::new().unwrap();
    let web = first_album_web().failing(TRACK_ONE, 1);
    let mut h = harness(web, test_config(root.path()));

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(h.web.fetch_count(TRACK_ONE), 2);
    let messages = log_messages(&drain(&mut h.events));
    assert!(messages
        .iter()
        .any(|message| message.starts_with("Unable to download Dawn. Try 1 of 2")));
}

#[tokio::test]
async fn test_abandoned_track_leaves_album_partial() {
    let root = TempDir::new().unwrap();
    let web = with_second_album(first_album_web()).failing(TRACK_TWO, 5);
    let mut h = harness(web, test_config(root.path()));

    let summary = h
        .coordinator
        .run(&format!("{}\n{}", ALBUM_URL, SECOND_URL))
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert!(!summary.cancelled);
    assert_eq!(
        summary.albums[0].outcome,
        AlbumOutcome::Partial {
            downloaded: 2,
            total: 3
        }
    );
    assert_eq!(summary.albums[1].outcome, AlbumOutcome::Complete);
    // Bounded by the configured number of tries
    assert_eq!(h.web.fetch_count(TRACK_TWO), 2);

    let messages = log_messages(&drain(&mut h.events));
    assert!(messages.iter().any(|message| message
        == "Finished downloading album \"First Light\". Some tracks were not downloaded"));
    assert!(messages
        .iter()
        .any(|message| message.starts_with("Unable to download Noon. Hit max retries of 2")));
}

#[tokio::test]
async fn test_existing_file_of_matching_size_is_kept() {
    let root = TempDir::new().unwrap();
    let album_dir = root.path().join("The Artist").join("First Light");
    std::fs::create_dir_all(&album_dir).unwrap();
    std::fs::write(album_dir.join("01 Dawn.mp3"), b"first track audio").unwrap();

    let h = harness(first_album_web(), test_config(root.path()));
    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(h.web.fetch_count(TRACK_ONE), 0);
    assert_eq!(h.web.fetch_count(TRACK_TWO), 1);
    // Only the freshly transferred track is tagged
    let tagged: Vec<_> = h.tagger.calls().into_iter().map(|c| c.title).collect();
    assert_eq!(tagged, vec!["Noon".to_string()]);
}

#[tokio::test]
async fn test_unreachable_album_is_reported() {
    let root = TempDir::new().unwrap();
    let mut h = harness(FakeWeb::new(), test_config(root.path()));

    let summary = h.coordinator.run(ALBUM_URL).await.unwrap();

    assert!(summary.albums.is_empty());
    assert!(!summary.cancelled);
    let events = drain(&mut h.events);
    assert!(log_messages(&events)
        .iter()
        .any(|message| message == "No album could be retrieved"));
    assert!(matches!(events.last(), Some(SessionEvent::PlaySound)));
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let root = TempDir::new().unwrap();
    let mut h = harness(FakeWeb::new(), test_config(root.path()));

    let result = h.coordinator.run("  \n\n").await;

    assert!(matches!(result, Err(AppError::Input(_))));
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_the_run() {
    let root = TempDir::new().unwrap();
    let web = first_album_web().hanging(TRACK_TWO);
    let h = harness(web, test_config(root.path()));
    let registry = h.coordinator.cancel_handle();
    let web = h.web.clone();
    let mut events = h.events;
    let coordinator = Arc::new(h.coordinator);

    let run = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(ALBUM_URL).await })
    };

    // Wait for the hanging transfer to start
    tokio::time::timeout(Duration::from_secs(5), async {
        while web.fetch_count(TRACK_TWO) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(registry.cancel());
    let registered_at_cancel = registry.total_registered();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    assert_eq!(registry.in_flight(), 0);
    assert_eq!(registry.total_registered(), registered_at_cancel);
    assert_eq!(web.in_flight(), 0);

    let events = drain(&mut events);
    let messages = log_messages(&events);
    assert!(messages
        .iter()
        .any(|message| message == "Downloads cancelled by user"));
    // The cancelled album gets no completion warning
    assert!(!messages
        .iter()
        .any(|message| message.starts_with("Finished downloading album")));

    let tail: Vec<_> = events.iter().rev().take(2).collect();
    assert!(matches!(tail[0], SessionEvent::PlaySound));
    assert!(matches!(
        tail[1],
        SessionEvent::ControlStateChanged { downloading: false }
    ));
}

/// Starts `coordinator.run(ALBUM_URL)` and cancels once `ready` holds
async fn cancel_when(
    h: Harness,
    ready: impl Fn(&FakeWeb) -> bool,
) -> (
    bandcamp_fetcher::app::SessionSummary,
    Vec<SessionEvent>,
    Arc<FakeWeb>,
    Duration,
) {
    let registry = h.coordinator.cancel_handle();
    let web = h.web.clone();
    let mut events = h.events;
    let coordinator = Arc::new(h.coordinator);

    let run = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(ALBUM_URL).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while !ready(&web) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let cancelled_at = std::time::Instant::now();
    assert!(registry.cancel());
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let waited = cancelled_at.elapsed();

    (summary, drain(&mut events), web, waited)
}

#[tokio::test]
async fn test_cancel_while_loading_pages_returns_promptly() {
    let root = TempDir::new().unwrap();
    let web = first_album_web().slow_pages(Duration::from_secs(30));
    let h = harness(web, test_config(root.path()));

    let (summary, events, web, waited) =
        cancel_when(h, |web| !web.page_calls().is_empty()).await;

    assert!(waited < Duration::from_secs(1));
    assert!(summary.cancelled);
    assert!(summary.albums.is_empty());
    assert!(web.fetch_calls().is_empty());
    // A cancelled page load is not a retrieval failure
    let messages = log_messages(&events);
    assert!(!messages
        .iter()
        .any(|message| message.starts_with("Could not retrieve")));
    assert!(messages
        .iter()
        .any(|message| message == "Downloads cancelled by user"));
}

#[tokio::test]
async fn test_cancel_while_probing_reports_albums_not_attempted() {
    let root = TempDir::new().unwrap();
    let web = first_album_web().slow_probes(Duration::from_millis(300));
    let h = harness(web, test_config(root.path()));

    let (summary, _events, web, _waited) =
        cancel_when(h, |web| !web.probe_calls().is_empty()).await;

    assert!(summary.cancelled);
    assert_eq!(summary.albums.len(), 1);
    assert_eq!(summary.albums[0].title, "First Light");
    assert_eq!(summary.albums[0].outcome, AlbumOutcome::NotAttempted);
    assert_eq!(summary.not_attempted_count(), 1);
    assert!(web.fetch_calls().is_empty());
}
