//! Download session behaviour: scheduling, cover art, failures and cancellation

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use bandcamp_fetcher::app::{
    Album, AlbumOutcome, DownloadSession, DownloadUnit, EventSender, SessionConfig, Track,
    TransferRegistry, UnitKind,
};
use bandcamp_fetcher::constants::MAX_PATH_LENGTH;

use common::{FakeWeb, KeepArtwork, RecordingTagger};

fn track(album: &str, number: u32, title: &str) -> Track {
    Track {
        title: title.to_string(),
        number,
        mp3_url: format!("http://media.test/{}/{}.mp3", album, number),
        lyrics: None,
    }
}

fn album(slug: &str, title: &str, artwork_url: &str, track_titles: &[&str]) -> Album {
    Album {
        artist: "Artist".to_string(),
        title: title.to_string(),
        artwork_url: artwork_url.to_string(),
        release_date: NaiveDate::from_ymd_opt(2019, 3, 8).unwrap(),
        tracks: track_titles
            .iter()
            .enumerate()
            .map(|(i, name)| track(slug, i as u32 + 1, name))
            .collect(),
    }
}

/// Serves a body for every unit of `albums`
fn serve(mut web: FakeWeb, albums: &[Album]) -> FakeWeb {
    for album in albums {
        if album.has_artwork() {
            web = web.file(&album.artwork_url, b"jpeg bytes");
        }
        for track in &album.tracks {
            web = web.file(&track.mp3_url, track.title.as_bytes());
        }
    }
    web
}

/// Units as the planner would produce them, sized from the served bodies
fn units(albums: &[Album], config: &SessionConfig) -> Vec<DownloadUnit> {
    let mut units: Vec<DownloadUnit> = Vec::new();
    for album in albums {
        if config.downloads_artwork() && album.has_artwork() {
            if !units.iter().any(|unit| unit.url == album.artwork_url) {
                units.push(DownloadUnit::new(
                    &album.artwork_url,
                    UnitKind::Artwork,
                    b"jpeg bytes".len() as u64,
                ));
            }
        }
        for track in &album.tracks {
            units.push(DownloadUnit::new(
                &track.mp3_url,
                UnitKind::Track,
                track.title.len() as u64,
            ));
        }
    }
    units
}

fn config(root: &Path) -> SessionConfig {
    SessionConfig {
        resize_cover_art: false,
        ..SessionConfig::default()
    }
    .with_downloads_location(root.join("{artist}").join("{album}").to_string_lossy())
    .with_filename_format("{tracknum} {title}.mp3")
    .with_cooldown(0.0, 1.0)
    .with_max_tries(2)
}

fn no_artwork(config: SessionConfig) -> SessionConfig {
    SessionConfig {
        save_cover_art_in_tags: false,
        save_cover_art_in_folder: false,
        ..config
    }
}

struct Fixture {
    web: Arc<FakeWeb>,
    tagger: Arc<RecordingTagger>,
    artwork: Arc<KeepArtwork>,
    registry: Arc<TransferRegistry>,
    session: DownloadSession,
}

fn fixture(web: FakeWeb, config: SessionConfig, albums: &[Album]) -> Fixture {
    let web = Arc::new(web);
    let tagger = Arc::new(RecordingTagger::default());
    let artwork = Arc::new(KeepArtwork::default());
    let registry = TransferRegistry::new();
    let session = DownloadSession::new(
        config.clone(),
        units(albums, &config),
        web.clone(),
        registry.clone(),
        EventSender::discard(),
    )
    .unwrap()
    .with_tag_writer(tagger.clone())
    .with_artwork_processor(artwork.clone());

    Fixture {
        web,
        tagger,
        artwork,
        registry,
        session,
    }
}

#[tokio::test]
async fn test_one_album_at_a_time_runs_albums_in_order() {
    let root = TempDir::new().unwrap();
    let albums = vec![
        album("a", "Alpha", "", &["One", "Two"]),
        album("b", "Beta", "", &["Three", "Four"]),
    ];
    let config = no_artwork(config(root.path())).with_one_album_at_a_time(true);
    let web = serve(FakeWeb::new().slow(Duration::from_millis(10)), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    let calls = f.web.fetch_calls();
    let last_alpha = calls
        .iter()
        .rposition(|url| url.contains("/a/"))
        .unwrap();
    let first_beta = calls.iter().position(|url| url.contains("/b/")).unwrap();
    assert!(last_alpha < first_beta);
    // Tracks of one album still overlap
    assert_eq!(f.web.max_in_flight(), 2);
}

#[tokio::test]
async fn test_albums_download_concurrently_by_default() {
    let root = TempDir::new().unwrap();
    let albums = vec![
        album("a", "Alpha", "", &["One"]),
        album("b", "Beta", "", &["Two"]),
        album("c", "Gamma", "", &["Three"]),
    ];
    let config = no_artwork(config(root.path()));
    let web = serve(FakeWeb::new().slow(Duration::from_millis(50)), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert_eq!(f.web.max_in_flight(), 3);
    // Reports keep input order whatever the completion order
    let titles: Vec<_> = summary.albums.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn test_transfer_pool_bounds_concurrency() {
    let root = TempDir::new().unwrap();
    let albums = vec![
        album("a", "Alpha", "", &["One", "Two"]),
        album("b", "Beta", "", &["Three"]),
    ];
    let config = SessionConfig {
        max_concurrent_downloads: 1,
        ..no_artwork(config(root.path()))
    };
    let web = serve(FakeWeb::new().slow(Duration::from_millis(10)), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert_eq!(f.web.max_in_flight(), 1);
    assert_eq!(f.web.fetch_calls().len(), 3);
}

#[tokio::test]
async fn test_artwork_is_ready_before_tracks_are_tagged() {
    let root = TempDir::new().unwrap();
    let albums = vec![album(
        "a",
        "Alpha",
        "http://art.test/a_10.jpg",
        &["One", "Two", "Three"],
    )];
    let config = config(root.path());
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert_eq!(f.web.fetch_calls()[0], "http://art.test/a_10.jpg");
    let calls = f.tagger.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls
        .iter()
        .all(|call| call.artwork.as_deref() == Some(&b"jpeg bytes"[..])));
    // Processed in the scratch directory, never in the album folder
    let processed = f.artwork.processed();
    assert_eq!(processed.len(), 1);
    assert!(!processed[0].starts_with(root.path()));
    assert!(!root
        .path()
        .join("Artist")
        .join("Alpha")
        .join("Alpha.jpg")
        .exists());
}

#[tokio::test]
async fn test_artwork_kept_in_album_folder() {
    let root = TempDir::new().unwrap();
    let albums = vec![album("a", "Alpha", "http://art.test/a_10.jpg", &["One"])];
    let config = SessionConfig {
        save_cover_art_in_tags: false,
        save_cover_art_in_folder: true,
        ..config(root.path())
    };
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    let cover = root.path().join("Artist").join("Alpha").join("Alpha.jpg");
    assert_eq!(std::fs::read(cover).unwrap(), b"jpeg bytes");
    // Metadata only, no embedded artwork
    let calls = f.tagger.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].artwork.is_none());
    assert!(calls[0].write_metadata);
}

#[tokio::test]
async fn test_shared_artwork_is_fetched_once() {
    let root = TempDir::new().unwrap();
    let shared = "http://art.test/shared_10.jpg";
    let albums = vec![
        album("a", "Alpha", shared, &["One"]),
        album("b", "Beta", shared, &["Two"]),
    ];
    let config = config(root.path()).with_one_album_at_a_time(true);
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert_eq!(f.web.fetch_count(shared), 1);
    assert_eq!(summary.complete_count(), 2);
    // Both albums embed the cover, not only the one that downloaded it
    let calls = f.tagger.calls();
    assert_eq!(calls.len(), 2);
    for title in ["One", "Two"] {
        let call = calls.iter().find(|call| call.title == title).unwrap();
        assert_eq!(call.artwork.as_deref(), Some(&b"jpeg bytes"[..]), "{}", title);
    }
    assert_eq!(f.artwork.processed().len(), 1);
}

#[tokio::test]
async fn test_shared_artwork_is_copied_into_every_folder() {
    let root = TempDir::new().unwrap();
    let shared = "http://art.test/shared_10.jpg";
    let albums = vec![
        album("a", "Alpha", shared, &["One"]),
        album("b", "Beta", shared, &["Two"]),
    ];
    let config = SessionConfig {
        save_cover_art_in_folder: true,
        ..config(root.path())
    };
    let web = serve(FakeWeb::new().slow(Duration::from_millis(10)), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert_eq!(f.web.fetch_count(shared), 1);
    for title in ["Alpha", "Beta"] {
        let cover = root
            .path()
            .join("Artist")
            .join(title)
            .join(format!("{}.jpg", title));
        assert_eq!(std::fs::read(&cover).unwrap(), b"jpeg bytes", "{}", title);
    }
    assert!(f
        .tagger
        .calls()
        .iter()
        .all(|call| call.artwork.as_deref() == Some(&b"jpeg bytes"[..])));
}

#[tokio::test]
async fn test_no_tagging_when_nothing_to_write() {
    let root = TempDir::new().unwrap();
    let albums = vec![album("a", "Alpha", "http://art.test/a_10.jpg", &["One"])];
    let config = SessionConfig {
        tag_tracks: false,
        ..no_artwork(config(root.path()))
    };
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    assert!(f.tagger.calls().is_empty());
    // Artwork is not a unit when it is neither embedded nor kept
    assert_eq!(f.web.fetch_calls(), vec!["http://media.test/a/1.mp3".to_string()]);
}

#[tokio::test]
async fn test_folder_creation_failure_marks_album_partial() {
    let root = TempDir::new().unwrap();
    let blocker = root.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let albums = vec![album("a", "Alpha", "", &["One", "Two"])];
    let config = no_artwork(config(root.path()))
        .with_downloads_location(blocker.join("{album}").to_string_lossy());
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert_eq!(
        summary.albums[0].outcome,
        AlbumOutcome::Partial {
            downloaded: 0,
            total: 2
        }
    );
    assert!(f.web.fetch_calls().is_empty());
    assert!(!summary.is_success());
}

#[tokio::test]
async fn test_long_file_names_are_shortened() {
    let root = TempDir::new().unwrap();
    let long_title = "An extremely long track title ".repeat(12);
    let albums = vec![album("a", "Alpha", "", &[long_title.trim()])];
    let config = no_artwork(config(root.path()));
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.is_success());
    let album_dir = root.path().join("Artist").join("Alpha");
    let entries: Vec<_> = std::fs::read_dir(&album_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].to_string_lossy().chars().count() <= MAX_PATH_LENGTH);
    assert!(entries[0].to_string_lossy().ends_with(".mp3"));
}

#[tokio::test]
async fn test_cancellation_quiesces_every_album() {
    let root = TempDir::new().unwrap();
    let albums = vec![
        album("a", "Alpha", "", &["One", "Two"]),
        album("b", "Beta", "", &["Three"]),
    ];
    let config = no_artwork(config(root.path()));
    let mut web = serve(FakeWeb::new(), &albums);
    for album in &albums {
        for track in &album.tracks {
            web = web.hanging(&track.mp3_url);
        }
    }
    let f = fixture(web, config, &albums);
    let registry = f.registry.clone();
    let web = f.web.clone();

    let run = tokio::spawn(f.session.run(albums.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while web.in_flight() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(registry.in_flight(), 3);

    assert!(registry.cancel());
    // A second request is a no-op
    assert!(!registry.cancel());

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.complete_count(), 0);
    assert_eq!(registry.in_flight(), 0);
    assert_eq!(registry.total_registered(), 3);
    assert_eq!(web.in_flight(), 0);
    // Nothing was retried after the abort
    assert_eq!(web.fetch_calls().len(), 3);
}

#[tokio::test]
async fn test_cancelled_before_start_attempts_nothing() {
    let root = TempDir::new().unwrap();
    let albums = vec![album("a", "Alpha", "", &["One"])];
    let config = no_artwork(config(root.path()));
    let web = serve(FakeWeb::new(), &albums);
    let f = fixture(web, config, &albums);
    f.registry.cancel();

    let summary = f.session.run(albums.clone()).await;

    assert!(summary.cancelled);
    assert_eq!(summary.albums[0].outcome, AlbumOutcome::NotAttempted);
    assert!(f.web.fetch_calls().is_empty());
    assert!(!root.path().join("Artist").exists());
}
