use segue::domain::{SourceRef, Track, TrackId};
use segue::error::StoreError;
use segue::settings::EngineConfig;
use segue::store::{MemoryTrackStore, SourceLoader, TrackStore};
use std::sync::Arc;

fn quick_retry_config() -> EngineConfig {
    EngineConfig {
        download_retries: 2,
        download_retry_backoff_ms: 1,
        download_retry_backoff_max_ms: 2,
        ..EngineConfig::default()
    }
}

fn url_track(id: &str, url: String) -> Track {
    Track::new(id, "Remote", 3.0).with_source(SourceRef::Url { url })
}

#[tokio::test]
async fn url_track_is_downloaded_and_written_back() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/a.mp3")
        .with_status(200)
        .with_body(b"ID3-fake-audio")
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryTrackStore::new());
    let loader = SourceLoader::new(store.clone(), &quick_retry_config());
    let track = url_track("a", format!("{}/a.mp3", server.url()));

    let handle = loader.load(&track).await.expect("download");
    assert_eq!(handle.bytes(), b"ID3-fake-audio");
    assert!(store.contains(&TrackId::from("a")));

    // 第二次命中存储，不再请求网络
    let again = loader.load(&track).await.expect("stored");
    assert_eq!(again.len(), handle.len());
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/busy.mp3")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let store = Arc::new(MemoryTrackStore::new());
    let loader = SourceLoader::new(store, &quick_retry_config());
    let track = url_track("busy", format!("{}/busy.mp3", server.url()));

    let err = loader.load(&track).await.expect_err("should fail");
    assert!(matches!(err, StoreError::HttpStatus { status: 503, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gone.mp3")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let store: Arc<dyn TrackStore> = Arc::new(MemoryTrackStore::new());
    let loader = SourceLoader::new(store, &quick_retry_config());
    let track = url_track("gone", format!("{}/gone.mp3", server.url()));

    let err = loader.load(&track).await.expect_err("should fail");
    assert!(!err.is_retryable());
    mock.assert_async().await;
}
