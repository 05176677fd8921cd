/// Simulated backend tests
/// Time is paused, so the playhead moves only when the test sleeps
use indara_cli::simulated::{SimulatedBackend, SimulatedFactory};
use indara_playback::{BackendFactory, ErrorKind, PlaybackBackend, Track, TransportState};
use std::time::Duration;

fn backend(length_secs: u64) -> SimulatedBackend {
    SimulatedBackend::new(Duration::from_secs(length_secs), Duration::from_millis(100))
}

/// Test loading reports the configured length
#[tokio::test(start_paused = true)]
async fn test_load_reports_length() {
    let backend = backend(30);

    let length = backend.load("https://cdn.indara.test/a.mp3").await.unwrap();

    assert_eq!(length, Some(Duration::from_secs(30)));
    assert_eq!(backend.status().await.unwrap().transport, TransportState::Ready);
}

/// Test broken URLs fail to open
#[tokio::test(start_paused = true)]
async fn test_broken_url_fails() {
    let backend = backend(30);

    let error = backend.load("broken:missing").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::LoadFailure);
}

/// Test the playhead follows the clock while playing
#[tokio::test(start_paused = true)]
async fn test_position_follows_clock() {
    let backend = backend(30);
    backend.load("https://cdn.indara.test/a.mp3").await.unwrap();

    backend.play().await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    let status = backend.status().await.unwrap();
    assert_eq!(status.transport, TransportState::Playing);
    assert_eq!(status.position, Duration::from_secs(4));
}

/// Test pause freezes the playhead
#[tokio::test(start_paused = true)]
async fn test_pause_freezes_position() {
    let backend = backend(30);
    backend.load("https://cdn.indara.test/a.mp3").await.unwrap();
    backend.play().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    backend.pause().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let status = backend.status().await.unwrap();
    assert_eq!(status.transport, TransportState::Paused);
    assert_eq!(status.position, Duration::from_secs(2));
}

/// Test seeking while playing restarts the clock from the target
#[tokio::test(start_paused = true)]
async fn test_seek_while_playing() {
    let backend = backend(30);
    backend.load("https://cdn.indara.test/a.mp3").await.unwrap();
    backend.play().await.unwrap();

    backend.seek(Duration::from_secs(20)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(backend.status().await.unwrap().position, Duration::from_secs(23));
}

/// Test the track ends at its length and replays from the start
#[tokio::test(start_paused = true)]
async fn test_end_of_track() {
    let backend = backend(10);
    backend.load("https://cdn.indara.test/a.mp3").await.unwrap();
    backend.play().await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    let status = backend.status().await.unwrap();
    assert_eq!(status.transport, TransportState::Ended);
    assert_eq!(status.position, Duration::from_secs(10));

    backend.play().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.status().await.unwrap().position, Duration::from_secs(1));
}

/// Test stop returns the backend to idle
#[tokio::test(start_paused = true)]
async fn test_stop_goes_idle() {
    let backend = backend(10);
    backend.load("https://cdn.indara.test/a.mp3").await.unwrap();
    backend.play().await.unwrap();

    backend.stop().await.unwrap();

    let status = backend.status().await.unwrap();
    assert_eq!(status.transport, TransportState::Idle);
    assert_eq!(status.position, Duration::ZERO);
}

/// Test the factory prefers a track's duration hint
#[tokio::test(start_paused = true)]
async fn test_factory_uses_duration_hint() {
    let factory = SimulatedFactory::new(Duration::from_secs(30), Duration::ZERO);
    let hinted = Track::new("a", "A", "https://cdn.indara.test/a.mp3")
        .with_duration_hint(Duration::from_secs(95));
    let plain = Track::new("b", "B", "https://cdn.indara.test/b.mp3");

    let hinted = factory.create(&hinted).unwrap();
    let plain = factory.create(&plain).unwrap();

    assert_eq!(
        hinted.load("https://cdn.indara.test/a.mp3").await.unwrap(),
        Some(Duration::from_secs(95))
    );
    assert_eq!(
        plain.load("https://cdn.indara.test/b.mp3").await.unwrap(),
        Some(Duration::from_secs(30))
    );
}
