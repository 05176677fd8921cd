//! Track player backend against a scripted native player

use async_trait::async_trait;
use indara_audio_mobile::{
    NativeError, NativeState, NativeTrack, NativeTrackPlayer, Result, TrackPlayerFactory,
};
use indara_playback::{
    AudioService, BackendError, BackendFactory, ErrorKind, LoadOutcome, PlaybackConfig,
    ServiceEvent, Track,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ===== Test Helpers =====

struct PlayerState {
    tracks: Vec<NativeTrack>,
    state: NativeState,
    position: f64,
    volume: f32,
    opening: usize,
    resets: usize,
    plays: usize,
    state_queries: usize,
    status_failures: usize,
}

/// Native player that opens any source after a fixed number of state queries
struct FakePlayer {
    inner: Mutex<PlayerState>,
    duration: f64,
    polls_until_ready: usize,
    broken: bool,
    denied: bool,
}

impl FakePlayer {
    fn new(duration: f64) -> Self {
        Self {
            inner: Mutex::new(PlayerState {
                tracks: Vec::new(),
                state: NativeState::None,
                position: 0.0,
                volume: 1.0,
                opening: 0,
                resets: 0,
                plays: 0,
                state_queries: 0,
                status_failures: 0,
            }),
            duration,
            polls_until_ready: 0,
            broken: false,
            denied: false,
        }
    }

    fn opening_after(mut self, polls: usize) -> Self {
        self.polls_until_ready = polls;
        self
    }

    fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    fn denied(mut self) -> Self {
        self.denied = true;
        self
    }

    fn play_to(&self, seconds: f64) {
        self.inner.lock().position = seconds;
    }

    fn run_out(&self) {
        let mut inner = self.inner.lock();
        inner.position = self.duration;
        inner.state = NativeState::Ended;
    }

    fn crash(&self) {
        self.inner.lock().state = NativeState::Error;
    }

    fn fail_status(&self, times: usize) {
        self.inner.lock().status_failures = times;
    }

    fn current_track(&self) -> Option<String> {
        self.inner.lock().tracks.last().map(|t| t.id.clone())
    }

    fn resets(&self) -> usize {
        self.inner.lock().resets
    }

    fn plays(&self) -> usize {
        self.inner.lock().plays
    }

    fn state_queries(&self) -> usize {
        self.inner.lock().state_queries
    }

    fn volume(&self) -> f32 {
        self.inner.lock().volume
    }
}

#[async_trait]
impl NativeTrackPlayer for FakePlayer {
    async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.tracks.clear();
        inner.state = NativeState::None;
        inner.position = 0.0;
        inner.resets += 1;
        Ok(())
    }

    async fn add(&self, track: NativeTrack) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.tracks.push(track);
        inner.state = NativeState::Loading;
        inner.opening = self.polls_until_ready;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        if self.denied {
            return Err(NativeError::NotPermitted("audio focus denied".into()));
        }
        let mut inner = self.inner.lock();
        inner.plays += 1;
        inner.state = NativeState::Playing;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.inner.lock().state = NativeState::Paused;
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.inner.lock().position = seconds;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner.lock().volume = volume;
        Ok(())
    }

    async fn position(&self) -> Result<f64> {
        Ok(self.inner.lock().position)
    }

    async fn duration(&self) -> Result<f64> {
        let inner = self.inner.lock();
        Ok(if inner.state == NativeState::Loading { 0.0 } else { self.duration })
    }

    async fn state(&self) -> Result<NativeState> {
        let mut inner = self.inner.lock();
        inner.state_queries += 1;

        if inner.status_failures > 0 {
            inner.status_failures -= 1;
            return Err(NativeError::Bridge("bridge timed out".into()));
        }

        if inner.state == NativeState::Loading {
            if self.broken {
                inner.state = NativeState::Error;
            } else if inner.opening == 0 {
                inner.state = NativeState::Ready;
            } else {
                inner.opening -= 1;
            }
        }
        Ok(inner.state)
    }
}

fn track(id: &str) -> Track {
    Track::new(id, format!("Track {id}"), format!("https://cdn.indara.test/{id}.mp3"))
}

fn setup(player: FakePlayer) -> (Arc<FakePlayer>, AudioService) {
    let player = Arc::new(player);
    let factory = TrackPlayerFactory::new(player.clone()).with_ready_poll(Duration::from_millis(10));
    let service = AudioService::new(Arc::new(factory), PlaybackConfig::default());
    (player, service)
}

async fn poll_ticks(n: u32) {
    tokio::time::sleep(PlaybackConfig::default().poll_interval * n + Duration::from_millis(10)).await;
}

// ===== Backend =====

#[tokio::test(start_paused = true)]
async fn load_waits_until_player_is_ready() {
    let player = Arc::new(FakePlayer::new(240.0).opening_after(3));
    let factory = TrackPlayerFactory::new(player.clone());
    let backend = factory.create(&track("a")).unwrap();

    let duration = backend.load("https://cdn.indara.test/a.mp3").await.unwrap();

    assert_eq!(duration, Some(Duration::from_secs(240)));
    assert_eq!(player.state_queries(), 4);
    assert_eq!(player.current_track().as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn oversized_bridge_values_saturate() {
    let player = Arc::new(FakePlayer::new(1e300));
    let factory = TrackPlayerFactory::new(player.clone());
    let backend = factory.create(&track("a")).unwrap();

    assert_eq!(
        backend.load("https://cdn.indara.test/a.mp3").await.unwrap(),
        Some(Duration::MAX)
    );
    player.play_to(1e300);
    assert_eq!(backend.status().await.unwrap().position, Duration::MAX);
}

#[tokio::test(start_paused = true)]
async fn unopenable_source_is_a_load_failure() {
    let player = Arc::new(FakePlayer::new(120.0).broken());
    let factory = TrackPlayerFactory::new(player);
    let backend = factory.create(&track("a")).unwrap();

    let error = backend.load("https://cdn.indara.test/a.mp3").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::LoadFailure);
}

#[tokio::test(start_paused = true)]
async fn released_claim_leaves_player_alone() {
    let player = Arc::new(FakePlayer::new(120.0));
    let factory = TrackPlayerFactory::new(player.clone());
    let first = factory.create(&track("a")).unwrap();
    let second = factory.create(&track("b")).unwrap();

    second.load("https://cdn.indara.test/b.mp3").await.unwrap();
    let resets = player.resets();

    first.stop().await.unwrap();
    assert!(matches!(first.play().await, Err(BackendError::Other(_))));

    assert_eq!(player.resets(), resets);
    assert_eq!(player.plays(), 0);
    assert_eq!(player.current_track().as_deref(), Some("b"));
}

#[test]
fn native_track_serializes_for_the_bridge() {
    let value = serde_json::to_value(NativeTrack::from(&track("a"))).unwrap();

    assert_eq!(value["url"], "https://cdn.indara.test/a.mp3");
    assert_eq!(value["artist"], "Unknown Artist");
    assert!(value.get("artwork").is_none());
    assert!(value.get("duration").is_none());
}

// ===== With AudioService =====

#[tokio::test(start_paused = true)]
async fn position_is_polled_from_the_player() {
    let (player, service) = setup(FakePlayer::new(180.0).opening_after(2));

    assert_eq!(service.load(track("a"), true).await, LoadOutcome::Loaded);
    assert!(service.state().is_playing);
    assert_eq!(service.state().duration, Duration::from_secs(180));

    player.play_to(30.0);
    poll_ticks(1).await;

    assert_eq!(service.state().position, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn polled_end_finishes_the_track() {
    let (player, service) = setup(FakePlayer::new(180.0));
    let mut events = service.events();
    service.load(track("a"), true).await;

    player.run_out();
    poll_ticks(1).await;

    let state = service.state();
    assert!(!state.is_playing);
    assert_eq!(state.position, Duration::from_secs(180));

    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        ended |= matches!(event, ServiceEvent::TrackEnded { .. });
    }
    assert!(ended);
}

#[tokio::test(start_paused = true)]
async fn replacing_a_track_keeps_the_newer_one_on_the_player() {
    let (player, service) = setup(FakePlayer::new(180.0));

    service.load(track("a"), true).await;
    service.load(track("b"), true).await;
    poll_ticks(2).await;

    assert_eq!(player.current_track().as_deref(), Some("b"));
    assert_eq!(service.state().track_id(), Some("b"));
    assert!(service.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn player_error_during_playback_fails_the_track() {
    let (player, service) = setup(FakePlayer::new(180.0));
    let mut events = service.events();
    service.load(track("a"), true).await;

    player.crash();
    poll_ticks(1).await;

    assert_eq!(service.state().last_error, Some(ErrorKind::LoadFailure));
    assert!(!service.state().is_playing);

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(
            event,
            ServiceEvent::TrackFailed { kind: ErrorKind::LoadFailure, .. }
        );
    }
    assert!(failed);
}

#[tokio::test(start_paused = true)]
async fn bridge_hiccups_are_retried() {
    let (player, service) = setup(FakePlayer::new(180.0));
    service.load(track("a"), true).await;

    player.fail_status(2);
    player.play_to(20.0);
    poll_ticks(3).await;

    let state = service.state();
    assert_eq!(state.last_error, None);
    assert_eq!(state.position, Duration::from_secs(20));
    assert!(state.is_playing);
}

#[tokio::test(start_paused = true)]
async fn denied_audio_focus_is_a_rejection() {
    let (_player, service) = setup(FakePlayer::new(180.0).denied());

    service.load(track("a"), true).await;
    let state = service.state();

    assert!(!state.is_playing);
    assert_eq!(state.last_error, Some(ErrorKind::PlaybackRejected));
    assert!(service.has_resource());
}

#[tokio::test(start_paused = true)]
async fn mute_reaches_the_player() {
    let (player, service) = setup(FakePlayer::new(180.0));
    service.load(track("a"), false).await;

    service.set_volume(0.6).await;
    assert_eq!(player.volume(), 0.6);

    service.toggle_mute().await;
    assert_eq!(player.volume(), 0.0);

    service.toggle_mute().await;
    assert_eq!(player.volume(), 0.6);
}
