//! Poll-mode backend over the shared native player
//!
//! The native player is a singleton, so every backend carries an owner
//! token. Creating a backend takes ownership; a backend that lost it turns
//! into a no-op and never touches the player again.

use crate::error::NativeError;
use crate::player::{NativeState, NativeTrack, NativeTrackPlayer};
use async_trait::async_trait;
use indara_playback::format::seconds_to_duration;
use indara_playback::{
    BackendError, BackendFactory, BackendResult, BackendStatus, Delivery, PlaybackBackend, Track,
    TransportState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Delay between state queries while a source opens
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(100);

fn superseded() -> BackendError {
    BackendError::Other("native player taken over by a newer track".to_string())
}

fn seconds(value: f64) -> Duration {
    seconds_to_duration(value)
}

fn known_duration(value: f64) -> Option<Duration> {
    Some(seconds(value)).filter(|duration| !duration.is_zero())
}

fn transport(state: NativeState) -> TransportState {
    match state {
        NativeState::None | NativeState::Stopped | NativeState::Error => TransportState::Idle,
        NativeState::Loading => TransportState::Loading,
        NativeState::Ready => TransportState::Ready,
        NativeState::Buffering => TransportState::Buffering,
        NativeState::Playing => TransportState::Playing,
        NativeState::Paused => TransportState::Paused,
        NativeState::Ended => TransportState::Ended,
    }
}

/// One track's claim on the native player
pub struct TrackPlayerBackend {
    player: Arc<dyn NativeTrackPlayer>,
    owner: Arc<AtomicU64>,
    token: u64,
    track: NativeTrack,
    ready_poll: Duration,
}

impl TrackPlayerBackend {
    fn owns_player(&self) -> bool {
        self.owner.load(Ordering::SeqCst) == self.token
    }

    fn ensure_owner(&self) -> BackendResult<()> {
        if self.owns_player() {
            Ok(())
        } else {
            Err(superseded())
        }
    }
}

#[async_trait]
impl PlaybackBackend for TrackPlayerBackend {
    fn delivery(&self) -> Delivery {
        Delivery::Poll
    }

    async fn load(&self, url: &str) -> BackendResult<Option<Duration>> {
        self.ensure_owner()?;
        self.player.reset().await?;

        let track = NativeTrack {
            url: url.to_string(),
            ..self.track.clone()
        };
        debug!(track_id = %track.id, token = self.token, "adding track to native player");
        self.player.add(track).await?;

        loop {
            self.ensure_owner()?;
            match self.player.state().await? {
                NativeState::Error => {
                    return Err(BackendError::LoadFailure(format!(
                        "native player could not open {url}"
                    )));
                }
                state if state.is_loaded() => break,
                state => {
                    trace!(?state, "waiting for native player");
                    tokio::time::sleep(self.ready_poll).await;
                }
            }
        }

        self.ensure_owner()?;
        Ok(known_duration(self.player.duration().await?))
    }

    async fn play(&self) -> BackendResult<()> {
        self.ensure_owner()?;
        Ok(self.player.play().await?)
    }

    async fn pause(&self) -> BackendResult<()> {
        self.ensure_owner()?;
        Ok(self.player.pause().await?)
    }

    async fn seek(&self, position: Duration) -> BackendResult<()> {
        self.ensure_owner()?;
        Ok(self.player.seek_to(position.as_secs_f64()).await?)
    }

    async fn stop(&self) -> BackendResult<()> {
        if !self.owns_player() {
            trace!(token = self.token, "skipping stop on released player claim");
            return Ok(());
        }
        self.player.reset().await?;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BackendResult<()> {
        self.ensure_owner()?;
        Ok(self.player.set_volume(volume).await?)
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        self.ensure_owner()?;

        let state = self.player.state().await.map_err(transient)?;
        if state == NativeState::Error {
            return Err(BackendError::LoadFailure(
                "native player entered the error state".to_string(),
            ));
        }

        let position = self.player.position().await.map_err(transient)?;
        let duration = self.player.duration().await.map_err(transient)?;

        Ok(BackendStatus {
            position: seconds(position),
            duration: known_duration(duration),
            transport: transport(state),
        })
    }
}

/// Failed status queries are retried on the next poll
fn transient(error: NativeError) -> BackendError {
    BackendError::Other(error.to_string())
}

/// Hands the shared native player to one track at a time
pub struct TrackPlayerFactory {
    player: Arc<dyn NativeTrackPlayer>,
    owner: Arc<AtomicU64>,
    ready_poll: Duration,
}

impl TrackPlayerFactory {
    pub fn new(player: Arc<dyn NativeTrackPlayer>) -> Self {
        Self {
            player,
            owner: Arc::new(AtomicU64::new(0)),
            ready_poll: DEFAULT_READY_POLL,
        }
    }

    pub fn with_ready_poll(mut self, interval: Duration) -> Self {
        self.ready_poll = interval;
        self
    }
}

impl BackendFactory for TrackPlayerFactory {
    fn create(&self, track: &Track) -> BackendResult<Arc<dyn PlaybackBackend>> {
        let token = self.owner.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(track_id = %track.id, token, "claiming native player");

        Ok(Arc::new(TrackPlayerBackend {
            player: Arc::clone(&self.player),
            owner: Arc::clone(&self.owner),
            token,
            track: NativeTrack::from(track),
            ready_poll: self.ready_poll,
        }))
    }
}
