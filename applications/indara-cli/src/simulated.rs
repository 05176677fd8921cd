//! Real-time simulated playback backend
//!
//! Stands in for a device player: sources open after a fixed latency and
//! the playhead follows the wall clock. URLs with the `broken:` scheme fail
//! to open, which exercises the auto-skip path.

use async_trait::async_trait;
use indara_playback::{
    BackendError, BackendFactory, BackendResult, BackendStatus, Delivery, PlaybackBackend, Track,
    TransportState,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const BROKEN_SCHEME: &str = "broken:";

struct Clock {
    transport: TransportState,
    offset: Duration,
    started: Option<Instant>,
    volume: f32,
}

impl Clock {
    fn position(&self) -> Duration {
        self.offset + self.started.map_or(Duration::ZERO, |started| started.elapsed())
    }
}

pub struct SimulatedBackend {
    length: Duration,
    latency: Duration,
    clock: Mutex<Clock>,
}

impl SimulatedBackend {
    pub fn new(length: Duration, latency: Duration) -> Self {
        Self {
            length,
            latency,
            clock: Mutex::new(Clock {
                transport: TransportState::Idle,
                offset: Duration::ZERO,
                started: None,
                volume: 1.0,
            }),
        }
    }

    pub fn volume(&self) -> f32 {
        self.clock.lock().volume
    }
}

#[async_trait]
impl PlaybackBackend for SimulatedBackend {
    fn delivery(&self) -> Delivery {
        Delivery::Poll
    }

    async fn load(&self, url: &str) -> BackendResult<Option<Duration>> {
        self.clock.lock().transport = TransportState::Loading;
        tokio::time::sleep(self.latency).await;

        if url.starts_with(BROKEN_SCHEME) {
            self.clock.lock().transport = TransportState::Idle;
            return Err(BackendError::LoadFailure(format!("cannot open {url}")));
        }

        self.clock.lock().transport = TransportState::Ready;
        debug!(url, length_secs = self.length.as_secs(), "simulated source opened");
        Ok(Some(self.length))
    }

    async fn play(&self) -> BackendResult<()> {
        let mut clock = self.clock.lock();
        if clock.transport == TransportState::Ended {
            clock.offset = Duration::ZERO;
        }
        if clock.started.is_none() {
            clock.started = Some(Instant::now());
        }
        clock.transport = TransportState::Playing;
        Ok(())
    }

    async fn pause(&self) -> BackendResult<()> {
        let mut clock = self.clock.lock();
        if clock.transport == TransportState::Playing {
            clock.offset = clock.position().min(self.length);
            clock.started = None;
            clock.transport = TransportState::Paused;
        }
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BackendResult<()> {
        let mut clock = self.clock.lock();
        clock.offset = position.min(self.length);
        if clock.started.is_some() {
            clock.started = Some(Instant::now());
        }
        if clock.transport == TransportState::Ended {
            clock.transport = TransportState::Paused;
        }
        Ok(())
    }

    async fn stop(&self) -> BackendResult<()> {
        let mut clock = self.clock.lock();
        clock.transport = TransportState::Idle;
        clock.offset = Duration::ZERO;
        clock.started = None;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BackendResult<()> {
        self.clock.lock().volume = volume;
        Ok(())
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        let mut clock = self.clock.lock();
        let mut position = clock.position();

        if clock.transport == TransportState::Playing && position >= self.length {
            position = self.length;
            clock.offset = self.length;
            clock.started = None;
            clock.transport = TransportState::Ended;
        }

        Ok(BackendStatus {
            position: position.min(self.length),
            duration: Some(self.length),
            transport: clock.transport,
        })
    }
}

/// One simulated player per loaded track
pub struct SimulatedFactory {
    default_length: Duration,
    latency: Duration,
}

impl SimulatedFactory {
    pub fn new(default_length: Duration, latency: Duration) -> Self {
        Self {
            default_length,
            latency,
        }
    }
}

impl BackendFactory for SimulatedFactory {
    fn create(&self, track: &Track) -> BackendResult<Arc<dyn PlaybackBackend>> {
        let length = track
            .duration_hint
            .filter(|hint| !hint.is_zero())
            .unwrap_or(self.default_length);
        Ok(Arc::new(SimulatedBackend::new(length, self.latency)))
    }
}
