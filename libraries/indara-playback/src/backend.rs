//! Platform-agnostic playback backend trait
//!
//! Abstracts the native audio primitive of each platform (HTML media element
//! on web, the native track-player bridge on mobile). [`crate::AudioService`]
//! depends only on this capability set and never leaks backend types past
//! its boundary.

use crate::error::{BackendError, BackendResult};
use crate::types::Track;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// How a backend reports timing and transport changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Backend pushes [`BackendEvent`]s into the attached sink
    Push,

    /// Backend has to be asked; the service polls [`PlaybackBackend::status`]
    Poll,
}

/// Transport state as observed on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Nothing loaded
    Idle,

    /// Source is being resolved or buffered
    Loading,

    /// Loaded and ready, not yet started
    Ready,

    /// Audio is playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Stalled waiting for data while playing
    Buffering,

    /// Reached the end of the source
    Ended,
}

/// Point-in-time status snapshot, used by poll-mode backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStatus {
    pub position: Duration,
    pub duration: Option<Duration>,
    pub transport: TransportState,
}

/// Events emitted by push-mode backends
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Source is ready to play
    Ready {
        /// Duration, if the platform knows it already
        duration: Option<Duration>,
    },

    /// Playback position advanced
    TimeUpdate { position: Duration },

    /// Duration became known or changed
    DurationChanged { duration: Duration },

    /// Transport started (including from platform controls)
    Playing,

    /// Transport paused (including from platform controls)
    Paused,

    /// Source played to completion
    Ended,

    /// Fatal load or playback error
    Error(BackendError),
}

/// Callback a push-mode backend delivers its events to
pub type EventSink = Arc<dyn Fn(BackendEvent) + Send + Sync>;

/// One loaded audio resource on the platform
///
/// A backend instance is bound to a single track for its whole life. The
/// service owns it exclusively and releases it with [`stop`](Self::stop).
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Event delivery mode of this backend
    fn delivery(&self) -> Delivery;

    /// Install the sink for pushed events
    ///
    /// Poll-mode backends ignore this.
    fn attach(&self, _sink: EventSink) {}

    /// Drop the sink; no event may be delivered afterwards
    fn detach(&self) {}

    /// Resolve and buffer the source until it is ready to play
    ///
    /// Returns the duration when the platform knows it at ready time.
    async fn load(&self, url: &str) -> BackendResult<Option<Duration>>;

    /// Start or resume playback
    async fn play(&self) -> BackendResult<()>;

    /// Pause playback
    async fn pause(&self) -> BackendResult<()>;

    /// Seek to an absolute position
    async fn seek(&self, position: Duration) -> BackendResult<()>;

    /// Stop playback and release the platform resource
    async fn stop(&self) -> BackendResult<()>;

    /// Apply a linear gain (0.0-1.0)
    async fn set_volume(&self, volume: f32) -> BackendResult<()>;

    /// Current status snapshot
    async fn status(&self) -> BackendResult<BackendStatus>;
}

/// Platform hook that constructs one backend per loaded track
pub trait BackendFactory: Send + Sync {
    /// Construct a backend bound to `track`
    fn create(&self, track: &Track) -> BackendResult<Arc<dyn PlaybackBackend>>;
}
