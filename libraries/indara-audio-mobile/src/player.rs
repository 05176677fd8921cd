//! Native track player bridge
//!
//! One player instance is shared by the whole app. The platform side
//! (AVPlayer on iOS, ExoPlayer on Android) implements [`NativeTrackPlayer`];
//! positions cross the bridge as seconds.

use crate::error::Result;
use async_trait::async_trait;
use indara_playback::Track;
use serde::{Deserialize, Serialize};

/// Player state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeState {
    None,
    Loading,
    Ready,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl NativeState {
    /// The source is open and can be started
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// Track description handed to the native player
///
/// Carries the metadata the platform shows on the lock screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTrack {
    pub id: String,
    pub url: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl From<&Track> for NativeTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            url: track.audio_url.clone(),
            title: track.title.clone(),
            artist: track.artist().to_string(),
            artwork: track.artwork_url.clone(),
            duration: track.duration_hint.map(|d| d.as_secs_f64()),
        }
    }
}

#[async_trait]
pub trait NativeTrackPlayer: Send + Sync {
    /// Stop and clear the native queue
    async fn reset(&self) -> Result<()>;

    async fn add(&self, track: NativeTrack) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    /// Volume in 0.0..=1.0
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn position(&self) -> Result<f64>;

    /// Length in seconds, 0 while unknown
    async fn duration(&self) -> Result<f64>;

    async fn state(&self) -> Result<NativeState>;
}
