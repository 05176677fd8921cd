//! Core types for playback management

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Artist shown for tracks that carry none
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A playable unit
///
/// Callers hand over fully resolved tracks; the engine never turns an id
/// into a URL itself. Immutable once placed in a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier, unique within a queue
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist name (optional)
    pub artist: Option<String>,

    /// Streamable audio URL
    pub audio_url: String,

    /// Cover art URL (optional)
    pub artwork_url: Option<String>,

    /// Advisory duration; the backend reports the authoritative value once loaded
    pub duration_hint: Option<Duration>,
}

impl Track {
    /// Create a track with only the required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            audio_url: audio_url.into(),
            artwork_url: None,
            duration_hint: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_artwork(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }

    pub fn with_duration_hint(mut self, duration: Duration) -> Self {
        self.duration_hint = Some(duration);
        self
    }

    /// Artist for display, falling back to [`UNKNOWN_ARTIST`]
    pub fn artist(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    /// A track without an audio URL can never be loaded
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}

/// Observed playback state
///
/// Written only by [`crate::AudioService`]. Mirrors the backend; never
/// authoritative on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Track bound to the service (kept across `unload`, cleared by `stop`)
    pub track: Option<Track>,

    /// True between a successful play and a pause, stop, end or error
    pub is_playing: bool,

    /// True from a load request until ready-to-play or failure
    pub is_loading: bool,

    /// Current position, never beyond `duration` once that is known
    pub position: Duration,

    /// Track length, zero until the backend reports it
    pub duration: Duration,

    /// User volume level (0.0-1.0), preserved while muted
    pub volume: f32,

    /// Mute state
    pub is_muted: bool,

    /// Failure class of the last load or play attempt on this track
    pub last_error: Option<ErrorKind>,
}

impl PlaybackState {
    pub fn position_secs(&self) -> f64 {
        self.position.as_secs_f64()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.id.as_str())
    }

    /// Re-establish `0 <= position <= duration` once duration is known
    pub(crate) fn clamp_position(&mut self) {
        if !self.duration.is_zero() && self.position > self.duration {
            self.position = self.duration;
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            track: None,
            is_playing: false,
            is_loading: false,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
            is_muted: false,
            last_error: None,
        }
    }
}
