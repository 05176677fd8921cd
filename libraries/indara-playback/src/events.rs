//! Playback Events
//!
//! Discrete signals broadcast by [`crate::AudioService`] next to the
//! continuous [`crate::PlaybackState`] channel:
//! - Playback started for a freshly loaded track
//! - Track played to its end
//! - Track failed to load or play

use crate::error::ErrorKind;

/// Events emitted by the audio service
///
/// `generation` identifies the load that produced the event; consumers
/// compare it with [`crate::AudioService::generation`] to drop stale ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// First successful transition into playing for a loaded track
    PlaybackStarted {
        track_id: String,
        generation: u64,
    },

    /// Track finished playing naturally (reached end)
    TrackEnded {
        track_id: String,
        generation: u64,
    },

    /// Load or playback failed
    TrackFailed {
        track_id: String,
        generation: u64,
        kind: ErrorKind,
    },
}

impl ServiceEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::PlaybackStarted { generation, .. }
            | Self::TrackEnded { generation, .. }
            | Self::TrackFailed { generation, .. } => *generation,
        }
    }

    pub fn track_id(&self) -> &str {
        match self {
            Self::PlaybackStarted { track_id, .. }
            | Self::TrackEnded { track_id, .. }
            | Self::TrackFailed { track_id, .. } => track_id,
        }
    }
}

/// Result of a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Track is loaded (and playing, if autoplay was requested and allowed)
    Loaded,

    /// A later load took over before this one settled
    Superseded,

    /// Load failed; the state carries the failure flag
    Failed(ErrorKind),
}
