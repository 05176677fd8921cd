//! Error types for playback management

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by queue and configuration commands
///
/// Transport commands (play, pause, seek, load) never return these; backend
/// failures surface through [`crate::PlaybackState::last_error`] instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Queue cannot be built from the supplied tracks
    #[error("Invalid queue: {0}")]
    InvalidQueue(String),

    /// Requested track is not part of the queue
    #[error("Track not in queue: {0}")]
    TrackNotInQueue(String),

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Play-count hook failed
    #[error("Play recording failed: {0}")]
    RecordPlay(String),

    /// Session storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures reported by a [`crate::PlaybackBackend`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Source could not be resolved, buffered or decoded
    #[error("Failed to load audio source: {0}")]
    LoadFailure(String),

    /// Platform refused to start playback (autoplay policy, audio focus)
    #[error("Playback rejected by platform: {0}")]
    PlaybackRejected(String),

    /// Any other backend fault
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Caller-visible classification of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PlaybackRejected(_) => ErrorKind::PlaybackRejected,
            Self::LoadFailure(_) | Self::Other(_) => ErrorKind::LoadFailure,
        }
    }
}

/// Status flag exposed to UI after a failed load or play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Track is unplayable; the queue skips past it
    LoadFailure,

    /// Track is fine but the user has to start playback by hand
    PlaybackRejected,
}

impl ErrorKind {
    /// Whether this failure should advance the queue automatically
    pub fn triggers_auto_skip(self) -> bool {
        matches!(self, Self::LoadFailure)
    }
}

/// Session storage errors
///
/// Always swallowed by [`crate::PersistenceBridge`]; never reach playback state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying store could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be encoded or decoded
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;
