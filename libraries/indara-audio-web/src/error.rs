//! Error types for the media element backend

use indara_playback::BackendError;
use thiserror::Error;

/// `MediaError.code` values reported by the element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    /// Fetching was aborted by the user agent
    Aborted = 1,

    /// Network failure while fetching
    Network = 2,

    /// Source could not be decoded
    Decode = 3,

    /// Source format or URL not supported
    SrcNotSupported = 4,
}

impl MediaErrorCode {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Aborted),
            2 => Some(Self::Network),
            3 => Some(Self::Decode),
            4 => Some(Self::SrcNotSupported),
            _ => None,
        }
    }
}

/// Media element errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Element reported a fetch, decode or format error
    #[error("Media element error: {0:?}")]
    Element(MediaErrorCode),

    /// `play()` was refused (autoplay policy)
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    /// `play()` rejected for another reason
    #[error("Play rejected ({name}): {message}")]
    PlayRejected { name: String, message: String },

    /// Element could not be created or was torn down mid-call
    #[error("Media element unavailable: {0}")]
    Unavailable(String),
}

impl MediaError {
    /// Classify a `play()` promise rejection by its DOMException name
    pub fn from_rejection(name: &str, message: &str) -> Self {
        if name == "NotAllowedError" {
            Self::NotAllowed(message.to_string())
        } else {
            Self::PlayRejected {
                name: name.to_string(),
                message: message.to_string(),
            }
        }
    }
}

impl From<MediaError> for BackendError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::NotAllowed(message) => BackendError::PlaybackRejected(message),
            MediaError::Element(_) | MediaError::PlayRejected { .. } => {
                BackendError::LoadFailure(error.to_string())
            }
            MediaError::Unavailable(message) => BackendError::Other(message),
        }
    }
}

/// Result type for media element operations
pub type Result<T> = std::result::Result<T, MediaError>;
