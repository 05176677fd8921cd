//! Errors reported across the native bridge

use indara_playback::BackendError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The player could not open or decode the source
    #[error("Source error: {0}")]
    Source(String),

    /// The platform refused playback (audio session, focus)
    #[error("Playback not permitted: {0}")]
    NotPermitted(String),

    /// The bridge call itself failed
    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl From<NativeError> for BackendError {
    fn from(error: NativeError) -> Self {
        match error {
            NativeError::Source(message) => BackendError::LoadFailure(message),
            NativeError::NotPermitted(message) => BackendError::PlaybackRejected(message),
            NativeError::Bridge(message) => BackendError::Other(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, NativeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use indara_playback::ErrorKind;

    #[test]
    fn maps_to_backend_errors() {
        assert_eq!(
            BackendError::from(NativeError::Source("404".into())).kind(),
            ErrorKind::LoadFailure
        );
        assert_eq!(
            BackendError::from(NativeError::NotPermitted("no focus".into())).kind(),
            ErrorKind::PlaybackRejected
        );
        assert!(matches!(
            BackendError::from(NativeError::Bridge("timeout".into())),
            BackendError::Other(_)
        ));
    }
}
