//! Media element abstraction
//!
//! Mirrors the slice of `HTMLMediaElement` the backend needs. The browser
//! binding lives in [`crate::html`]; tests drive the backend through a fake.

use crate::error::MediaErrorCode;
use std::sync::Arc;

/// DOM events the backend listens for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    LoadedMetadata,
    CanPlay,
    TimeUpdate,
    DurationChange,
    Playing,
    Pause,
    Ended,
    Error(MediaErrorCode),

    /// `play()` promise resolved
    PlayResolved,

    /// `play()` promise rejected with a DOMException
    PlayRejected { name: String, message: String },
}

/// Callback an element delivers its events to
pub type MediaListener = Arc<dyn Fn(MediaEvent) + Send + Sync>;

/// An audio element owned by one backend
pub trait MediaElement: Send + Sync {
    /// Replace the event listener; `None` silences the element
    fn set_listener(&self, listener: Option<MediaListener>);

    /// Point the element at `url` and start fetching
    fn set_src(&self, url: &str);

    /// Drop the source and release the network connection
    fn remove_src(&self);

    /// Ask the element to play
    ///
    /// The outcome arrives as [`MediaEvent::PlayResolved`] or
    /// [`MediaEvent::PlayRejected`].
    fn request_play(&self);

    fn pause(&self);

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// Length in seconds; NaN before metadata, infinite for live streams
    fn duration(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn paused(&self) -> bool;

    fn ended(&self) -> bool;
}
