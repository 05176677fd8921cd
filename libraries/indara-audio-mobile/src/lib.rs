//! Indara Audio Mobile - native track player backend
//!
//! Drives the platform audio player (AVPlayer / ExoPlayer) through the
//! [`NativeTrackPlayer`] bridge. The native side has no event channel into
//! Rust, so the backend runs in [`indara_playback::Delivery::Poll`] mode and
//! the service queries it on every tick.

mod backend;
mod error;
mod player;

pub use backend::{TrackPlayerBackend, TrackPlayerFactory, DEFAULT_READY_POLL};
pub use error::{NativeError, Result};
pub use player::{NativeState, NativeTrack, NativeTrackPlayer};
