//! Indara Audio Web - media element backend
//!
//! Implements [`indara_playback::PlaybackBackend`] over an HTML media
//! element. Events are pushed to the service as the element fires them.
//!
//! The element itself sits behind the [`MediaElement`] trait. Enable the
//! `wasm` feature and build for `wasm32` to get the `<audio>` binding:
//!
//! ```ignore
//! use indara_audio_web::MediaBackendFactory;
//! use indara_playback::{AudioService, PlaybackConfig};
//! use std::sync::Arc;
//!
//! let service = AudioService::new(Arc::new(MediaBackendFactory::html()), PlaybackConfig::default());
//! ```

mod backend;
mod element;
mod error;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod html;

pub use backend::{MediaBackendFactory, MediaElementBackend};
pub use element::{MediaElement, MediaEvent, MediaListener};
pub use error::{MediaError, MediaErrorCode, Result};

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use html::HtmlMediaElement;
