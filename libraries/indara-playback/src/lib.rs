//! Indara - Playback Engine
//!
//! Platform-agnostic audio playback core for the Indara client.
//!
//! This crate provides:
//! - `AudioService`: owner of the single platform audio resource
//! - `QueueController`: ordered queue with bounded auto-skip
//! - `PlayerStateStore`: UI command surface with change-filtered snapshots
//! - `PersistenceBridge`: throttled session save and restore
//! - `PlaybackBackend`: capability trait implemented per platform
//!
//! # Architecture
//!
//! `indara-playback` has no platform dependency:
//! - No dependency on web-sys (browser media element)
//! - No dependency on the native track-player bridge
//! - No UI framework
//!
//! Platform adapters (`indara-audio-web`, `indara-audio-mobile`) implement
//! [`PlaybackBackend`] in either push or poll [`Delivery`] mode.
//!
//! # Example: Play a queue
//!
//! ```rust
//! use indara_playback::testing::ScriptedFactory;
//! use indara_playback::{AudioService, PlaybackConfig, PlayerStateStore, Track};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> indara_playback::Result<()> {
//! let service = AudioService::new(ScriptedFactory::push(), PlaybackConfig::default());
//! let store = PlayerStateStore::init(service, None);
//!
//! let a = Track::new("a", "Morning Calm", "https://cdn.indara.app/a.mp3");
//! let b = Track::new("b", "Evening Tide", "https://cdn.indara.app/b.mp3");
//!
//! store.load_and_play(a.clone(), Some(vec![a, b])).await?;
//! assert!(store.snapshot().is_playing);
//!
//! store.next().await;
//! assert_eq!(store.snapshot().current_index, Some(1));
//!
//! store.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Implementing a backend
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use indara_playback::{BackendResult, BackendStatus, Delivery, PlaybackBackend, TransportState};
//! use std::time::Duration;
//!
//! struct NullBackend;
//!
//! #[async_trait]
//! impl PlaybackBackend for NullBackend {
//!     fn delivery(&self) -> Delivery {
//!         Delivery::Poll
//!     }
//!
//!     async fn load(&self, _url: &str) -> BackendResult<Option<Duration>> {
//!         Ok(None)
//!     }
//!
//!     async fn play(&self) -> BackendResult<()> { Ok(()) }
//!     async fn pause(&self) -> BackendResult<()> { Ok(()) }
//!     async fn seek(&self, _position: Duration) -> BackendResult<()> { Ok(()) }
//!     async fn stop(&self) -> BackendResult<()> { Ok(()) }
//!     async fn set_volume(&self, _volume: f32) -> BackendResult<()> { Ok(()) }
//!
//!     async fn status(&self) -> BackendResult<BackendStatus> {
//!         Ok(BackendStatus {
//!             position: Duration::ZERO,
//!             duration: None,
//!             transport: TransportState::Idle,
//!         })
//!     }
//! }
//! ```

mod backend;
mod config;
mod error;
mod events;
pub mod format;
mod persistence;
mod queue;
mod seekbar;
mod service;
mod store;
pub mod testing;
pub mod types;
mod volume;

// Public exports
pub use backend::{
    BackendEvent, BackendFactory, BackendStatus, Delivery, EventSink, PlaybackBackend, TransportState,
};
pub use config::PlaybackConfig;
pub use error::{BackendError, BackendResult, ErrorKind, PlaybackError, Result, StorageError};
pub use events::{LoadOutcome, ServiceEvent};
pub use persistence::{MemoryStorage, PersistenceBridge, SessionSnapshot, SessionStorage};
pub use queue::{AutoAdvance, QueueController};
pub use seekbar::SeekBar;
pub use service::{AudioService, Subscription};
pub use store::{PlayRecorder, PlayerSnapshot, PlayerStateStore, Selector};
pub use types::{PlaybackState, Track, UNKNOWN_ARTIST};
pub use volume::Volume;
