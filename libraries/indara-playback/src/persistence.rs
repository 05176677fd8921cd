//! Best-effort session persistence
//!
//! Writes `{track_id, position}` to a host-provided key-value store while
//! playing, throttled to one write per interval plus one on pause and on
//! track change. Storage failures are logged and otherwise ignored.

use crate::config::PlaybackConfig;
use crate::error::StorageError;
use crate::format::seconds_to_duration;
use crate::store::PlayerSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Key-value storage provided by the host (device storage, browser storage)
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Persisted resume point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub track_id: String,
    pub position_secs: f64,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(track_id: impl Into<String>, position: Duration) -> Self {
        Self {
            track_id: track_id.into(),
            position_secs: position.as_secs_f64(),
            saved_at: Utc::now(),
        }
    }

    pub fn position(&self) -> Duration {
        seconds_to_duration(self.position_secs)
    }
}

/// In-memory [`SessionStorage`], for tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Observed {
    track_id: Option<String>,
    is_playing: bool,
    last_write: Option<Instant>,
}

/// Bridges player snapshots to [`SessionStorage`]
pub struct PersistenceBridge {
    storage: Arc<dyn SessionStorage>,
    key: String,
    interval: Duration,
    observed: Mutex<Observed>,
}

impl PersistenceBridge {
    pub fn new(storage: Arc<dyn SessionStorage>, config: &PlaybackConfig) -> Self {
        Self {
            storage,
            key: config.storage_key.clone(),
            interval: config.persist_interval,
            observed: Mutex::new(Observed::default()),
        }
    }

    /// Read the last saved session, if any
    ///
    /// Missing, unreadable and corrupt entries all come back as `None`.
    pub async fn restore(&self) -> Option<SessionSnapshot> {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(key = %self.key, %error, "failed to read saved session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(key = %self.key, %error, "discarding corrupt saved session");
                None
            }
        }
    }

    /// Feed a player snapshot; writes when a save is due
    ///
    /// Returns whether a write was attempted.
    pub async fn observe(&self, snapshot: &PlayerSnapshot) -> bool {
        match self.due(snapshot) {
            Some(record) => {
                self.write(&record).await;
                true
            }
            None => false,
        }
    }

    /// Write the current position regardless of throttling
    pub async fn save_now(&self, snapshot: &PlayerSnapshot) {
        let Some(track) = snapshot.current_track.as_ref() else {
            return;
        };
        self.observed.lock().last_write = Some(Instant::now());
        self.write(&SessionSnapshot::new(track.id.clone(), snapshot.position))
            .await;
    }

    /// Observe every snapshot published on `snapshots` until the channel closes
    pub fn spawn(self: Arc<Self>, mut snapshots: watch::Receiver<PlayerSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                self.observe(&snapshot).await;
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn due(&self, snapshot: &PlayerSnapshot) -> Option<SessionSnapshot> {
        // Positions are meaningless until the load settles
        if snapshot.is_loading {
            return None;
        }

        let mut observed = self.observed.lock();
        let Some(track) = snapshot.current_track.as_ref() else {
            observed.track_id = None;
            observed.is_playing = false;
            return None;
        };

        let now = Instant::now();
        let track_changed = observed.track_id.as_deref() != Some(track.id.as_str());
        let paused = observed.is_playing && !snapshot.is_playing;
        let interval_elapsed = snapshot.is_playing
            && observed
                .last_write
                .map_or(true, |at| now.duration_since(at) >= self.interval);

        observed.track_id = Some(track.id.clone());
        observed.is_playing = snapshot.is_playing;

        if !(track_changed || paused || interval_elapsed) {
            return None;
        }

        observed.last_write = Some(now);
        Some(SessionSnapshot::new(track.id.clone(), snapshot.position))
    }

    async fn write(&self, record: &SessionSnapshot) {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "failed to encode session");
                return;
            }
        };

        match self.storage.set(&self.key, value).await {
            Ok(()) => debug!(track_id = %record.track_id, position = record.position_secs, "session saved"),
            Err(error) => warn!(track_id = %record.track_id, %error, "failed to save session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Track;

    struct BrokenStorage;

    #[async_trait]
    impl SessionStorage for BrokenStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
    }

    fn playing(track_id: &str, secs: u64, is_playing: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            current_track: Some(Track::new(track_id, "Song", "https://cdn.indara.test/a.mp3")),
            is_playing,
            position: Duration::from_secs(secs),
            duration: Duration::from_secs(300),
            ..PlayerSnapshot::default()
        }
    }

    fn bridge(storage: Arc<dyn SessionStorage>) -> PersistenceBridge {
        PersistenceBridge::new(storage, &PlaybackConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_writes_while_playing() {
        let storage = Arc::new(MemoryStorage::new());
        let bridge = bridge(storage.clone());

        assert!(bridge.observe(&playing("a", 1, true)).await);
        assert!(!bridge.observe(&playing("a", 2, true)).await);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(bridge.observe(&playing("a", 6, true)).await);

        let saved = bridge.restore().await.unwrap();
        assert_eq!(saved.track_id, "a");
        assert_eq!(saved.position(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_on_pause_and_track_change() {
        let bridge = bridge(Arc::new(MemoryStorage::new()));

        assert!(bridge.observe(&playing("a", 1, true)).await);
        assert!(bridge.observe(&playing("a", 2, false)).await);
        assert!(!bridge.observe(&playing("a", 2, false)).await);
        assert!(bridge.observe(&playing("b", 0, false)).await);
    }

    #[tokio::test]
    async fn skips_snapshots_while_loading() {
        let bridge = bridge(Arc::new(MemoryStorage::new()));
        let mut snapshot = playing("a", 0, false);
        snapshot.is_loading = true;

        assert!(!bridge.observe(&snapshot).await);
        assert!(bridge.restore().await.is_none());
    }

    #[tokio::test]
    async fn storage_failures_are_swallowed() {
        let bridge = bridge(Arc::new(BrokenStorage));

        assert!(bridge.observe(&playing("a", 3, true)).await);
        assert!(bridge.restore().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_restores_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set("indara.session", "{not json".to_string())
            .await
            .unwrap();

        assert!(bridge(storage).restore().await.is_none());
    }
}
