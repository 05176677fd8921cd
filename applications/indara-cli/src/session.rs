/// Playback session wiring for the harness
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::file_storage::JsonFileStorage;
use crate::simulated::SimulatedFactory;
use async_trait::async_trait;
use indara_playback::{
    AudioService, BackendFactory, ErrorKind, LoadOutcome, PersistenceBridge, PlayRecorder,
    PlayerSnapshot, PlayerStateStore, ServiceEvent, SessionSnapshot, Track,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Play hook that only logs
pub struct LoggedPlays;

#[async_trait]
impl PlayRecorder for LoggedPlays {
    async fn record_play(&self, track_id: &str, user_id: Option<&str>) -> indara_playback::Result<()> {
        info!(track_id, user = user_id.unwrap_or("anonymous"), "play recorded");
        Ok(())
    }
}

pub struct Session {
    store: Arc<PlayerStateStore>,
    bridge: Arc<PersistenceBridge>,
}

impl Session {
    /// Session over the simulated backend described by `config`
    pub fn new(config: &AppConfig) -> Self {
        let factory = SimulatedFactory::new(
            config.simulator.track_length(),
            config.simulator.load_latency(),
        );
        Self::with_factory(config, Arc::new(factory))
    }

    pub fn with_factory(config: &AppConfig, factory: Arc<dyn BackendFactory>) -> Self {
        let service = AudioService::new(factory, config.playback.clone());
        let store = PlayerStateStore::init(service, Some(Arc::new(LoggedPlays)));

        let storage = Arc::new(JsonFileStorage::new(config.session.file.clone()));
        let bridge = Arc::new(PersistenceBridge::new(storage, &config.playback));
        store.attach_persistence(Arc::clone(&bridge));

        Self { store, bridge }
    }

    pub fn store(&self) -> &Arc<PlayerStateStore> {
        &self.store
    }

    /// Start `queue` at `start` (clamped to the last entry)
    pub async fn play(&self, queue: Vec<Track>, start: usize) -> Result<LoadOutcome> {
        let track = queue
            .get(start.min(queue.len().saturating_sub(1)))
            .cloned()
            .ok_or_else(|| CliError::Queue("queue is empty".to_string()))?;
        Ok(self.store.load_and_play(track, Some(queue)).await?)
    }

    pub async fn saved(&self) -> Option<SessionSnapshot> {
        self.bridge.restore().await
    }

    /// Reload the saved session paused; `None` when nothing was saved
    pub async fn resume(&self, queue: Vec<Track>) -> Result<Option<LoadOutcome>> {
        let Some(saved) = self.saved().await else {
            return Ok(None);
        };

        let track = queue
            .iter()
            .find(|track| track.id == saved.track_id)
            .cloned()
            .ok_or_else(|| {
                CliError::Queue(format!("saved track {} is not in the queue", saved.track_id))
            })?;

        let outcome = self.store.resume(&saved, track, Some(queue)).await?;
        Ok(Some(outcome))
    }

    /// Resolve once the last queue entry has ended or failed to load
    pub async fn wait_for_end_of_queue(&self) {
        let mut events = self.store.service().events();
        loop {
            match events.recv().await {
                Ok(
                    ServiceEvent::TrackEnded { track_id, .. }
                    | ServiceEvent::TrackFailed {
                        track_id,
                        kind: ErrorKind::LoadFailure,
                        ..
                    },
                ) => {
                    if self.is_last(&track_id) {
                        return;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed service events"),
                Err(RecvError::Closed) => return,
            }
        }
    }

    fn is_last(&self, track_id: &str) -> bool {
        self.store
            .snapshot()
            .queue
            .last()
            .map_or(true, |last| last.id == track_id)
    }

    pub async fn shutdown(&self) {
        self.store.teardown().await;
    }
}

/// One-line rendering of the player for the terminal
pub fn status_line(snapshot: &PlayerSnapshot) -> String {
    let Some(track) = &snapshot.current_track else {
        return "[stopped]".to_string();
    };

    let marker = if snapshot.is_loading {
        "[loading]"
    } else if snapshot.is_playing {
        "[playing]"
    } else {
        "[paused]"
    };

    let mut line = format!(
        "{marker} {} - {}  {} / {}",
        track.title,
        track.artist(),
        snapshot.formatted_position(),
        snapshot.formatted_duration()
    );

    if snapshot.is_muted {
        line.push_str("  (muted)");
    }
    match snapshot.last_error {
        Some(ErrorKind::LoadFailure) => line.push_str("  ! unplayable"),
        Some(ErrorKind::PlaybackRejected) => line.push_str("  ! playback blocked"),
        None => {}
    }
    line
}
