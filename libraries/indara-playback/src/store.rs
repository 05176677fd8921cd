//! Player state store - the UI-facing command surface
//!
//! Wraps [`AudioService`] and [`QueueController`] behind one snapshot
//! channel. A driver task reacts to service events:
//! - track ended: advance the queue, or settle stopped at the end
//! - load failure: wait briefly, then skip within the per-traversal budget
//! - playback started: fire the play-count hook

use crate::error::{ErrorKind, PlaybackError, Result};
use crate::events::{LoadOutcome, ServiceEvent};
use crate::format::{format_time, progress_percent, seconds_to_duration};
use crate::persistence::{PersistenceBridge, SessionSnapshot};
use crate::queue::{AutoAdvance, QueueController};
use crate::service::{AudioService, Subscription};
use crate::types::{PlaybackState, Track};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Hook invoked once per track when playback first starts
///
/// Runs detached from playback; errors are logged and dropped.
#[async_trait]
pub trait PlayRecorder: Send + Sync {
    async fn record_play(&self, track_id: &str, user_id: Option<&str>) -> Result<()>;
}

/// Everything the UI renders
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub queue: Arc<[Track]>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub is_muted: bool,
    pub last_error: Option<ErrorKind>,
}

impl PlayerSnapshot {
    fn compose(state: &PlaybackState, queue: &QueueSlot) -> Self {
        Self {
            current_track: state.track.clone(),
            queue: Arc::clone(&queue.view),
            current_index: queue.controller.current_index(),
            is_playing: state.is_playing,
            is_loading: state.is_loading,
            position: state.position,
            duration: state.duration,
            volume: state.volume,
            is_muted: state.is_muted,
            last_error: state.last_error,
        }
    }

    pub fn position_secs(&self) -> f64 {
        self.position.as_secs_f64()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// 0-100, or 0 while the duration is unknown
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.position, self.duration)
    }

    /// Position as `M:SS`
    pub fn formatted_position(&self) -> String {
        format_time(self.position)
    }

    /// Duration as `M:SS`
    pub fn formatted_duration(&self) -> String {
        format_time(self.duration)
    }
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self::compose(&PlaybackState::default(), &QueueSlot::default())
    }
}

/// Queue plus the shared view handed out in snapshots
#[derive(Debug)]
struct QueueSlot {
    controller: QueueController,
    view: Arc<[Track]>,
}

impl Default for QueueSlot {
    fn default() -> Self {
        Self {
            controller: QueueController::new(),
            view: Arc::from(Vec::new()),
        }
    }
}

/// Single source of truth for the player UI
pub struct PlayerStateStore {
    service: AudioService,
    queue: Mutex<QueueSlot>,
    snapshot: watch::Sender<PlayerSnapshot>,
    recorder: Option<Arc<dyn PlayRecorder>>,
    user_id: Mutex<Option<String>>,
    persistence: Mutex<Option<Arc<PersistenceBridge>>>,
    subscription: Mutex<Option<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlayerStateStore {
    /// Build the store around `service` and start its driver task
    ///
    /// Must be called inside a tokio runtime.
    pub fn init(service: AudioService, recorder: Option<Arc<dyn PlayRecorder>>) -> Arc<Self> {
        let store = Arc::new_cyclic(|weak: &Weak<Self>| {
            let listener = weak.clone();
            let subscription = service.subscribe(move |state| {
                if let Some(store) = listener.upgrade() {
                    store.refresh(state);
                }
            });

            let queue = QueueSlot::default();
            let (snapshot, _) = watch::channel(PlayerSnapshot::compose(&service.state(), &queue));

            Self {
                service,
                queue: Mutex::new(queue),
                snapshot,
                recorder,
                user_id: Mutex::new(None),
                persistence: Mutex::new(None),
                subscription: Mutex::new(Some(subscription)),
                tasks: Mutex::new(Vec::new()),
            }
        });

        let driver = tokio::spawn(Self::drive(Arc::downgrade(&store), store.service.events()));
        store.track_task(driver);
        debug!("player store initialised");
        store
    }

    // ===== Commands =====

    /// Replace the queue and play `track` from it
    ///
    /// Without `queue` the track plays as a single-entry queue. Fails only
    /// when the queue is empty or does not contain `track`.
    pub async fn load_and_play(&self, track: Track, queue: Option<Vec<Track>>) -> Result<LoadOutcome> {
        let tracks = queue.unwrap_or_else(|| vec![track.clone()]);
        let current = self.set_queue_at(tracks, &track.id)?;
        info!(track_id = %current.id, "playing from queue");
        Ok(self.service.load(current, true).await)
    }

    /// Play if paused, pause if playing
    ///
    /// Reads the transport intent at call time, so back-to-back calls
    /// alternate even while a backend call is still in flight.
    pub async fn toggle(&self) {
        if self.service.wants_playing() {
            self.service.pause().await;
            return;
        }

        let failed = self.service.state().last_error == Some(ErrorKind::LoadFailure);
        if self.service.has_resource() && !failed {
            self.service.play().await;
            return;
        }

        let current = self.queue.lock().controller.current().cloned();
        match current {
            Some(track) => {
                self.service.load(track, true).await;
            }
            None => debug!("toggle with nothing queued"),
        }
    }

    /// Seek to `seconds`; non-finite input is ignored, negative clamps to 0
    pub async fn seek_seconds(&self, seconds: f64) {
        if !seconds.is_finite() {
            debug!(seconds, "ignoring non-finite seek");
            return;
        }
        self.service.seek(seconds_to_duration(seconds)).await;
    }

    /// Seek to a fraction (0.0-1.0) of the track
    pub async fn seek_percent(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let duration = self.service.state().duration;
        if duration.is_zero() {
            debug!("seek by percent before duration is known");
            return;
        }
        self.service.seek(duration.mul_f64(fraction.clamp(0.0, 1.0))).await;
    }

    /// Advance to the next queue entry
    ///
    /// Returns false at the end of the queue, where nothing is loaded.
    pub async fn next(&self) -> bool {
        let next = self.with_queue(|queue| {
            queue.restart_traversal();
            queue.next().cloned()
        });
        self.play_queued(next).await
    }

    /// Step back to the previous queue entry
    ///
    /// Returns false at the start of the queue, where nothing is loaded.
    pub async fn previous(&self) -> bool {
        let previous = self.with_queue(|queue| queue.previous().cloned());
        self.play_queued(previous).await
    }

    /// Jump to and play the entry at `index`
    pub async fn skip_to(&self, index: usize) -> Result<LoadOutcome> {
        let track = self.with_queue(|queue| queue.skip_to(index).cloned())?;
        Ok(self.service.load(track, true).await)
    }

    /// Append unless already queued; returns whether it was added
    pub fn add_to_queue(&self, track: Track) -> bool {
        let track_id = track.id.clone();
        let added = self.with_queue(|queue| queue.append_unique(track));
        if !added {
            debug!(track_id = %track_id, "track already queued");
        }
        added
    }

    pub fn remove_from_queue(&self, index: usize) -> Result<Track> {
        self.with_queue(|queue| queue.remove(index))
    }

    pub async fn set_volume(&self, level: f32) {
        self.service.set_volume(level).await;
    }

    pub async fn toggle_mute(&self) {
        self.service.toggle_mute().await;
    }

    pub async fn set_muted(&self, muted: bool) {
        self.service.set_muted(muted).await;
    }

    /// Stop playback and clear the current track; the queue is kept
    pub async fn stop(&self) {
        self.service.stop().await;
    }

    /// Signed-in user passed to the play-count hook
    pub fn set_user(&self, user_id: Option<String>) {
        *self.user_id.lock() = user_id;
    }

    /// Reload a saved session paused at its position
    ///
    /// `track` is the caller's resolution of `session.track_id`. The
    /// position is applied once the load settles.
    pub async fn resume(
        &self,
        session: &SessionSnapshot,
        track: Track,
        queue: Option<Vec<Track>>,
    ) -> Result<LoadOutcome> {
        if track.id != session.track_id {
            return Err(PlaybackError::InvalidOperation(format!(
                "session is for track {}, got {}",
                session.track_id, track.id
            )));
        }

        let tracks = queue.unwrap_or_else(|| vec![track.clone()]);
        let current = self.set_queue_at(tracks, &track.id)?;
        info!(track_id = %current.id, position = session.position_secs, "resuming session");

        let (outcome, ()) = tokio::join!(
            self.service.load(current, false),
            self.service.seek(session.position())
        );
        Ok(outcome)
    }

    // ===== State =====

    /// Current snapshot, read fresh from the service
    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = self.service.state();
        let queue = self.queue.lock();
        PlayerSnapshot::compose(&state, &queue)
    }

    /// Channel of every snapshot change
    pub fn watch(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.subscribe()
    }

    /// Projection of the snapshot that only wakes on change
    pub fn select<T>(&self, project: impl Fn(&PlayerSnapshot) -> T + Send + Sync + 'static) -> Selector<T>
    where
        T: PartialEq + Clone,
    {
        let snapshots = self.snapshot.subscribe();
        let current = project(&snapshots.borrow());
        Selector {
            snapshots,
            project: Box::new(project),
            current,
        }
    }

    /// Snapshot channel updated at most once per `interval`
    ///
    /// For views that do not need every position tick. The task ends when
    /// the returned receiver and its clones are dropped.
    pub fn throttled(&self, interval: Duration) -> watch::Receiver<PlayerSnapshot> {
        let mut source = self.snapshot.subscribe();
        let (tx, rx) = watch::channel(source.borrow_and_update().clone());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if source.changed().await.is_err() {
                    break;
                }
                ticker.tick().await;

                let latest = source.borrow_and_update().clone();
                if tx.send(latest).is_err() {
                    break;
                }
            }
        });
        self.track_task(handle);
        rx
    }

    /// [`Self::throttled`] at the configured `ui_throttle` interval
    pub fn ui_view(&self) -> watch::Receiver<PlayerSnapshot> {
        self.throttled(self.service.config().ui_throttle)
    }

    /// Save snapshots through `bridge` for the lifetime of the store
    pub fn attach_persistence(&self, bridge: Arc<PersistenceBridge>) {
        let handle = Arc::clone(&bridge).spawn(self.snapshot.subscribe());
        *self.persistence.lock() = Some(bridge);
        self.track_task(handle);
    }

    pub fn service(&self) -> &AudioService {
        &self.service
    }

    /// Save the session, stop playback and end all background tasks
    pub async fn teardown(&self) {
        let bridge = self.persistence.lock().take();
        if let Some(bridge) = bridge {
            bridge.save_now(&self.snapshot()).await;
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        drop(self.subscription.lock().take());
        self.service.teardown().await;
        debug!("player store torn down");
    }

    // ===== Internals =====

    fn set_queue_at(&self, tracks: Vec<Track>, track_id: &str) -> Result<Track> {
        if tracks.is_empty() {
            return Err(PlaybackError::InvalidQueue(
                "queue must contain at least one track".to_string(),
            ));
        }
        let index = tracks
            .iter()
            .position(|candidate| candidate.id == track_id)
            .ok_or_else(|| PlaybackError::TrackNotInQueue(track_id.to_string()))?;

        self.with_queue(|queue| queue.set_queue(tracks, index).cloned())
    }

    async fn play_queued(&self, track: Option<Track>) -> bool {
        match track {
            Some(track) => {
                self.service.load(track, true).await;
                true
            }
            None => false,
        }
    }

    /// Mutate the queue, then republish
    fn with_queue<R>(&self, mutate: impl FnOnce(&mut QueueController) -> R) -> R {
        let result = {
            let mut slot = self.queue.lock();
            let result = mutate(&mut slot.controller);
            if slot.controller.tracks() != &*slot.view {
                slot.view = Arc::from(slot.controller.tracks());
            }
            result
        };
        self.refresh(&self.service.state());
        result
    }

    fn refresh(&self, state: &PlaybackState) {
        let next = {
            let queue = self.queue.lock();
            PlayerSnapshot::compose(state, &queue)
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn track_task(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    async fn drive(store: Weak<Self>, mut events: broadcast::Receiver<ServiceEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "player store fell behind service events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(store) = store.upgrade() else {
                break;
            };
            store.on_service_event(event);
        }
    }

    fn on_service_event(self: &Arc<Self>, event: ServiceEvent) {
        if event.generation() != self.service.generation() {
            debug!(track_id = %event.track_id(), generation = event.generation(), "ignoring stale service event");
            return;
        }

        match event {
            ServiceEvent::PlaybackStarted { track_id, .. } => self.record_play(track_id),
            ServiceEvent::TrackEnded { track_id, generation } => {
                let store = Arc::clone(self);
                let handle = tokio::spawn(async move {
                    store.advance_after_end(&track_id, generation).await;
                });
                self.track_task(handle);
            }
            ServiceEvent::TrackFailed {
                track_id,
                generation,
                kind,
            } => {
                if !kind.triggers_auto_skip() {
                    info!(track_id = %track_id, ?kind, "playback needs a user gesture");
                    return;
                }
                let store = Arc::downgrade(self);
                let delay = self.service.config().auto_skip_delay;
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(store) = store.upgrade() {
                        store.skip_failed(&track_id, generation).await;
                    }
                });
                self.track_task(handle);
            }
        }
    }

    async fn advance_after_end(&self, track_id: &str, generation: u64) {
        if self.service.generation() != generation {
            return;
        }

        let next = self.with_queue(|queue| queue.next().cloned());
        match next {
            Some(track) => {
                info!(from = %track_id, to = %track.id, "advancing queue");
                self.service.load(track, true).await;
            }
            None => {
                info!(track_id = %track_id, "queue finished");
                self.service.finish().await;
            }
        }
    }

    async fn skip_failed(&self, track_id: &str, generation: u64) {
        if self.service.generation() != generation {
            debug!(track_id = %track_id, "auto-skip cancelled by a newer command");
            return;
        }

        let decision = self.with_queue(|queue| queue.auto_advance(track_id));
        match decision {
            AutoAdvance::Skip(track) => {
                info!(from = %track_id, to = %track.id, "skipping unplayable track");
                self.service.load(track, true).await;
            }
            AutoAdvance::EndOfQueue => {
                warn!(track_id = %track_id, "unplayable track at end of queue");
                self.service.finish().await;
            }
            AutoAdvance::Exhausted => {
                warn!(track_id = %track_id, "auto-skip budget exhausted");
                self.service.finish().await;
            }
        }
    }

    fn record_play(&self, track_id: String) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let user_id = self.user_id.lock().clone();

        let handle = tokio::spawn(async move {
            if let Err(error) = recorder.record_play(&track_id, user_id.as_deref()).await {
                warn!(track_id = %track_id, %error, "failed to record play");
            }
        });
        self.track_task(handle);
    }
}

impl Drop for PlayerStateStore {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Change-filtered projection of [`PlayerSnapshot`]
pub struct Selector<T> {
    snapshots: watch::Receiver<PlayerSnapshot>,
    project: Box<dyn Fn(&PlayerSnapshot) -> T + Send + Sync>,
    current: T,
}

impl<T: PartialEq + Clone> Selector<T> {
    /// Last projected value
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Wait until the projection changes
    ///
    /// Snapshot changes that leave the projection equal do not wake the
    /// caller. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            if self.snapshots.changed().await.is_err() {
                return None;
            }
            let next = (self.project)(&self.snapshots.borrow_and_update());
            if next != self.current {
                self.current = next.clone();
                return Some(next);
            }
        }
    }
}
