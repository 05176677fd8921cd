//! Audio service - owner of the single live backend resource
//!
//! Translates transport commands into backend calls and folds pushed
//! events or polled status into one [`PlaybackState`] stream.
//!
//! Every backend resource is tagged with a load generation. Each `load`,
//! `stop` and `unload` bumps the counter, so completions and events that
//! carry an older generation are discarded:
//!
//! ```text
//! load(A) ── gen 1 ── backend A.load() ........................ done (gen 1 != 2, dropped)
//! load(B) ──────────── gen 2 ── release A ── backend B.load() ── done (applied)
//! ```

use crate::{
    backend::{BackendEvent, BackendFactory, BackendStatus, Delivery, EventSink, PlaybackBackend, TransportState},
    config::PlaybackConfig,
    error::{BackendError, ErrorKind},
    events::{LoadOutcome, ServiceEvent},
    types::{PlaybackState, Track},
    volume::Volume,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

type Listener = Arc<dyn Fn(&PlaybackState) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Buffered service events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loading,
    Ready,
    Failed,
}

/// What a seek does with the current resource
enum SeekPlan {
    Queued,
    Apply(u64, Arc<dyn PlaybackBackend>),
    Refused,
}

/// The live backend plus everything bound to its lifetime
struct Resource {
    generation: u64,
    track_id: String,
    backend: Arc<dyn PlaybackBackend>,
    phase: Phase,
    /// Seek issued while loading, applied once the load settles
    pending_seek: Option<Duration>,
    poller: Option<JoinHandle<()>>,
    started: bool,
    ended: bool,
}

impl Resource {
    fn new(generation: u64, track_id: &str, backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            generation,
            track_id: track_id.to_string(),
            backend,
            phase: Phase::Loading,
            pending_seek: None,
            poller: None,
            started: false,
            ended: false,
        }
    }

    /// Stop the poll timer and detach the event sink
    fn halt(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.backend.detach();
    }

    /// Halt synchronously and hand back the backend for async release
    fn release(mut self) -> Arc<dyn PlaybackBackend> {
        self.halt();
        Arc::clone(&self.backend)
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Decrements the in-flight transport counter even if the command future is dropped
struct TransportGuard<'a>(&'a AtomicUsize);

impl<'a> TransportGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for TransportGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    factory: Arc<dyn BackendFactory>,
    config: PlaybackConfig,

    generation: AtomicU64,
    /// Bumped by seeks and transport commands; polled readings that straddle a bump are stale
    command_epoch: AtomicU64,
    transport_ops: AtomicUsize,
    /// Transport intent, set synchronously on command entry
    wants_playing: AtomicBool,

    slot: Mutex<Option<Resource>>,
    volume: Mutex<Volume>,

    state: watch::Sender<PlaybackState>,
    events: broadcast::Sender<ServiceEvent>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
}

/// Owner of the single audio resource
///
/// Cheap to clone; clones share the same resource and state. Commands never
/// fail from the caller's point of view: backend errors turn into
/// [`PlaybackState::last_error`] and [`ServiceEvent::TrackFailed`].
#[derive(Clone)]
pub struct AudioService {
    inner: Arc<Inner>,
}

impl AudioService {
    /// Create a service that builds backends through `factory`
    pub fn new(factory: Arc<dyn BackendFactory>, config: PlaybackConfig) -> Self {
        let volume = Volume::new(config.initial_volume);
        let initial = PlaybackState {
            volume: volume.level(),
            ..PlaybackState::default()
        };
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                factory,
                config,
                generation: AtomicU64::new(0),
                command_epoch: AtomicU64::new(0),
                transport_ops: AtomicUsize::new(0),
                wants_playing: AtomicBool::new(false),
                slot: Mutex::new(None),
                volume: Mutex::new(volume),
                state,
                events,
                listeners: Arc::new(Mutex::new(Vec::new())),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    // ===== Transport =====

    /// Load `track`, replacing whatever is loaded
    ///
    /// The outgoing resource is halted before the new one is created. A later
    /// `load`, `stop` or `unload` supersedes this call; its completion is then
    /// discarded and [`LoadOutcome::Superseded`] returned.
    pub async fn load(&self, track: Track, autoplay: bool) -> LoadOutcome {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.wants_playing.store(autoplay, Ordering::SeqCst);
        debug!(track_id = %track.id, generation, autoplay, "load requested");

        inner.update(|state| {
            state.track = Some(track.clone());
            state.is_loading = true;
            state.is_playing = false;
            state.position = Duration::ZERO;
            state.duration = Duration::ZERO;
            state.last_error = None;
        });

        let created = if track.is_playable() {
            inner.factory.create(&track)
        } else {
            Err(BackendError::LoadFailure(format!(
                "track {} has no audio url",
                track.id
            )))
        };

        let (backend, incoming, create_error) = match created {
            Ok(backend) => {
                backend.attach(Inner::sink_for(&self.inner, generation));
                let resource = Resource::new(generation, &track.id, Arc::clone(&backend));
                (Some(backend), Some(resource), None)
            }
            Err(error) => (None, None, Some(error)),
        };

        let outgoing = match inner.install(generation, incoming) {
            Ok(outgoing) => outgoing,
            Err(rejected) => {
                if let Some(resource) = rejected {
                    drop(resource.release());
                }
                return LoadOutcome::Superseded;
            }
        };

        if let Some(old) = outgoing {
            Inner::release(old).await;
        }

        let Some(backend) = backend else {
            let error = create_error
                .unwrap_or_else(|| BackendError::Other("backend unavailable".to_string()));
            let kind = error.kind();
            inner.fail_unbound(generation, &track.id, error);
            return LoadOutcome::Failed(kind);
        };

        if !inner.is_current(generation) {
            return LoadOutcome::Superseded;
        }

        let result = backend.load(&track.audio_url).await;

        if !inner.is_current(generation) {
            debug!(track_id = %track.id, generation, "discarding superseded load");
            return LoadOutcome::Superseded;
        }

        let duration = match result {
            Ok(duration) => duration,
            Err(error) => {
                let kind = error.kind();
                inner.fail(generation, error);
                return LoadOutcome::Failed(kind);
            }
        };

        // Drain seeks queued behind the load, then promote to ready
        loop {
            let pending = inner.with_resource(generation, |resource| {
                let pending = resource.pending_seek.take();
                if pending.is_none() {
                    resource.phase = Phase::Ready;
                }
                pending
            });

            match pending {
                None => return LoadOutcome::Superseded,
                Some(None) => break,
                Some(Some(target)) => {
                    if let Some(duration) = duration {
                        inner.update_if_current(generation, |state| state.duration = duration);
                    }
                    let target = inner.clamp_seek(target);
                    inner.command_epoch.fetch_add(1, Ordering::SeqCst);
                    if !inner.update_if_current(generation, |state| state.position = target) {
                        return LoadOutcome::Superseded;
                    }
                    if let Err(error) = backend.seek(target).await {
                        warn!(generation, %error, "queued seek failed");
                    }
                }
            }
        }

        if backend.delivery() == Delivery::Poll {
            let mut poller = Some(Inner::spawn_poller(&self.inner, generation, Arc::clone(&backend)));
            inner.with_resource(generation, |resource| resource.poller = poller.take());
            if let Some(orphan) = poller {
                orphan.abort();
                return LoadOutcome::Superseded;
            }
        }

        let gain = inner.volume.lock().gain();
        if let Err(error) = backend.set_volume(gain).await {
            warn!(generation, %error, "failed to apply volume");
        }

        let settled = inner.update_if_current(generation, |state| {
            state.is_loading = false;
            if let Some(duration) = duration {
                state.duration = duration;
            }
        });
        if !settled {
            debug!(track_id = %track.id, generation, "load superseded while applying volume");
            return LoadOutcome::Superseded;
        }
        info!(track_id = %track.id, generation, "track loaded");

        if inner.wants_playing.load(Ordering::SeqCst) {
            self.play_generation(Some(generation)).await;
        }

        match inner.with_resource(generation, |resource| resource.phase) {
            Some(Phase::Failed) => LoadOutcome::Failed(ErrorKind::LoadFailure),
            Some(_) => LoadOutcome::Loaded,
            None => LoadOutcome::Superseded,
        }
    }

    /// Start or resume playback
    ///
    /// While a load is in flight the request is remembered and applied once
    /// the load settles. With nothing loaded this logs and returns.
    pub async fn play(&self) {
        self.play_generation(None).await;
    }

    /// Play the current resource, or only the resource of `expected`
    async fn play_generation(&self, expected: Option<u64>) {
        let inner = &self.inner;
        let Some((generation, backend, phase)) = inner.current() else {
            warn!("play requested with no track loaded");
            return;
        };
        if expected.is_some_and(|expected| expected != generation) {
            return;
        }

        match phase {
            Phase::Failed => {
                warn!(generation, "play requested on a track that failed to load");
                return;
            }
            Phase::Loading => {
                inner.wants_playing.store(true, Ordering::SeqCst);
                debug!(generation, "play deferred until load settles");
                return;
            }
            Phase::Ready => {}
        }

        inner.wants_playing.store(true, Ordering::SeqCst);
        let replay = inner
            .with_resource(generation, |resource| std::mem::take(&mut resource.ended))
            .unwrap_or(false);
        if replay {
            inner.command_epoch.fetch_add(1, Ordering::SeqCst);
            inner.update(|state| state.position = Duration::ZERO);
        }

        let result = {
            let _guard = TransportGuard::enter(&inner.transport_ops);
            inner.command_epoch.fetch_add(1, Ordering::SeqCst);
            let result = backend.play().await;
            inner.command_epoch.fetch_add(1, Ordering::SeqCst);
            result
        };

        if !inner.is_current(generation) {
            return;
        }

        match result {
            Ok(()) => {
                // A pause issued while play was in flight wins
                let playing = inner.wants_playing.load(Ordering::SeqCst);
                inner.update(|state| {
                    state.is_playing = playing;
                    if playing {
                        state.last_error = None;
                    }
                });
                if playing {
                    inner.mark_started(generation);
                }
            }
            Err(error) => inner.fail(generation, error),
        }
    }

    /// Pause playback (idempotent)
    pub async fn pause(&self) {
        let inner = &self.inner;
        inner.wants_playing.store(false, Ordering::SeqCst);

        let Some((generation, backend, phase)) = inner.current() else {
            return;
        };

        if phase != Phase::Ready {
            inner.update(|state| state.is_playing = false);
            return;
        }

        let result = {
            let _guard = TransportGuard::enter(&inner.transport_ops);
            inner.command_epoch.fetch_add(1, Ordering::SeqCst);
            let result = backend.pause().await;
            inner.command_epoch.fetch_add(1, Ordering::SeqCst);
            result
        };

        if !inner.is_current(generation) {
            return;
        }

        if let Err(error) = result {
            warn!(generation, %error, "pause failed");
        }

        if !inner.wants_playing.load(Ordering::SeqCst) {
            inner.update(|state| state.is_playing = false);
        }
    }

    /// Seek to `position`, clamped to `[0, duration]`
    ///
    /// The published position moves immediately. Mid-load seeks are queued
    /// and applied once the load settles.
    pub async fn seek(&self, position: Duration) {
        let inner = &self.inner;
        let target = inner.clamp_seek(position);

        let plan = inner.with_current(|resource| match resource.phase {
            Phase::Loading => {
                resource.pending_seek = Some(position);
                SeekPlan::Queued
            }
            Phase::Ready => SeekPlan::Apply(resource.generation, Arc::clone(&resource.backend)),
            Phase::Failed => SeekPlan::Refused,
        });

        let (generation, backend) = match plan {
            None => {
                warn!("seek requested with no track loaded");
                return;
            }
            Some(SeekPlan::Refused) => {
                warn!("seek requested on a track that failed to load");
                return;
            }
            Some(SeekPlan::Queued) => {
                inner.command_epoch.fetch_add(1, Ordering::SeqCst);
                inner.update(|state| state.position = target);
                debug!(position = ?target, "seek queued behind load");
                return;
            }
            Some(SeekPlan::Apply(generation, backend)) => (generation, backend),
        };

        inner.command_epoch.fetch_add(1, Ordering::SeqCst);
        inner.update(|state| state.position = target);

        if let Err(error) = backend.seek(target).await {
            warn!(generation, %error, "seek failed");
        }
    }

    /// Stop playback, release the backend and clear the current track
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.wants_playing.store(false, Ordering::SeqCst);

        let outgoing = inner.slot.lock().take();
        inner.update(|state| {
            state.track = None;
            state.is_playing = false;
            state.is_loading = false;
            state.position = Duration::ZERO;
            state.duration = Duration::ZERO;
            state.last_error = None;
        });

        if let Some(old) = outgoing {
            debug!(generation = old.generation, "stopping");
            Inner::release(old).await;
        }
    }

    /// Release the backend but keep the track metadata
    pub async fn unload(&self) {
        self.release_keeping_track(false).await;
    }

    /// Release the backend after the queue ran out
    ///
    /// The track stays displayed, rewound to zero.
    pub async fn finish(&self) {
        self.release_keeping_track(true).await;
    }

    async fn release_keeping_track(&self, rewind: bool) {
        let inner = &self.inner;
        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.wants_playing.store(false, Ordering::SeqCst);

        let outgoing = inner.slot.lock().take();
        inner.update(|state| {
            state.is_playing = false;
            state.is_loading = false;
            if rewind {
                state.position = Duration::ZERO;
            }
        });

        if let Some(old) = outgoing {
            debug!(generation = old.generation, "unloading");
            Inner::release(old).await;
        }
    }

    // ===== Volume =====

    /// Set volume (0.0-1.0)
    pub async fn set_volume(&self, level: f32) {
        let gain = self.inner.with_volume(|volume| volume.set_level(level));
        self.inner.apply_gain(gain).await;
    }

    /// Mute or unmute, preserving the volume level
    pub async fn set_muted(&self, muted: bool) {
        let gain = self.inner.with_volume(|volume| {
            if muted {
                volume.mute();
            } else {
                volume.unmute();
            }
        });
        self.inner.apply_gain(gain).await;
    }

    /// Toggle mute state
    pub async fn toggle_mute(&self) {
        let gain = self.inner.with_volume(Volume::toggle_mute);
        self.inner.apply_gain(gain).await;
    }

    /// Gain currently handed to the backend
    pub fn effective_volume(&self) -> f32 {
        self.inner.volume.lock().gain()
    }

    // ===== State Queries =====

    /// Latest published state
    pub fn state(&self) -> PlaybackState {
        self.inner.state.borrow().clone()
    }

    /// Transport intent: true after play, false after pause, stop, end or error
    ///
    /// Updated synchronously when a command starts, so it already reflects
    /// commands whose backend call is still in flight.
    pub fn wants_playing(&self) -> bool {
        self.inner.wants_playing.load(Ordering::SeqCst)
    }

    /// Whether a backend resource is currently held
    pub fn has_resource(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// Generation of the most recent load, stop or unload
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    // ===== Subscriptions =====

    /// Register a listener invoked with the state after every change
    ///
    /// The listener runs synchronously on the task that caused the change and
    /// must not call back into the service. Dropping the returned handle
    /// unsubscribes.
    pub fn subscribe(&self, listener: impl Fn(&PlaybackState) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.inner.listeners),
        }
    }

    /// Latest-value channel of the state
    pub fn watch(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state.subscribe()
    }

    /// Discrete service events
    pub fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.inner.events.subscribe()
    }

    /// Stop playback and drop every listener
    pub async fn teardown(&self) {
        self.stop().await;
        self.inner.listeners.lock().clear();
    }
}

impl Inner {
    // ===== Resource slot =====

    /// Replace the slot contents if `generation` is still the latest
    ///
    /// Returns the previous resource, or hands `incoming` back when superseded.
    fn install(
        &self,
        generation: u64,
        incoming: Option<Resource>,
    ) -> std::result::Result<Option<Resource>, Option<Resource>> {
        let mut slot = self.slot.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(incoming);
        }
        Ok(std::mem::replace(&mut *slot, incoming))
    }

    async fn release(resource: Resource) {
        let generation = resource.generation;
        let backend = resource.release();
        if let Err(error) = backend.stop().await {
            warn!(generation, %error, "failed to release backend");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && self
                .slot
                .lock()
                .as_ref()
                .is_some_and(|resource| resource.generation == generation)
    }

    fn current(&self) -> Option<(u64, Arc<dyn PlaybackBackend>, Phase)> {
        self.slot
            .lock()
            .as_ref()
            .map(|resource| (resource.generation, Arc::clone(&resource.backend), resource.phase))
    }

    fn with_current<R>(&self, f: impl FnOnce(&mut Resource) -> R) -> Option<R> {
        self.slot.lock().as_mut().map(f)
    }

    fn with_resource<R>(&self, generation: u64, f: impl FnOnce(&mut Resource) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(resource) if resource.generation == generation => Some(f(resource)),
            _ => None,
        }
    }

    // ===== State publication =====

    /// Mutate the state; listeners are notified only if something changed
    fn update(&self, mutate: impl FnOnce(&mut PlaybackState)) {
        let changed = self.state.send_if_modified(|state| {
            let before = state.clone();
            mutate(state);
            state.clamp_position();
            *state != before
        });

        if changed {
            self.notify_listeners();
        }
    }

    /// Mutate the state only while `generation` owns the slot
    ///
    /// Returns false, leaving the state untouched, once a newer load or a
    /// stop has taken over.
    fn update_if_current(&self, generation: u64, mutate: impl FnOnce(&mut PlaybackState)) -> bool {
        let changed = {
            let slot = self.slot.lock();
            let owned = self.generation.load(Ordering::SeqCst) == generation
                && slot.as_ref().is_some_and(|resource| resource.generation == generation);
            if !owned {
                return false;
            }
            self.state.send_if_modified(|state| {
                let before = state.clone();
                mutate(state);
                state.clamp_position();
                *state != before
            })
        };

        if changed {
            self.notify_listeners();
        }
        true
    }

    fn notify_listeners(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        if listeners.is_empty() {
            return;
        }

        let state = self.state.borrow().clone();
        for listener in listeners {
            listener(&state);
        }
    }

    fn emit(&self, event: ServiceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn clamp_seek(&self, position: Duration) -> Duration {
        let duration = self.state.borrow().duration;
        if !duration.is_zero() && position > duration {
            debug!(requested = ?position, ?duration, "seek clamped to duration");
            duration
        } else {
            position
        }
    }

    // ===== Volume =====

    fn with_volume(&self, f: impl FnOnce(&mut Volume)) -> f32 {
        let (level, muted, gain) = {
            let mut volume = self.volume.lock();
            f(&mut volume);
            (volume.level(), volume.is_muted(), volume.gain())
        };
        self.update(|state| {
            state.volume = level;
            state.is_muted = muted;
        });
        gain
    }

    async fn apply_gain(&self, gain: f32) {
        let Some((generation, backend, Phase::Ready)) = self.current() else {
            // Applied on load completion
            return;
        };
        if let Err(error) = backend.set_volume(gain).await {
            warn!(generation, %error, "failed to apply volume");
        }
    }

    // ===== Backend signals =====

    fn sink_for(inner: &Arc<Self>, generation: u64) -> EventSink {
        let weak: Weak<Self> = Arc::downgrade(inner);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_backend_event(generation, event);
            }
        })
    }

    fn on_backend_event(&self, generation: u64, event: BackendEvent) {
        if !self.is_current(generation) {
            trace!(generation, ?event, "dropping event from released backend");
            return;
        }

        match event {
            BackendEvent::Ready {
                duration: Some(duration),
            }
            | BackendEvent::DurationChanged { duration } => {
                self.update(|state| state.duration = duration);
            }
            BackendEvent::Ready { duration: None } => {}
            BackendEvent::TimeUpdate { position } => {
                let epoch = self.command_epoch.load(Ordering::SeqCst);
                self.apply_position(position, epoch);
            }
            BackendEvent::Playing => {
                if self.transport_ops.load(Ordering::SeqCst) == 0 {
                    self.wants_playing.store(true, Ordering::SeqCst);
                    self.update(|state| state.is_playing = true);
                    self.mark_started(generation);
                }
            }
            BackendEvent::Paused => {
                if self.transport_ops.load(Ordering::SeqCst) == 0 {
                    self.wants_playing.store(false, Ordering::SeqCst);
                    self.update(|state| state.is_playing = false);
                }
            }
            BackendEvent::Ended => self.finish_track(generation),
            BackendEvent::Error(error) => self.fail(generation, error),
        }
    }

    /// Fold a polled status into the state
    ///
    /// `epoch` is the command epoch read before the backend was queried.
    fn apply_status(&self, generation: u64, status: BackendStatus, epoch: u64) {
        if !self.is_current(generation) {
            return;
        }

        if let Some(duration) = status.duration.filter(|duration| !duration.is_zero()) {
            self.update(|state| state.duration = duration);
        }

        if self.command_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.apply_position(status.position, epoch);

        if self.transport_ops.load(Ordering::SeqCst) > 0 {
            return;
        }

        let is_playing = self.state.borrow().is_playing;
        match status.transport {
            TransportState::Ended => self.finish_track(generation),
            TransportState::Playing if !is_playing => {
                self.on_backend_event(generation, BackendEvent::Playing);
            }
            TransportState::Paused | TransportState::Ready if is_playing => {
                self.on_backend_event(generation, BackendEvent::Paused);
            }
            _ => {}
        }
    }

    /// Positions only move forward between explicit seeks
    fn apply_position(&self, position: Duration, epoch: u64) {
        if self.command_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.update(|state| {
            if position > state.position {
                state.position = position;
            }
        });
    }

    fn mark_started(&self, generation: u64) {
        let started = self
            .with_resource(generation, |resource| {
                if resource.started {
                    None
                } else {
                    resource.started = true;
                    Some(resource.track_id.clone())
                }
            })
            .flatten();

        if let Some(track_id) = started {
            self.emit(ServiceEvent::PlaybackStarted {
                track_id,
                generation,
            });
        }
    }

    fn finish_track(&self, generation: u64) {
        let finished = self
            .with_resource(generation, |resource| {
                if resource.phase != Phase::Ready || resource.ended {
                    None
                } else {
                    resource.ended = true;
                    Some(resource.track_id.clone())
                }
            })
            .flatten();

        let Some(track_id) = finished else {
            return;
        };

        self.wants_playing.store(false, Ordering::SeqCst);
        self.update(|state| {
            state.is_playing = false;
            if !state.duration.is_zero() {
                state.position = state.duration;
            }
        });
        info!(track_id = %track_id, generation, "track ended");
        self.emit(ServiceEvent::TrackEnded {
            track_id,
            generation,
        });
    }

    /// Record a failure of the resource tagged `generation`
    ///
    /// Load failures halt the resource; a rejection leaves it loaded so the
    /// user can start playback by hand.
    fn fail(&self, generation: u64, error: BackendError) {
        let kind = error.kind();
        let failed = self
            .with_resource(generation, |resource| {
                if resource.phase == Phase::Failed {
                    return None;
                }
                if kind == ErrorKind::LoadFailure {
                    resource.phase = Phase::Failed;
                    resource.halt();
                }
                Some(resource.track_id.clone())
            })
            .flatten();

        if let Some(track_id) = failed {
            self.report_failure(generation, track_id, error);
        }
    }

    /// Record a failure that happened before a resource existed
    fn fail_unbound(&self, generation: u64, track_id: &str, error: BackendError) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.report_failure(generation, track_id.to_string(), error);
        }
    }

    fn report_failure(&self, generation: u64, track_id: String, error: BackendError) {
        let kind = error.kind();
        self.wants_playing.store(false, Ordering::SeqCst);
        warn!(track_id = %track_id, generation, ?kind, %error, "playback failure");

        self.update(|state| {
            state.is_loading = false;
            state.is_playing = false;
            state.last_error = Some(kind);
        });
        self.emit(ServiceEvent::TrackFailed {
            track_id,
            generation,
            kind,
        });
    }

    // ===== Polling =====

    fn spawn_poller(inner: &Arc<Self>, generation: u64, backend: Arc<dyn PlaybackBackend>) -> JoinHandle<()> {
        let weak = Arc::downgrade(inner);
        let period = inner.config.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(epoch) = weak
                    .upgrade()
                    .map(|inner| inner.command_epoch.load(Ordering::SeqCst))
                else {
                    break;
                };

                let status = backend.status().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.is_current(generation) {
                    break;
                }

                match status {
                    Ok(status) => inner.apply_status(generation, status, epoch),
                    Err(BackendError::Other(message)) => {
                        debug!(generation, %message, "status poll failed");
                    }
                    Err(error) => {
                        inner.fail(generation, error);
                        break;
                    }
                }
            }
        })
    }
}

/// Listener registration returned by [`AudioService::subscribe`]
///
/// Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for AudioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioService")
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
