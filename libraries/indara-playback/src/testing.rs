//! Scripted in-memory backend for tests and headless hosts
//!
//! Playback time only moves when [`ScriptedBackend::advance`] is called.
//! Per-track scripts control whether loads succeed, fail or wait on a gate
//! and whether the platform accepts `play`.

use crate::backend::{
    BackendEvent, BackendFactory, BackendStatus, Delivery, EventSink, PlaybackBackend, TransportState,
};
use crate::error::{BackendError, BackendResult};
use crate::types::Track;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default length of scripted tracks
pub const SCRIPTED_DURATION: Duration = Duration::from_secs(180);

/// Holds a scripted load until opened
#[derive(Debug, Clone)]
pub struct LoadGate {
    open: Arc<watch::Sender<bool>>,
}

impl LoadGate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(false);
        Self { open: Arc::new(open) }
    }

    /// Let every load waiting on this gate complete
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    async fn wait(&self) {
        let mut open = self.open.subscribe();
        // The sender lives in self, so this only returns once opened
        let _ = open.wait_for(|open| *open).await;
    }
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum LoadScript {
    Ready,
    Fail(String),
    Gated(LoadGate),
}

#[derive(Debug, Clone)]
pub enum PlayScript {
    Allow,
    Reject(String),
    Fail(String),
}

/// Behaviour of every backend created for one track
#[derive(Debug, Clone)]
pub struct Script {
    pub duration: Duration,
    pub load: LoadScript,
    pub play: PlayScript,
    /// Volume changes wait on this gate when set
    pub volume_gate: Option<LoadGate>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            duration: SCRIPTED_DURATION,
            load: LoadScript::Ready,
            play: PlayScript::Allow,
            volume_gate: None,
        }
    }
}

/// Backend call as recorded by [`ScriptedBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Play,
    Pause,
    Seek(Duration),
    Stop,
    SetVolume(f32),
}

/// Factory handing out [`ScriptedBackend`]s
pub struct ScriptedFactory {
    delivery: Delivery,
    scripts: Mutex<HashMap<String, Script>>,
    created: Mutex<Vec<Arc<ScriptedBackend>>>,
}

impl ScriptedFactory {
    pub fn new(delivery: Delivery) -> Arc<Self> {
        Arc::new(Self {
            delivery,
            scripts: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Factory for event-pushing backends
    pub fn push() -> Arc<Self> {
        Self::new(Delivery::Push)
    }

    /// Factory for backends that must be polled
    pub fn poll() -> Arc<Self> {
        Self::new(Delivery::Poll)
    }

    pub fn script(&self, track_id: &str, script: Script) {
        self.scripts.lock().insert(track_id.to_string(), script);
    }

    fn edit(&self, track_id: &str, f: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock();
        f(scripts.entry(track_id.to_string()).or_default());
    }

    pub fn set_duration(&self, track_id: &str, duration: Duration) {
        self.edit(track_id, |script| script.duration = duration);
    }

    /// Loads of `track_id` fail
    pub fn fail_load(&self, track_id: &str) {
        self.edit(track_id, |script| {
            script.load = LoadScript::Fail(format!("{track_id}: source unreachable"));
        });
    }

    /// Play on `track_id` is refused by the platform
    pub fn reject_play(&self, track_id: &str) {
        self.edit(track_id, |script| {
            script.play = PlayScript::Reject("user gesture required".to_string());
        });
    }

    /// Loads of `track_id` wait until the returned gate opens
    pub fn gate(&self, track_id: &str) -> LoadGate {
        let gate = LoadGate::new();
        let held = gate.clone();
        self.edit(track_id, |script| script.load = LoadScript::Gated(held));
        gate
    }

    /// Volume changes on `track_id` wait until the returned gate opens
    pub fn gate_volume(&self, track_id: &str) -> LoadGate {
        let gate = LoadGate::new();
        let held = gate.clone();
        self.edit(track_id, |script| script.volume_gate = Some(held));
        gate
    }

    pub fn created(&self) -> Vec<Arc<ScriptedBackend>> {
        self.created.lock().clone()
    }

    pub fn latest(&self) -> Option<Arc<ScriptedBackend>> {
        self.created.lock().last().cloned()
    }

    pub fn backends_for(&self, track_id: &str) -> Vec<Arc<ScriptedBackend>> {
        self.created
            .lock()
            .iter()
            .filter(|backend| backend.track_id == track_id)
            .cloned()
            .collect()
    }

    /// Number of backends created so far
    pub fn load_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, track: &Track) -> BackendResult<Arc<dyn PlaybackBackend>> {
        let script = self.scripts.lock().get(&track.id).cloned().unwrap_or_default();
        let backend = Arc::new(ScriptedBackend::new(&track.id, self.delivery, script));
        self.created.lock().push(Arc::clone(&backend));
        Ok(backend)
    }
}

#[derive(Debug, Default)]
struct Transport {
    loaded: bool,
    started: bool,
    playing: bool,
    ended: bool,
    stopped: bool,
    position: Duration,
    volume: Option<f32>,
    calls: Vec<Call>,
}

/// In-memory backend driven by a [`Script`]
pub struct ScriptedBackend {
    track_id: String,
    delivery: Delivery,
    script: Script,
    transport: Mutex<Transport>,
    sink: Mutex<Option<EventSink>>,
    first_sink: Mutex<Option<EventSink>>,
}

impl ScriptedBackend {
    pub fn new(track_id: &str, delivery: Delivery, script: Script) -> Self {
        Self {
            track_id: track_id.to_string(),
            delivery,
            script,
            transport: Mutex::new(Transport::default()),
            sink: Mutex::new(None),
            first_sink: Mutex::new(None),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// Let playback time pass
    ///
    /// Push backends report the new position, and the end when reached.
    pub fn advance(&self, by: Duration) {
        let (position, ended) = {
            let mut transport = self.transport.lock();
            if !transport.playing {
                return;
            }
            transport.position = (transport.position + by).min(self.script.duration);
            if transport.position >= self.script.duration {
                transport.playing = false;
                transport.ended = true;
            }
            (transport.position, transport.ended)
        };

        self.emit(BackendEvent::TimeUpdate { position });
        if ended {
            self.emit(BackendEvent::Ended);
        }
    }

    /// Deliver an event through the attached sink, if any
    pub fn emit(&self, event: BackendEvent) {
        if self.delivery != Delivery::Push {
            return;
        }
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    /// The first sink ever attached, kept even after detach
    ///
    /// Lets tests replay events from a backend the service has released.
    pub fn retained_sink(&self) -> Option<EventSink> {
        self.first_sink.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.transport.lock().calls.clone()
    }

    pub fn position(&self) -> Duration {
        self.transport.lock().position
    }

    pub fn is_playing(&self) -> bool {
        self.transport.lock().playing
    }

    pub fn is_stopped(&self) -> bool {
        self.transport.lock().stopped
    }

    /// Last gain applied by the service
    pub fn volume(&self) -> Option<f32> {
        self.transport.lock().volume
    }

    fn record(&self, call: Call) {
        self.transport.lock().calls.push(call);
    }
}

#[async_trait]
impl PlaybackBackend for ScriptedBackend {
    fn delivery(&self) -> Delivery {
        self.delivery
    }

    fn attach(&self, sink: EventSink) {
        let mut first = self.first_sink.lock();
        if first.is_none() {
            *first = Some(Arc::clone(&sink));
        }
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.sink.lock().take();
    }

    async fn load(&self, url: &str) -> BackendResult<Option<Duration>> {
        self.record(Call::Load(url.to_string()));

        match &self.script.load {
            LoadScript::Ready => {}
            LoadScript::Fail(message) => return Err(BackendError::LoadFailure(message.clone())),
            LoadScript::Gated(gate) => gate.wait().await,
        }

        self.transport.lock().loaded = true;
        self.emit(BackendEvent::Ready {
            duration: Some(self.script.duration),
        });
        Ok(Some(self.script.duration))
    }

    async fn play(&self) -> BackendResult<()> {
        self.record(Call::Play);

        match &self.script.play {
            PlayScript::Allow => {}
            PlayScript::Reject(message) => return Err(BackendError::PlaybackRejected(message.clone())),
            PlayScript::Fail(message) => return Err(BackendError::LoadFailure(message.clone())),
        }

        {
            let mut transport = self.transport.lock();
            if transport.ended {
                transport.ended = false;
                transport.position = Duration::ZERO;
            }
            transport.started = true;
            transport.playing = true;
        }
        self.emit(BackendEvent::Playing);
        Ok(())
    }

    async fn pause(&self) -> BackendResult<()> {
        self.record(Call::Pause);
        self.transport.lock().playing = false;
        self.emit(BackendEvent::Paused);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BackendResult<()> {
        self.record(Call::Seek(position));
        let mut transport = self.transport.lock();
        transport.position = position.min(self.script.duration);
        transport.ended = false;
        Ok(())
    }

    async fn stop(&self) -> BackendResult<()> {
        self.record(Call::Stop);
        let mut transport = self.transport.lock();
        transport.playing = false;
        transport.stopped = true;
        transport.position = Duration::ZERO;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BackendResult<()> {
        self.record(Call::SetVolume(volume));
        if let Some(gate) = &self.script.volume_gate {
            gate.wait().await;
        }
        self.transport.lock().volume = Some(volume);
        Ok(())
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        let transport = self.transport.lock();
        let state = if transport.stopped {
            TransportState::Idle
        } else if !transport.loaded {
            TransportState::Loading
        } else if transport.ended {
            TransportState::Ended
        } else if transport.playing {
            TransportState::Playing
        } else if transport.started {
            TransportState::Paused
        } else {
            TransportState::Ready
        };

        Ok(BackendStatus {
            position: transport.position,
            duration: transport.loaded.then_some(self.script.duration),
            transport: state,
        })
    }
}
