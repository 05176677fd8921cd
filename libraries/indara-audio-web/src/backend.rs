//! Push-mode backend over a media element
//!
//! Element events are translated into [`BackendEvent`]s as they fire, so
//! the service never polls this backend. `load` resolves on `canplay`,
//! `play` resolves with the element's play promise.

use crate::element::{MediaElement, MediaEvent};
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use indara_playback::format::seconds_to_duration;
use indara_playback::{
    BackendError, BackendEvent, BackendFactory, BackendResult, BackendStatus, Delivery, EventSink,
    PlaybackBackend, Track, TransportState,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type LoadReply = oneshot::Sender<Result<Option<Duration>>>;
type PlayReply = oneshot::Sender<Result<()>>;

/// State shared between the backend and the element listener
#[derive(Default)]
struct Shared {
    sink: Mutex<Option<EventSink>>,
    pending_load: Mutex<Option<LoadReply>>,
    pending_play: Mutex<Vec<PlayReply>>,
    ready: AtomicBool,
}

impl Shared {
    fn on_event(&self, element: &dyn MediaElement, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata | MediaEvent::DurationChange => {
                if let Some(duration) = known_duration(element.duration()) {
                    self.forward(BackendEvent::DurationChanged { duration });
                }
            }
            MediaEvent::CanPlay => {
                let duration = known_duration(element.duration());
                let pending = self.pending_load.lock().take();
                if let Some(reply) = pending {
                    let _ = reply.send(Ok(duration));
                }
                if !self.ready.swap(true, Ordering::SeqCst) {
                    self.forward(BackendEvent::Ready { duration });
                }
            }
            MediaEvent::TimeUpdate => self.forward(BackendEvent::TimeUpdate {
                position: position(element.current_time()),
            }),
            MediaEvent::Playing => self.forward(BackendEvent::Playing),
            MediaEvent::Pause => {
                // The element pauses itself right before `ended`
                if !element.ended() {
                    self.forward(BackendEvent::Paused);
                }
            }
            MediaEvent::Ended => self.forward(BackendEvent::Ended),
            MediaEvent::Error(code) => {
                let error = MediaError::Element(code);
                warn!(?code, "media element error");

                let pending = self.pending_load.lock().take();
                if let Some(reply) = pending {
                    let _ = reply.send(Err(error));
                    return;
                }
                self.settle_play(&Err(error.clone()));
                self.forward(BackendEvent::Error(error.into()));
            }
            MediaEvent::PlayResolved => self.settle_play(&Ok(())),
            MediaEvent::PlayRejected { name, message } => {
                debug!(%name, %message, "play() rejected");
                self.settle_play(&Err(MediaError::from_rejection(&name, &message)));
            }
        }
    }

    fn settle_play(&self, outcome: &Result<()>) {
        let pending: Vec<PlayReply> = self.pending_play.lock().drain(..).collect();
        for reply in pending {
            let _ = reply.send(outcome.clone());
        }
    }

    fn forward(&self, event: BackendEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }
}

fn known_duration(seconds: f64) -> Option<Duration> {
    Some(position(seconds)).filter(|duration| !duration.is_zero())
}

fn position(seconds: f64) -> Duration {
    seconds_to_duration(seconds)
}

/// Backend bound to one media element
pub struct MediaElementBackend {
    element: Arc<dyn MediaElement>,
    shared: Arc<Shared>,
}

impl MediaElementBackend {
    pub fn new(element: Arc<dyn MediaElement>) -> Self {
        let shared = Arc::new(Shared::default());

        let listener_shared = Arc::clone(&shared);
        let weak_element = Arc::downgrade(&element);
        element.set_listener(Some(Arc::new(move |event| {
            if let Some(element) = weak_element.upgrade() {
                listener_shared.on_event(element.as_ref(), event);
            }
        })));

        Self { element, shared }
    }
}

#[async_trait]
impl PlaybackBackend for MediaElementBackend {
    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    fn attach(&self, sink: EventSink) {
        *self.shared.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.shared.sink.lock().take();
    }

    async fn load(&self, url: &str) -> BackendResult<Option<Duration>> {
        let (reply, outcome) = oneshot::channel();
        self.shared.ready.store(false, Ordering::SeqCst);
        *self.shared.pending_load.lock() = Some(reply);

        debug!(url, "media element loading");
        self.element.set_src(url);

        match outcome.await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Other("load abandoned".to_string())),
        }
    }

    async fn play(&self) -> BackendResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.shared.pending_play.lock().push(reply);
        self.element.request_play();

        match outcome.await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Other("play abandoned".to_string())),
        }
    }

    async fn pause(&self) -> BackendResult<()> {
        self.element.pause();
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BackendResult<()> {
        self.element.set_current_time(position.as_secs_f64());
        Ok(())
    }

    async fn stop(&self) -> BackendResult<()> {
        self.element.pause();
        self.element.set_listener(None);
        self.element.remove_src();

        self.shared.pending_load.lock().take();
        self.shared.pending_play.lock().clear();
        self.shared.sink.lock().take();
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BackendResult<()> {
        self.element.set_volume(f64::from(volume));
        Ok(())
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        let transport = if self.element.ended() {
            TransportState::Ended
        } else if !self.shared.ready.load(Ordering::SeqCst) {
            TransportState::Loading
        } else if self.element.paused() {
            TransportState::Paused
        } else {
            TransportState::Playing
        };

        Ok(BackendStatus {
            position: position(self.element.current_time()),
            duration: known_duration(self.element.duration()),
            transport,
        })
    }
}

type ElementConstructor = Box<dyn Fn() -> Result<Arc<dyn MediaElement>> + Send + Sync>;

/// Creates one fresh element per loaded track
pub struct MediaBackendFactory {
    create_element: ElementConstructor,
}

impl MediaBackendFactory {
    pub fn new(create_element: impl Fn() -> Result<Arc<dyn MediaElement>> + Send + Sync + 'static) -> Self {
        Self {
            create_element: Box::new(create_element),
        }
    }

    /// Factory backed by real `<audio>` elements
    #[cfg(all(feature = "wasm", target_arch = "wasm32"))]
    pub fn html() -> Self {
        Self::new(|| {
            let element = crate::html::HtmlMediaElement::new()?;
            Ok(Arc::new(element) as Arc<dyn MediaElement>)
        })
    }
}

impl BackendFactory for MediaBackendFactory {
    fn create(&self, track: &Track) -> BackendResult<Arc<dyn PlaybackBackend>> {
        let element = (self.create_element)().map_err(BackendError::from)?;
        debug!(track_id = %track.id, "created media element");
        Ok(Arc::new(MediaElementBackend::new(element)))
    }
}
