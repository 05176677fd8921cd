//! `<audio>` element binding for the browser

use crate::element::{MediaElement, MediaEvent, MediaListener};
use crate::error::{MediaError, MediaErrorCode, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{DomException, Event, HtmlAudioElement};

const EVENTS: [&str; 8] = [
    "loadedmetadata",
    "canplay",
    "timeupdate",
    "durationchange",
    "playing",
    "pause",
    "ended",
    "error",
];

type SharedListener = Rc<RefCell<Option<MediaListener>>>;
type Handler = Closure<dyn FnMut(Event)>;

/// A detached `HTMLAudioElement` with its DOM listeners
pub struct HtmlMediaElement {
    audio: HtmlAudioElement,
    listener: SharedListener,
    handlers: Vec<(&'static str, Handler)>,
}

// SAFETY: wasm32 without the atomics target feature runs on a single
// thread, so the element and its Rc state are never shared across threads.
#[allow(unsafe_code)]
unsafe impl Send for HtmlMediaElement {}
#[allow(unsafe_code)]
unsafe impl Sync for HtmlMediaElement {}

impl HtmlMediaElement {
    pub fn new() -> Result<Self> {
        let audio = HtmlAudioElement::new().map_err(|e| MediaError::Unavailable(describe(&e)))?;
        audio.set_preload("auto");

        let listener: SharedListener = Rc::new(RefCell::new(None));
        let mut handlers = Vec::with_capacity(EVENTS.len());

        for name in EVENTS {
            let shared = Rc::clone(&listener);
            let element = audio.clone();
            let handler: Handler = Closure::new(move |_event: Event| {
                dispatch(&shared, translate(name, &element));
            });

            audio
                .add_event_listener_with_callback(name, handler.as_ref().unchecked_ref())
                .map_err(|e| MediaError::Unavailable(describe(&e)))?;
            handlers.push((name, handler));
        }

        Ok(Self {
            audio,
            listener,
            handlers,
        })
    }
}

impl Drop for HtmlMediaElement {
    fn drop(&mut self) {
        for (name, handler) in &self.handlers {
            let _ = self
                .audio
                .remove_event_listener_with_callback(name, handler.as_ref().unchecked_ref());
        }
    }
}

fn translate(name: &str, audio: &HtmlAudioElement) -> MediaEvent {
    match name {
        "loadedmetadata" => MediaEvent::LoadedMetadata,
        "canplay" => MediaEvent::CanPlay,
        "timeupdate" => MediaEvent::TimeUpdate,
        "durationchange" => MediaEvent::DurationChange,
        "playing" => MediaEvent::Playing,
        "pause" => MediaEvent::Pause,
        "ended" => MediaEvent::Ended,
        // Unknown codes are reported as network failures
        _ => MediaEvent::Error(
            audio
                .error()
                .and_then(|error| MediaErrorCode::from_code(error.code()))
                .unwrap_or(MediaErrorCode::Network),
        ),
    }
}

fn dispatch(listener: &SharedListener, event: MediaEvent) {
    let current = listener.borrow().clone();
    if let Some(listener) = current {
        listener(event);
    }
}

fn rejection(error: &JsValue) -> MediaEvent {
    match error.dyn_ref::<DomException>() {
        Some(exception) => MediaEvent::PlayRejected {
            name: exception.name(),
            message: exception.message(),
        },
        None => MediaEvent::PlayRejected {
            name: "Error".to_string(),
            message: describe(error),
        },
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

impl MediaElement for HtmlMediaElement {
    fn set_listener(&self, listener: Option<MediaListener>) {
        *self.listener.borrow_mut() = listener;
    }

    fn set_src(&self, url: &str) {
        self.audio.set_src(url);
    }

    fn remove_src(&self) {
        if let Err(e) = self.audio.remove_attribute("src") {
            debug!(error = %describe(&e), "failed to remove src");
        }
        // Aborts the pending fetch
        self.audio.load();
    }

    fn request_play(&self) {
        match self.audio.play() {
            Ok(promise) => {
                let listener = Rc::clone(&self.listener);
                spawn_local(async move {
                    let event = match JsFuture::from(promise).await {
                        Ok(_) => MediaEvent::PlayResolved,
                        Err(error) => rejection(&error),
                    };
                    dispatch(&listener, event);
                });
            }
            Err(error) => dispatch(&self.listener, rejection(&error)),
        }
    }

    fn pause(&self) {
        if let Err(e) = self.audio.pause() {
            debug!(error = %describe(&e), "pause() threw");
        }
    }

    fn current_time(&self) -> f64 {
        self.audio.current_time()
    }

    fn set_current_time(&self, seconds: f64) {
        self.audio.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.audio.duration()
    }

    fn set_volume(&self, volume: f64) {
        self.audio.set_volume(volume);
    }

    fn paused(&self) -> bool {
        self.audio.paused()
    }

    fn ended(&self) -> bool {
        self.audio.ended()
    }
}
