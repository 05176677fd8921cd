//! Seekbar drag model
//!
//! Drag-move only updates a local preview; the store sees a single seek on
//! release.

use crate::store::{PlayerSnapshot, PlayerStateStore};

/// Local state of one seekbar widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeekBar {
    preview: Option<f64>,
}

impl SeekBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.preview.is_some()
    }

    pub fn begin_drag(&mut self, seconds: f64) {
        self.preview = Some(seconds.max(0.0));
    }

    /// Move the preview; ignored when no drag is active
    pub fn drag_to(&mut self, seconds: f64) {
        if let Some(preview) = self.preview.as_mut() {
            if seconds.is_finite() {
                *preview = seconds.max(0.0);
            }
        }
    }

    /// Drop the drag without seeking
    pub fn cancel(&mut self) {
        self.preview = None;
    }

    /// End the drag and commit the preview position
    ///
    /// Returns the committed position, or `None` if no drag was active.
    pub async fn release(&mut self, store: &PlayerStateStore) -> Option<f64> {
        let target = self.preview.take()?;
        store.seek_seconds(target).await;
        Some(target)
    }

    /// Position to draw: the preview while dragging, the player's otherwise
    pub fn display_seconds(&self, snapshot: &PlayerSnapshot) -> f64 {
        let seconds = self.preview.unwrap_or_else(|| snapshot.position_secs());
        if snapshot.duration.is_zero() {
            seconds
        } else {
            seconds.min(snapshot.duration_secs())
        }
    }
}
