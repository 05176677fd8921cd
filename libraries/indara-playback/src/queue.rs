//! Ordered track queue with a current-position pointer
//!
//! The queue decides successors; it never talks to the audio service.
//! [`crate::PlayerStateStore`] asks it where to go and loads the answer.
//!
//! ```text
//!   [ A ][ B ][ C ][ D ]
//!          ^
//!        current
//!   previous() <- -> next()   (no wraparound at either end)
//! ```

use crate::error::{PlaybackError, Result};
use crate::types::Track;
use std::collections::HashSet;

/// Successor decision after a track failed to load
#[derive(Debug, Clone, PartialEq)]
pub enum AutoAdvance {
    /// Skip to this track
    Skip(Track),

    /// Failed track was the last one
    EndOfQueue,

    /// The failed track was already skipped once during this traversal
    Exhausted,
}

/// Queue of tracks owned by the player store
#[derive(Debug, Clone, Default)]
pub struct QueueController {
    tracks: Vec<Track>,

    /// Pointer into `tracks`; `None` only while the queue is empty or unset
    current: Option<usize>,

    /// Ids auto-skipped since the queue was last replaced
    skipped: HashSet<String>,
}

impl QueueController {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and point at `start_index`
    ///
    /// `start_index` is clamped into the queue. Resets the auto-skip budget.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<&Track> {
        if tracks.is_empty() {
            return Err(PlaybackError::InvalidQueue(
                "queue must contain at least one track".to_string(),
            ));
        }

        let index = start_index.min(tracks.len() - 1);
        self.tracks = tracks;
        self.current = Some(index);
        self.skipped.clear();

        Ok(&self.tracks[index])
    }

    /// Advance the pointer
    ///
    /// Returns the new current track, or `None` at the end of the queue
    /// (pointer unchanged).
    pub fn next(&mut self) -> Option<&Track> {
        let index = match self.current {
            Some(index) if index + 1 < self.tracks.len() => index + 1,
            None if !self.tracks.is_empty() => 0,
            _ => return None,
        };
        self.current = Some(index);
        self.tracks.get(index)
    }

    /// Step the pointer back
    ///
    /// Returns the new current track, or `None` at the start of the queue.
    /// Stepping back starts a new traversal.
    pub fn previous(&mut self) -> Option<&Track> {
        let index = match self.current {
            Some(index) if index > 0 => index - 1,
            _ => return None,
        };
        self.current = Some(index);
        self.skipped.clear();
        self.tracks.get(index)
    }

    pub fn has_next(&self) -> bool {
        match self.current {
            Some(index) => index + 1 < self.tracks.len(),
            None => !self.tracks.is_empty(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current.is_some_and(|index| index > 0)
    }

    /// Append `track` unless an entry with the same id exists
    ///
    /// Returns whether the track was added.
    pub fn append_unique(&mut self, track: Track) -> bool {
        if self.position_of(&track.id).is_some() {
            return false;
        }
        self.tracks.push(track);
        true
    }

    /// Jump to `index`, starting a new traversal
    pub fn skip_to(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.current = Some(index);
        self.skipped.clear();
        Ok(&self.tracks[index])
    }

    /// Remove the entry at `index`
    ///
    /// The current entry cannot be removed; skip away from it first.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }

        if let Some(current) = self.current {
            if index == current {
                return Err(PlaybackError::InvalidOperation(
                    "cannot remove the current queue entry".to_string(),
                ));
            }
            if index < current {
                self.current = Some(current - 1);
            }
        }

        let removed = self.tracks.remove(index);
        self.skipped.remove(&removed.id);
        Ok(removed)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.skipped.clear();
    }

    /// Decide what to do after `failed_id` failed to load
    ///
    /// Each track is skipped at most once per traversal, so a queue of N
    /// broken tracks settles after at most N attempts.
    pub fn auto_advance(&mut self, failed_id: &str) -> AutoAdvance {
        if !self.skipped.insert(failed_id.to_string()) {
            return AutoAdvance::Exhausted;
        }

        // A failure reported for a track that is no longer current moves from the current entry
        match self.next() {
            Some(track) => AutoAdvance::Skip(track.clone()),
            None => AutoAdvance::EndOfQueue,
        }
    }

    /// Forget past auto-skips, as when the user picks a track by hand
    pub fn restart_traversal(&mut self) {
        self.skipped.clear();
    }

    /// Number of auto-skips spent in this traversal
    pub fn skips_used(&self) -> usize {
        self.skipped.len()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == track_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Track {id}"), format!("https://cdn.indara.test/{id}.mp3"))
    }

    fn queue_of(ids: &[&str], start: usize) -> QueueController {
        let mut queue = QueueController::new();
        queue
            .set_queue(ids.iter().map(|id| track(id)).collect(), start)
            .unwrap();
        queue
    }

    #[test]
    fn set_queue_rejects_empty() {
        let mut queue = QueueController::new();
        assert!(matches!(
            queue.set_queue(Vec::new(), 0),
            Err(PlaybackError::InvalidQueue(_))
        ));
        assert!(queue.current().is_none());
    }

    #[test]
    fn set_queue_clamps_start_index() {
        let queue = queue_of(&["a", "b", "c"], 10);
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.current().unwrap().id, "c");
    }

    #[test]
    fn next_stops_at_end() {
        let mut queue = queue_of(&["a", "b"], 0);

        assert_eq!(queue.next().unwrap().id, "b");
        assert!(queue.next().is_none());
        assert_eq!(queue.current_index(), Some(1));
        assert!(!queue.has_next());
    }

    #[test]
    fn previous_stops_at_start() {
        let mut queue = queue_of(&["a", "b"], 1);

        assert_eq!(queue.previous().unwrap().id, "a");
        assert!(queue.previous().is_none());
        assert_eq!(queue.current_index(), Some(0));
        assert!(!queue.has_previous());
    }

    #[test]
    fn append_unique_skips_duplicates() {
        let mut queue = queue_of(&["a"], 0);

        assert!(queue.append_unique(track("b")));
        assert!(!queue.append_unique(track("b")));
        assert!(!queue.append_unique(track("a")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn next_from_unset_pointer_starts_at_head() {
        let mut queue = QueueController::new();
        queue.append_unique(track("a"));

        assert!(queue.current().is_none());
        assert!(queue.has_next());
        assert_eq!(queue.next().unwrap().id, "a");
    }

    #[test]
    fn remove_fixes_up_pointer() {
        let mut queue = queue_of(&["a", "b", "c"], 2);

        let removed = queue.remove(0).unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current().unwrap().id, "c");
    }

    #[test]
    fn remove_rejects_current_and_out_of_bounds() {
        let mut queue = queue_of(&["a", "b"], 0);

        assert!(matches!(queue.remove(0), Err(PlaybackError::InvalidOperation(_))));
        assert!(matches!(queue.remove(5), Err(PlaybackError::IndexOutOfBounds(5))));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn skip_to_validates_index() {
        let mut queue = queue_of(&["a", "b", "c"], 0);

        assert_eq!(queue.skip_to(2).unwrap().id, "c");
        assert!(queue.skip_to(3).is_err());
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn auto_advance_skips_each_track_once() {
        let mut queue = queue_of(&["a", "b", "c"], 0);

        assert_eq!(queue.auto_advance("a"), AutoAdvance::Skip(track("b")));
        assert_eq!(queue.auto_advance("b"), AutoAdvance::Skip(track("c")));
        assert_eq!(queue.auto_advance("c"), AutoAdvance::EndOfQueue);
        assert_eq!(queue.skips_used(), 3);

        assert_eq!(queue.auto_advance("c"), AutoAdvance::Exhausted);
    }

    #[test]
    fn manual_navigation_restarts_traversal() {
        let mut queue = queue_of(&["a", "b", "c"], 0);
        queue.auto_advance("a");
        queue.auto_advance("b");

        queue.skip_to(0).unwrap();
        assert_eq!(queue.skips_used(), 0);
        assert_eq!(queue.auto_advance("a"), AutoAdvance::Skip(track("b")));

        queue.auto_advance("b");
        assert_eq!(queue.previous(), Some(&track("b")));
        assert_eq!(queue.auto_advance("b"), AutoAdvance::Skip(track("c")));

        queue.restart_traversal();
        assert_eq!(queue.skips_used(), 0);
    }

    #[test]
    fn set_queue_resets_skip_budget() {
        let mut queue = queue_of(&["a", "b"], 0);
        queue.auto_advance("a");

        queue.set_queue(vec![track("a"), track("b")], 0).unwrap();
        assert_eq!(queue.skips_used(), 0);
        assert_eq!(queue.auto_advance("a"), AutoAdvance::Skip(track("b")));
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = queue_of(&["a", "b"], 1);
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert!(!queue.has_previous());
    }
}
