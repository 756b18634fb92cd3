//! The per-guild play queue (component C).
//!
//! Adapted from the queue shape in a sibling example repo's `player/queue.rs`,
//! but with different index conventions: the cursor is 0-based and never
//! negative (an empty queue has cursor 0, matching the invariant this spec
//! commits to), and `move`/`remove` address 1-based positions into the
//! "upcoming" slice rather than absolute vector indices.

use rand::seq::SliceRandom;

use crate::error::ChorusError;
use crate::track::{QueuedTrack, TrackDescriptor};

/// Where a newly enqueued track lands relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePosition {
    End,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopFlags {
    pub loop_current: bool,
    pub loop_queue: bool,
}

impl LoopFlags {
    pub fn set_loop_current(&mut self, on: bool) {
        self.loop_current = on;
        if on {
            self.loop_queue = false;
        }
    }

    pub fn set_loop_queue(&mut self, on: bool) {
        self.loop_queue = on;
        if on {
            self.loop_current = false;
        }
    }
}

/// An ordered sequence of queued tracks plus a cursor identifying "current".
///
/// Invariant: `0 <= cursor <= items.len()`. `cursor == items.len()` means
/// "no current track" (drained or never started).
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<QueuedTrack>,
    cursor: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Inserts `track`. A track belonging to a playlist group is always
    /// appended to the end regardless of the requested position.
    pub fn enqueue(&mut self, track: TrackDescriptor, position: EnqueuePosition) {
        let forced_end = track.playlist_group.is_some();
        let item = QueuedTrack::new(track);
        if forced_end || position == EnqueuePosition::End {
            self.items.push(item);
        } else {
            let insert_at = (self.cursor + 1).min(self.items.len());
            self.items.insert(insert_at, item);
        }
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.items.get(self.cursor).map(|q| &q.descriptor)
    }

    /// Tracks strictly after the cursor.
    pub fn upcoming(&self) -> &[QueuedTrack] {
        if self.cursor + 1 >= self.items.len() {
            &[]
        } else {
            &self.items[self.cursor + 1..]
        }
    }

    pub fn size_after_cursor(&self) -> usize {
        self.upcoming().len()
    }

    pub fn is_empty_after_cursor(&self) -> bool {
        self.upcoming().is_empty()
    }

    /// Advances the cursor by `n` (n >= 1). Clamps to `len` ("no current") if
    /// it would run past the end. Returns the tracks that were skipped over.
    pub fn advance(&mut self, n: u32) -> Vec<TrackDescriptor> {
        let n = n.max(1) as usize;
        let old = self.cursor;
        let new = (old + n).min(self.items.len());
        let skipped = self.items[old..new]
            .iter()
            .map(|q| q.descriptor.clone())
            .collect();
        self.cursor = new;
        skipped
    }

    /// Moves the cursor back one position. Fails at cursor == 0.
    pub fn back(&mut self) -> Result<(), ChorusError> {
        if self.cursor == 0 {
            return Err(ChorusError::PreconditionFailed(
                "already at the start of the queue".into(),
            ));
        }
        self.cursor -= 1;
        Ok(())
    }

    /// Drops everything strictly after the cursor; keeps current.
    pub fn clear(&mut self) {
        let keep = (self.cursor + 1).min(self.items.len());
        self.items.truncate(keep);
    }

    /// Uniformly shuffles the slice strictly after the cursor; current stays in place.
    pub fn shuffle(&mut self) {
        let start = (self.cursor + 1).min(self.items.len());
        self.items[start..].shuffle(&mut rand::thread_rng());
    }

    /// Moves one track from 1-based `from` to 1-based `to`, both positions
    /// into the upcoming slice. A single relocation, not a swap.
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<(), ChorusError> {
        let upcoming_len = self.size_after_cursor();
        if from == 0 || to == 0 || from > upcoming_len || to > upcoming_len {
            return Err(ChorusError::InvalidArgument(format!(
                "position out of range (upcoming has {upcoming_len} tracks)"
            )));
        }
        let base = self.cursor + 1;
        let from_idx = base + from - 1;
        let to_idx = base + to - 1;
        if from_idx == to_idx {
            return Ok(());
        }
        let item = self.items.remove(from_idx);
        self.items.insert(to_idx, item);
        Ok(())
    }

    /// Removes `range` tracks starting at 1-based `position` in the upcoming slice.
    pub fn remove(&mut self, position: usize, range: usize) -> Result<Vec<TrackDescriptor>, ChorusError> {
        let upcoming_len = self.size_after_cursor();
        if position == 0 || range == 0 || position > upcoming_len {
            return Err(ChorusError::InvalidArgument(format!(
                "position out of range (upcoming has {upcoming_len} tracks)"
            )));
        }
        let base = self.cursor + 1;
        let start = base + position - 1;
        let end = (start + range).min(self.items.len());
        let removed: Vec<TrackDescriptor> = self
            .items
            .drain(start..end)
            .map(|q| q.descriptor)
            .collect();
        Ok(removed)
    }

    /// Re-appends `track` to the end (used by loop-queue natural-end handling).
    pub fn requeue_to_end(&mut self, track: TrackDescriptor) {
        self.items.push(QueuedTrack::new(track));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::test_track;

    fn push(q: &mut Queue, title: &str) {
        q.enqueue(test_track(title), EnqueuePosition::End);
    }

    #[test]
    fn cursor_starts_at_zero_when_empty() {
        let q = Queue::new();
        assert_eq!(q.len(), 0);
        assert!(q.current().is_none());
    }

    #[test]
    fn enqueue_next_inserts_after_cursor() {
        let mut q = Queue::new();
        push(&mut q, "a");
        push(&mut q, "c");
        q.enqueue(test_track("b"), EnqueuePosition::Next);
        let titles: Vec<_> = q.upcoming().iter().map(|t| t.descriptor.title.clone()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[test]
    fn advance_past_end_clamps_and_returns_skipped() {
        let mut q = Queue::new();
        push(&mut q, "a");
        push(&mut q, "b");
        let skipped = q.advance(5);
        assert_eq!(skipped.len(), 2);
        assert!(q.current().is_none());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn back_at_zero_fails() {
        let mut q = Queue::new();
        push(&mut q, "a");
        assert!(q.back().is_err());
    }

    #[test]
    fn move_and_remove_against_cursor() {
        // Scenario 6 from the spec's end-to-end scenarios.
        let mut q = Queue::new();
        push(&mut q, "a");
        push(&mut q, "b");
        push(&mut q, "c");
        push(&mut q, "d");
        // current = a, upcoming = [b, c, d]
        q.move_track(3, 1).unwrap(); // upcoming -> [d, b, c]
        q.remove(2, 1).unwrap(); // removes b -> upcoming -> [d, c]
        let titles: Vec<_> = q.upcoming().iter().map(|t| t.descriptor.title.clone()).collect();
        assert_eq!(q.current().unwrap().title, "a");
        assert_eq!(titles, vec!["d", "c"]);
    }

    #[test]
    fn playlist_group_always_appends() {
        let mut q = Queue::new();
        push(&mut q, "a");
        let mut grouped = test_track("b");
        grouped.playlist_group = Some("pl1".into());
        q.enqueue(grouped, EnqueuePosition::Next);
        let titles: Vec<_> = q.upcoming().iter().map(|t| t.descriptor.title.clone()).collect();
        assert_eq!(titles, vec!["b"]);
    }

    #[test]
    fn loop_flags_are_mutually_exclusive() {
        let mut flags = LoopFlags::default();
        flags.set_loop_current(true);
        assert!(flags.loop_current && !flags.loop_queue);
        flags.set_loop_queue(true);
        assert!(flags.loop_queue && !flags.loop_current);
    }
}
