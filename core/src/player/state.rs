//! Player state and position tracking (spec §3, §4.D).

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Loading => "LOADING",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerStats {
    pub tracks_played: u64,
    pub total_play_seconds: u64,
}

/// Tracks `logical_position()` (spec §4.D): `seek_offset + (now - start_time)`
/// while playing, the frozen value at pause time while paused, 0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionTracker {
    seek_offset_secs: f64,
    start_time: Option<Instant>,
    frozen_position_secs: Option<f64>,
}

impl PositionTracker {
    /// Marks playback as starting (or resuming) at `offset_secs`.
    pub fn start(&mut self, offset_secs: f64) {
        self.seek_offset_secs = offset_secs;
        self.start_time = Some(Instant::now());
        self.frozen_position_secs = None;
    }

    /// Freezes the current position; subsequent `logical_position` calls in
    /// `PAUSED` return this frozen value rather than advancing.
    pub fn freeze(&mut self) {
        self.frozen_position_secs = Some(self.raw_position());
        self.start_time = None;
    }

    fn raw_position(&self) -> f64 {
        let elapsed = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.seek_offset_secs + elapsed
    }

    pub fn logical_position(&self, state: PlayState) -> f64 {
        match state {
            PlayState::Playing => self.raw_position(),
            PlayState::Paused => self.frozen_position_secs.unwrap_or(self.seek_offset_secs),
            PlayState::Idle | PlayState::Loading => 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn position_is_monotonic_while_playing() {
        let mut tracker = PositionTracker::default();
        tracker.start(0.0);
        let a = tracker.logical_position(PlayState::Playing);
        sleep(Duration::from_millis(5));
        let b = tracker.logical_position(PlayState::Playing);
        assert!(b >= a);
    }

    #[test]
    fn freeze_holds_position_steady() {
        let mut tracker = PositionTracker::default();
        tracker.start(10.0);
        sleep(Duration::from_millis(5));
        tracker.freeze();
        let a = tracker.logical_position(PlayState::Paused);
        sleep(Duration::from_millis(5));
        let b = tracker.logical_position(PlayState::Paused);
        assert_eq!(a, b);
        assert!(a >= 10.0);
    }
}
