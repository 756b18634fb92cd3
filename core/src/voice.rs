//! The voice-platform interface (spec §6), modeled after the real shape of a
//! Discord voice driver (a sibling example repo's `songbird::Driver`): async
//! connection management, synchronous frame delivery driven by the platform's
//! own send thread, and a completion callback that may fire off the calling
//! task and therefore must be marshaled by the caller rather than trusted to
//! run on any particular context.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ChorusError;

/// Identifies a voice room the bot can attach to within a guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceRoomId(pub String);

/// A source of already-decoded PCM frames the platform's send thread pulls from.
///
/// Implemented by the audio pipeline (see [`crate::pipeline`]); the platform
/// never decodes audio itself, matching the spec's framing of "frame_source".
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Pulls the next frame, or `None` at end of stream.
    async fn next_frame(&mut self) -> Option<Bytes>;
}

/// Capability set a voice platform implementation provides to a player.
///
/// `on_complete(err)` is permitted to run on a thread other than the one that
/// called `play` — per spec §6, the player MUST marshal it onto its own
/// serialized mailbox before acting on it; nothing in this trait does that
/// marshaling for the caller.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    async fn connect(&self, room: &VoiceRoomId) -> Result<(), ChorusError>;
    async fn move_to(&self, room: &VoiceRoomId) -> Result<(), ChorusError>;
    async fn disconnect(&self);

    /// Starts playback from `source`. `on_complete` fires exactly once, with
    /// `Ok(())` on natural end or explicit stop, `Err` on a transport failure.
    fn play(
        &self,
        source: Box<dyn FrameSource>,
        on_complete: Box<dyn FnOnce(Result<(), ChorusError>) + Send>,
    );

    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;

    /// Sets the live output volume ratio (0.0..=1.0) without restarting playback.
    fn set_volume(&self, ratio: f32);

    /// Optional speaking-state hook; implementations that can't observe
    /// per-user speaking state simply never call the registered callback.
    fn on_speaking_state(&self, _callback: Box<dyn Fn(bool) + Send + Sync>) {}
}
