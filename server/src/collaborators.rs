//! Placeholder collaborators for the two services this binary does not
//! itself implement: the Discord gateway connection (`VoicePlatform`) and
//! track resolution (`Resolver`).
//!
//! The command-dispatch gateway is external to this crate (spec §1) — a real
//! deployment supplies a `songbird`-backed [`VoicePlatform`] and a
//! yt-dlp-or-similar [`Resolver`] wired to its own gateway client. These
//! stand-ins let the composition root start and serve `/healthz` on hosts
//! that only need the playback core's HTTP surface (e.g. a sidecar process),
//! and fail clearly if a guild actually tries to play audio through them.

use async_trait::async_trait;
use chorus_core::error::ChorusError;
use chorus_core::resolver::{ResolveError, ResolveOutcome, Resolver};
use chorus_core::voice::{FrameSource, VoicePlatform, VoiceRoomId};

pub struct UnconfiguredResolver;

#[async_trait]
impl Resolver for UnconfiguredResolver {
    async fn resolve(
        &self,
        query: &str,
        _playlist_limit: usize,
        _split_chapters: bool,
    ) -> Result<ResolveOutcome, ResolveError> {
        Err(ResolveError::UpstreamUnavailable(format!(
            "no resolver configured for query {query:?}; this binary was started without a gateway integration"
        )))
    }
}

pub struct UnconfiguredVoicePlatform;

#[async_trait]
impl VoicePlatform for UnconfiguredVoicePlatform {
    async fn connect(&self, room: &VoiceRoomId) -> Result<(), ChorusError> {
        Err(ChorusError::VoiceTransport(format!(
            "no voice platform configured; cannot connect to room {}",
            room.0
        )))
    }

    async fn move_to(&self, room: &VoiceRoomId) -> Result<(), ChorusError> {
        self.connect(room).await
    }

    async fn disconnect(&self) {}

    fn play(
        &self,
        _source: Box<dyn FrameSource>,
        on_complete: Box<dyn FnOnce(Result<(), ChorusError>) + Send>,
    ) {
        on_complete(Err(ChorusError::VoiceTransport(
            "no voice platform configured".into(),
        )));
    }

    fn pause(&self) {}
    fn resume(&self) {}
    fn stop(&self) {}
    fn is_playing(&self) -> bool {
        false
    }
    fn is_paused(&self) -> bool {
        false
    }
    fn set_volume(&self, _ratio: f32) {}
}
