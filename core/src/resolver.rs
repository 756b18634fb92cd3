//! The track-resolution interface (spec §6): an external collaborator that
//! maps a user query or URL to playable track descriptors.

use async_trait::async_trait;
use thiserror::Error;

use crate::track::TrackDescriptor;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("playlist too large: {0}")]
    PlaylistTooLarge(String),
}

/// Result of a resolve call: the track descriptors plus an optional
/// human-readable note (e.g. "playlist truncated to 50 tracks").
pub struct ResolveOutcome {
    pub tracks: Vec<TrackDescriptor>,
    pub extra_message: Option<String>,
}

/// Maps a user query to track descriptors. A query may be a direct media
/// URL, a playlist URL (expands to at most `playlist_limit` descriptors), or
/// free text (produces at most one descriptor).
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        query: &str,
        playlist_limit: usize,
        split_chapters: bool,
    ) -> Result<ResolveOutcome, ResolveError>;
}
