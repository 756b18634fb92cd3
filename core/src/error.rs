//! Centralized error types for the Chorus core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors onto the user-visible error taxonomy every command reply uses
//! - Implements `ErrorCode` so a command boundary can render consistent codes

use thiserror::Error;

use crate::cache::CacheError;
use crate::pipeline::PipelineError;
use crate::resolver::ResolveError;

/// Trait for error types that provide a machine-readable error code.
pub trait ErrorCode {
    /// Returns a stable, machine-readable error code.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the playback core.
///
/// Variants correspond 1:1 to the error taxonomy surfaced to command callers:
/// caller preconditions, missing resources, bad input, recoverable upstream
/// failures, voice transport failures, and internal invariant violations.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// Caller precondition failed (not in a voice room, wrong room, nothing playing).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The resolver (or a lookup) produced nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A resolver or media-host call failed in a way that's recoverable by
    /// skipping the offending track and continuing.
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    /// Voice connect/move/socket failure.
    #[error("voice transport error: {0}")]
    VoiceTransport(String),

    /// Invariant violation or unexpected failure inside the player mailbox.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for ChorusError {
    fn code(&self) -> &'static str {
        match self {
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::TransientUpstream(_) => "transient_upstream",
            Self::VoiceTransport(_) => "voice_transport",
            Self::Internal(_) => "internal",
        }
    }
}

impl ChorusError {
    /// True when the command boundary should keep the player alive and simply
    /// surface a message, as opposed to a failure that changes player state.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

/// Convenient result alias used throughout the crate.
pub type ChorusResult<T> = Result<T, ChorusError>;

impl From<CacheError> for ChorusError {
    fn from(err: CacheError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<PipelineError> for ChorusError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Io(e) => Self::TransientUpstream(e.to_string()),
            PipelineError::Decode(e) => Self::TransientUpstream(e),
            PipelineError::Stopped => Self::Internal("pipeline stopped unexpectedly".into()),
        }
    }
}

impl From<ResolveError> for ChorusError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidUrl(m) => Self::InvalidArgument(m),
            ResolveError::NotFound(m) => Self::NotFound(m),
            ResolveError::UpstreamUnavailable(m) => Self::TransientUpstream(m),
            ResolveError::PlaylistTooLarge(m) => Self::InvalidArgument(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failed_has_stable_code() {
        let err = ChorusError::PreconditionFailed("not in a voice room".into());
        assert_eq!(err.code(), "precondition_failed");
    }

    #[test]
    fn internal_is_not_recoverable() {
        assert!(!ChorusError::Internal("bug".into()).is_recoverable());
        assert!(ChorusError::NotFound("x".into()).is_recoverable());
    }
}
