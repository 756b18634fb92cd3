//! The player's inbound message types.
//!
//! Per spec §4.D/§9, the pipeline's completion callback runs on a thread that
//! is not the command-dispatch task. Rather than exposing a free-threaded
//! callback to the state machine, it is modeled here as a plain message
//! (`Command::PipelineCompleted`) placed on the same channel as user
//! commands, so the actor loop in `player::mod` never observes it
//! concurrently with a command.

use tokio::sync::oneshot;

use crate::error::ChorusResult;
use crate::pipeline::PipelineError;
use crate::track::TrackDescriptor;
use crate::voice::VoiceRoomId;

pub type Reply<T> = oneshot::Sender<ChorusResult<T>>;

#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub immediate: bool,
    pub shuffle: bool,
    pub split_chapters: bool,
    pub skip_current: bool,
}

#[derive(Debug, Clone)]
pub struct PlayOutcome {
    pub enqueued: usize,
    pub extra_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub title: String,
    pub position_secs: f64,
    pub duration_secs: Option<u64>,
    pub requester: String,
    pub loop_current: bool,
    pub loop_queue: bool,
    pub volume: u8,
    pub is_paused: bool,
}

#[derive(Debug, Clone)]
pub struct QueuePageResult {
    pub tracks: Vec<TrackDescriptor>,
    pub page: usize,
    pub total_pages: usize,
}

pub enum Command {
    Connect {
        room: VoiceRoomId,
        reply: Reply<()>,
    },
    Play {
        query: String,
        opts: PlayOptions,
        reply: Reply<PlayOutcome>,
    },
    Skip {
        n: u32,
        reply: Reply<()>,
    },
    Back {
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    Seek {
        position_secs: f64,
        reply: Reply<()>,
    },
    SeekForward {
        delta_secs: f64,
        reply: Reply<()>,
    },
    Replay {
        reply: Reply<()>,
    },
    SetLoopCurrent {
        on: bool,
        reply: Reply<()>,
    },
    SetLoopQueue {
        on: bool,
        reply: Reply<()>,
    },
    SetVolume {
        level: i32,
        reply: Reply<u8>,
    },
    QueuePage {
        page: usize,
        page_size: usize,
        reply: Reply<QueuePageResult>,
    },
    NowPlaying {
        reply: Reply<Option<NowPlaying>>,
    },
    Clear {
        reply: Reply<()>,
    },
    Remove {
        position: usize,
        range: usize,
        reply: Reply<Vec<TrackDescriptor>>,
    },
    MoveTrack {
        from: usize,
        to: usize,
        reply: Reply<()>,
    },
    Shuffle {
        reply: Reply<()>,
    },
    VoiceStateUpdate {
        listeners_present: bool,
    },
    /// Placed by the pipeline's completion callback; never sent by a command caller.
    PipelineCompleted {
        generation: u64,
        result: Result<(), PipelineError>,
    },
    /// Placed by the auto-disconnect timer task.
    AutoDisconnectFired {
        generation: u64,
    },
    /// Graceful shutdown: stop pipeline, release voice, cancel timers.
    Shutdown {
        reply: Reply<()>,
    },
    /// Read-only snapshot used by the registry's inactivity sweep.
    InactivitySnapshot {
        reply: oneshot::Sender<(crate::player::state::PlayState, std::time::Instant)>,
    },
}
