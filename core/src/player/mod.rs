//! The per-guild player (component D): the state machine owning the voice
//! connection, queue, volume, loop flags, position tracker, and
//! auto-disconnect timer.
//!
//! The actor runs on one task and drains one `mpsc` channel, which is what
//! gives "all state transitions for a guild are totally ordered" (spec §5)
//! for free: nothing here is shared across tasks except through this one
//! channel. The pipeline's completion callback is translated into a message
//! on that same channel (`Command::PipelineCompleted`) rather than a
//! free-threaded callback, per the design note in spec §9.

pub mod mailbox;
pub mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use crate::cache::FileCache;
use crate::error::{ChorusError, ChorusResult};
use crate::events::{DomainEvent, EventEmitter, PlayerEvent, QueueEvent};
use crate::pipeline::{self, PipelineConfig, PipelineHandle};
use crate::queue::{EnqueuePosition, LoopFlags, Queue};
use crate::resolver::Resolver;
use crate::runtime::TaskSpawner;
use crate::settings::{GuildSettings, SettingsStore};
use crate::track::TrackDescriptor;
use crate::voice::{VoicePlatform, VoiceRoomId};

pub use mailbox::{Command, NowPlaying, PlayOptions, PlayOutcome, QueuePageResult};
pub use state::{PlayState, PlayerStats, PositionTracker};

const MAILBOX_CAPACITY: usize = 128;

/// A clonable handle to a running player actor. All methods send a command
/// through the actor's mailbox and await the typed reply.
#[derive(Clone)]
pub struct PlayerHandle {
    pub guild_id: String,
    tx: mpsc::Sender<Command>,
}

macro_rules! call {
    ($self:expr, $variant:ident { $($field:ident: $value:expr),* $(,)? }) => {{
        let (reply, rx) = oneshot::channel();
        $self
            .tx
            .send(Command::$variant { $($field: $value,)* reply })
            .await
            .map_err(|_| ChorusError::Internal("player actor is gone".into()))?;
        rx.await
            .map_err(|_| ChorusError::Internal("player actor dropped the reply".into()))?
    }};
}

impl PlayerHandle {
    pub async fn connect(&self, room: VoiceRoomId) -> ChorusResult<()> {
        call!(self, Connect { room })
    }

    pub async fn play(&self, query: String, opts: PlayOptions) -> ChorusResult<PlayOutcome> {
        call!(self, Play { query, opts })
    }

    pub async fn skip(&self, n: u32) -> ChorusResult<()> {
        call!(self, Skip { n })
    }

    pub async fn back(&self) -> ChorusResult<()> {
        call!(self, Back {})
    }

    pub async fn pause(&self) -> ChorusResult<()> {
        call!(self, Pause {})
    }

    pub async fn resume(&self) -> ChorusResult<()> {
        call!(self, Resume {})
    }

    pub async fn stop(&self) -> ChorusResult<()> {
        call!(self, Stop {})
    }

    pub async fn disconnect(&self) -> ChorusResult<()> {
        call!(self, Disconnect {})
    }

    pub async fn seek(&self, position_secs: f64) -> ChorusResult<()> {
        call!(self, Seek { position_secs })
    }

    pub async fn seek_forward(&self, delta_secs: f64) -> ChorusResult<()> {
        call!(self, SeekForward { delta_secs })
    }

    pub async fn replay(&self) -> ChorusResult<()> {
        call!(self, Replay {})
    }

    pub async fn set_loop_current(&self, on: bool) -> ChorusResult<()> {
        call!(self, SetLoopCurrent { on })
    }

    pub async fn set_loop_queue(&self, on: bool) -> ChorusResult<()> {
        call!(self, SetLoopQueue { on })
    }

    pub async fn set_volume(&self, level: i32) -> ChorusResult<u8> {
        call!(self, SetVolume { level })
    }

    pub async fn queue_page(&self, page: usize, page_size: usize) -> ChorusResult<QueuePageResult> {
        call!(self, QueuePage { page, page_size })
    }

    pub async fn now_playing(&self) -> ChorusResult<Option<NowPlaying>> {
        call!(self, NowPlaying {})
    }

    pub async fn clear(&self) -> ChorusResult<()> {
        call!(self, Clear {})
    }

    pub async fn remove(&self, position: usize, range: usize) -> ChorusResult<Vec<TrackDescriptor>> {
        call!(self, Remove { position, range })
    }

    pub async fn move_track(&self, from: usize, to: usize) -> ChorusResult<()> {
        call!(self, MoveTrack { from, to })
    }

    pub async fn shuffle(&self) -> ChorusResult<()> {
        call!(self, Shuffle {})
    }

    pub async fn notify_voice_state(&self, listeners_present: bool) {
        let _ = self
            .tx
            .send(Command::VoiceStateUpdate { listeners_present })
            .await;
    }

    pub async fn shutdown(&self) -> ChorusResult<()> {
        call!(self, Shutdown {})
    }

    /// Used by the registry's inactivity sweep; `true` also when the actor
    /// has already exited (safe default: treat it as eligible for removal).
    pub(crate) async fn is_idle_and_stale(&self, threshold: Duration) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::InactivitySnapshot { reply })
            .await
            .is_err()
        {
            return true;
        }
        match rx.await {
            Ok((state, last_activity)) => {
                state == PlayState::Idle && last_activity.elapsed() >= threshold
            }
            Err(_) => true,
        }
    }
}

/// Dependencies a player needs, injected once at creation time by the registry.
pub struct PlayerDeps {
    pub voice: Arc<dyn VoicePlatform>,
    pub resolver: Arc<dyn Resolver>,
    pub cache: Arc<FileCache>,
    pub spawner: Arc<dyn TaskSpawner>,
    pub emitter: Arc<dyn EventEmitter>,
    pub settings_store: Arc<dyn SettingsStore>,
}

/// Spawns a new player actor for `guild_id` on the injected spawner and
/// returns a handle to it.
pub fn spawn_player(guild_id: String, deps: PlayerDeps) -> PlayerHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let spawner = deps.spawner.clone();
    let actor = PlayerActor::new(guild_id.clone(), rx, tx.clone(), deps);
    spawner.spawn(actor.run());
    PlayerHandle { guild_id, tx }
}

struct PlayerActor {
    guild_id: String,
    inbox: mpsc::Receiver<Command>,
    self_tx: mpsc::Sender<Command>,

    voice: Arc<dyn VoicePlatform>,
    resolver: Arc<dyn Resolver>,
    cache: Arc<FileCache>,
    spawner: Arc<dyn TaskSpawner>,
    emitter: Arc<dyn EventEmitter>,
    settings_store: Arc<dyn SettingsStore>,

    settings: GuildSettings,
    queue: Queue,
    loop_flags: LoopFlags,
    state: PlayState,
    position: PositionTracker,
    volume: u8,
    voice_room: Option<VoiceRoomId>,
    pipeline: Option<PipelineHandle>,
    last_activity: Instant,
    stats: PlayerStats,
    /// Bumped on every command that invalidates in-flight work (play, skip,
    /// back, seek, stop, disconnect). A pipeline completion or timer fire
    /// carrying a stale generation is dropped rather than acted on.
    generation: Arc<AtomicU64>,
}

impl PlayerActor {
    fn new(
        guild_id: String,
        inbox: mpsc::Receiver<Command>,
        self_tx: mpsc::Sender<Command>,
        deps: PlayerDeps,
    ) -> Self {
        Self {
            guild_id,
            inbox,
            self_tx,
            voice: deps.voice,
            resolver: deps.resolver,
            cache: deps.cache,
            spawner: deps.spawner,
            emitter: deps.emitter,
            settings_store: deps.settings_store,
            settings: GuildSettings::default(),
            queue: Queue::new(),
            loop_flags: LoopFlags::default(),
            state: PlayState::Idle,
            position: PositionTracker::default(),
            volume: 100,
            voice_room: None,
            pipeline: None,
            last_activity: Instant::now(),
            stats: PlayerStats::default(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.inbox.recv().await {
            let is_shutdown = matches!(cmd, Command::Shutdown { .. });
            self.handle(cmd).await;
            if is_shutdown {
                break;
            }
        }
        log::debug!("player for guild {} exiting", self.guild_id);
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn emit(&self, event: PlayerEvent) {
        self.emitter.emit(DomainEvent::Player(event));
    }

    fn set_state(&mut self, state: PlayState) {
        self.state = state;
        self.emit(PlayerEvent::StateChanged {
            guild_id: self.guild_id.clone(),
            state: state.as_str(),
        });
    }

    async fn handle(&mut self, cmd: Command) {
        self.touch();
        match cmd {
            Command::Connect { room, reply } => {
                let _ = reply.send(self.do_connect(room).await);
            }
            Command::Play { query, opts, reply } => {
                let _ = reply.send(self.do_play(query, opts).await);
            }
            Command::Skip { n, reply } => {
                let _ = reply.send(self.do_skip(n).await);
            }
            Command::Back { reply } => {
                let _ = reply.send(self.do_back().await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.do_pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.do_resume().await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.do_stop().await);
            }
            Command::Disconnect { reply } => {
                let _ = reply.send(self.do_disconnect().await);
            }
            Command::Seek { position_secs, reply } => {
                let _ = reply.send(self.do_seek(position_secs).await);
            }
            Command::SeekForward { delta_secs, reply } => {
                let target = self.position.logical_position(self.state) + delta_secs;
                let _ = reply.send(self.do_seek(target.max(0.0)).await);
            }
            Command::Replay { reply } => {
                let _ = reply.send(self.do_seek(0.0).await);
            }
            Command::SetLoopCurrent { on, reply } => {
                self.loop_flags.set_loop_current(on);
                let _ = reply.send(Ok(()));
            }
            Command::SetLoopQueue { on, reply } => {
                self.loop_flags.set_loop_queue(on);
                let _ = reply.send(Ok(()));
            }
            Command::SetVolume { level, reply } => {
                let clamped = level.clamp(0, 100) as u8;
                self.volume = clamped;
                if let Some(pipeline) = &self.pipeline {
                    pipeline.set_volume(clamped as f32 / 100.0);
                }
                let _ = reply.send(Ok(clamped));
            }
            Command::QueuePage { page, page_size, reply } => {
                let _ = reply.send(Ok(self.do_queue_page(page, page_size)));
            }
            Command::NowPlaying { reply } => {
                let _ = reply.send(Ok(self.do_now_playing()));
            }
            Command::Clear { reply } => {
                self.queue.clear();
                let _ = reply.send(Ok(()));
            }
            Command::Remove { position, range, reply } => {
                let _ = reply.send(self.queue.remove(position, range));
            }
            Command::MoveTrack { from, to, reply } => {
                let _ = reply.send(self.queue.move_track(from, to));
            }
            Command::Shuffle { reply } => {
                self.queue.shuffle();
                let _ = reply.send(Ok(()));
            }
            Command::VoiceStateUpdate { listeners_present } => {
                self.on_voice_state_update(listeners_present);
            }
            Command::PipelineCompleted { generation, result } => {
                self.on_pipeline_completed(generation, result).await;
            }
            Command::AutoDisconnectFired { generation } => {
                self.on_auto_disconnect_fired(generation).await;
            }
            Command::Shutdown { reply } => {
                self.stop_pipeline();
                self.voice.disconnect().await;
                self.voice_room = None;
                let _ = reply.send(Ok(()));
            }
            Command::InactivitySnapshot { reply } => {
                let _ = reply.send((self.state, self.last_activity));
            }
        }
    }

    // ---- connection ----

    async fn do_connect(&mut self, room: VoiceRoomId) -> ChorusResult<()> {
        self.settings = self.settings_store.get_guild_settings(&self.guild_id).await;
        self.volume = self.settings.default_volume;
        self.voice.connect(&room).await?;
        self.voice_room = Some(room.clone());
        self.emit(PlayerEvent::Connected {
            guild_id: self.guild_id.clone(),
            room: room.0,
        });
        Ok(())
    }

    // ---- playback ----

    async fn do_play(&mut self, query: String, opts: PlayOptions) -> ChorusResult<PlayOutcome> {
        let playlist_limit = 100;
        let outcome = self
            .resolver
            .resolve(&query, playlist_limit, opts.split_chapters)
            .await?;
        if outcome.tracks.is_empty() {
            return Err(ChorusError::NotFound(format!("no results for '{query}'")));
        }

        let position = if opts.immediate {
            EnqueuePosition::Next
        } else {
            EnqueuePosition::End
        };
        for track in &outcome.tracks {
            self.queue.enqueue(track.clone(), position);
            self.emitter.emit(DomainEvent::Queue(QueueEvent::Enqueued {
                guild_id: self.guild_id.clone(),
                title: track.title.clone(),
            }));
        }
        if opts.shuffle {
            self.queue.shuffle();
        }

        // A paused player keeps its paused track; enqueueing more tracks
        // never auto-resumes it. Only an idle player starts immediately,
        // unless the caller explicitly asked to skip straight to the track
        // just enqueued.
        if opts.skip_current && matches!(self.state, PlayState::Playing | PlayState::Paused) {
            self.stop_pipeline();
            self.queue.advance(1);
            self.set_state(PlayState::Idle);
        }

        if self.state == PlayState::Idle && self.queue.current().is_some() {
            self.start_current(0.0).await?;
        }

        Ok(PlayOutcome {
            enqueued: outcome.tracks.len(),
            extra_message: outcome.extra_message,
        })
    }

    /// Opens the pipeline for the current track at `seek_secs`, transitioning
    /// `LOADING -> PLAYING`.
    async fn start_current(&mut self, seek_secs: f64) -> ChorusResult<()> {
        let Some(track) = self.queue.current().cloned() else {
            self.set_state(PlayState::Idle);
            self.arm_auto_disconnect();
            return Ok(());
        };

        self.set_state(PlayState::Loading);

        // Bumping the generation here is also what invalidates any
        // auto-disconnect timer armed while idle, without a separate cancel step.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let config = PipelineConfig {
            seek_seconds: seek_secs,
            hard_stop_seconds: None,
            initial_volume_ratio: self.volume as f32 / 100.0,
        };

        // Informational only: logs a decode-thread failure. The signal that
        // actually drives advancing to the next track is the voice
        // platform's own completion callback below, since frames can still
        // be draining through the platform after decode itself has finished.
        let guild_for_log = self.guild_id.clone();
        let on_decode_done = Box::new(move |result: Result<(), pipeline::PipelineError>| {
            if let Err(err) = result {
                log::warn!("decode ended with an error in guild {guild_for_log}: {err}");
            }
        });

        let (frame_source, handle) = pipeline::open_pipeline(
            track.clone(),
            config,
            self.cache.clone(),
            self.spawner.clone(),
            on_decode_done,
        );

        let gen_marker = self.generation.clone();
        let self_tx = self.self_tx.clone();
        let on_playback_complete = Box::new(move |result: Result<(), ChorusError>| {
            if gen_marker.load(Ordering::SeqCst) != generation {
                return; // stale: a newer command has already superseded this run.
            }
            let result = result.map_err(|e| pipeline::PipelineError::Decode(e.to_string()));
            let _ = self_tx.try_send(Command::PipelineCompleted { generation, result });
        });

        self.voice.play(Box::new(frame_source), on_playback_complete);
        self.pipeline = Some(handle);
        self.position.start(seek_secs);
        self.set_state(PlayState::Playing);
        self.emit(PlayerEvent::TrackStarted {
            guild_id: self.guild_id.clone(),
            title: track.title,
        });
        Ok(())
    }

    fn stop_pipeline(&mut self) {
        if let Some(handle) = self.pipeline.take() {
            handle.stop();
            self.voice.stop();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn do_skip(&mut self, n: u32) -> ChorusResult<()> {
        self.stop_pipeline();
        self.queue.advance(n);
        if self.queue.current().is_some() {
            self.start_current(0.0).await
        } else {
            self.set_state(PlayState::Idle);
            self.arm_auto_disconnect();
            Ok(())
        }
    }

    async fn do_back(&mut self) -> ChorusResult<()> {
        self.queue.back()?;
        self.stop_pipeline();
        self.start_current(0.0).await
    }

    fn do_pause(&mut self) -> ChorusResult<()> {
        if self.state != PlayState::Playing {
            return Err(ChorusError::PreconditionFailed("nothing is playing".into()));
        }
        // Routes through stop_pipeline so the generation bump marks the
        // platform's own completion callback (fired once the frame source
        // closes) as stale rather than a real natural end.
        self.stop_pipeline();
        self.position.freeze();
        self.set_state(PlayState::Paused);
        Ok(())
    }

    async fn do_resume(&mut self) -> ChorusResult<()> {
        if self.state != PlayState::Paused {
            return Err(ChorusError::PreconditionFailed("not paused".into()));
        }
        let position = self.position.logical_position(PlayState::Paused);
        self.start_current(position).await
    }

    async fn do_stop(&mut self) -> ChorusResult<()> {
        self.stop_pipeline();
        self.queue = Queue::new();
        self.position.reset();
        self.set_state(PlayState::Idle);
        self.voice.disconnect().await;
        self.voice_room = None;
        Ok(())
    }

    async fn do_disconnect(&mut self) -> ChorusResult<()> {
        // Preserves cursor and position so a later resume starts where we left off.
        if self.state == PlayState::Playing {
            self.do_pause()?;
        }
        self.voice.disconnect().await;
        self.voice_room = None;
        if self.state != PlayState::Paused {
            self.set_state(PlayState::Idle);
        }
        Ok(())
    }

    async fn do_seek(&mut self, position_secs: f64) -> ChorusResult<()> {
        let Some(track) = self.queue.current() else {
            return Err(ChorusError::PreconditionFailed("nothing is current".into()));
        };
        if track.is_live() {
            return Err(ChorusError::InvalidArgument("cannot seek a live track".into()));
        }
        let duration = track.duration_secs.unwrap_or(0) as f64;
        if position_secs < 0.0 || position_secs > duration {
            return Err(ChorusError::InvalidArgument(format!(
                "position {position_secs} out of range 0..={duration}"
            )));
        }

        // Preserve pre-seek state: seeking while PAUSED returns to PAUSED.
        let was_paused = self.state == PlayState::Paused;
        self.stop_pipeline();
        self.start_current(position_secs).await?;
        if was_paused {
            self.do_pause()?;
        }
        Ok(())
    }

    // ---- natural end / timers ----

    async fn on_pipeline_completed(
        &mut self,
        generation: u64,
        result: Result<(), pipeline::PipelineError>,
    ) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return; // superseded by a newer command; discard.
        }
        self.pipeline = None;

        let outcome = if let Err(err) = result {
            // A failed track never re-loops (would spin forever on a
            // permanently broken source); always fall through to the next one.
            log::warn!("pipeline error in guild {}: {err}", self.guild_id);
            self.queue.advance(1);
            self.after_advance().await
        } else {
            self.stats.tracks_played += 1;
            self.stats.total_play_seconds +=
                self.position.logical_position(PlayState::Playing) as u64;

            let last_track = self.queue.current().cloned();
            if self.loop_flags.loop_current && last_track.is_some() {
                self.start_current(0.0).await
            } else if self.loop_flags.loop_queue {
                if let Some(track) = last_track {
                    self.queue.advance(1);
                    self.queue.requeue_to_end(track);
                }
                self.after_advance().await
            } else {
                self.queue.advance(1);
                self.after_advance().await
            }
        };

        if let Err(err) = outcome {
            log::error!("failed to advance player in guild {}: {err}", self.guild_id);
        }
    }

    async fn after_advance(&mut self) -> ChorusResult<()> {
        if self.queue.current().is_some() {
            self.start_current(0.0).await
        } else {
            self.set_state(PlayState::Idle);
            self.arm_auto_disconnect();
            Ok(())
        }
    }

    fn arm_auto_disconnect(&mut self) {
        if !self.settings.auto_disconnect {
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let delay = Duration::from_secs(self.settings.auto_disconnect_delay_secs);
        let self_tx = self.self_tx.clone();
        self.emit(PlayerEvent::AutoDisconnectArmed {
            guild_id: self.guild_id.clone(),
            delay_secs: self.settings.auto_disconnect_delay_secs,
        });
        self.spawner.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = self_tx.send(Command::AutoDisconnectFired { generation }).await;
        });
    }

    async fn on_auto_disconnect_fired(&mut self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation || self.state != PlayState::Idle {
            return;
        }
        self.voice.disconnect().await;
        self.voice_room = None;
        self.emit(PlayerEvent::Disconnected {
            guild_id: self.guild_id.clone(),
        });
    }

    fn on_voice_state_update(&mut self, listeners_present: bool) {
        if !listeners_present && self.settings.leave_if_no_listeners && self.state != PlayState::Idle
        {
            self.stop_pipeline();
            self.queue.clear();
            self.set_state(PlayState::Idle);
            self.arm_auto_disconnect();
        }
    }

    // ---- reads ----

    fn do_queue_page(&self, page: usize, page_size: usize) -> QueuePageResult {
        let page_size = page_size.max(1);
        let upcoming = self.queue.upcoming();
        let total_pages = upcoming.len().div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * page_size;
        let end = (start + page_size).min(upcoming.len());
        let tracks = upcoming
            .get(start..end)
            .unwrap_or(&[])
            .iter()
            .map(|q| q.descriptor.clone())
            .collect();
        QueuePageResult {
            tracks,
            page,
            total_pages,
        }
    }

    fn do_now_playing(&self) -> Option<NowPlaying> {
        let track = self.queue.current()?;
        Some(NowPlaying {
            title: track.title.clone(),
            position_secs: self.position.logical_position(self.state),
            duration_secs: track.duration_secs,
            requester: track.requester.clone(),
            loop_current: self.loop_flags.loop_current,
            loop_queue: self.loop_flags.loop_queue,
            volume: self.volume,
            is_paused: self.state == PlayState::Paused,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_options_default_is_false_everywhere() {
        let opts = PlayOptions::default();
        assert!(!opts.immediate && !opts.shuffle && !opts.split_chapters && !opts.skip_current);
    }
}
