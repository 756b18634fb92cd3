//! The audio pipeline (component A): turns a resolved track into a stream of
//! PCM frames, applies seek/hard-stop/volume, and signals completion exactly
//! once.
//!
//! The dual-consumer shape (live playback must never block on a background
//! cache fill) is grounded on a sibling module's stream registry, which tees
//! a single incoming byte stream to subscribers without letting one slow
//! consumer stall the other. Here the tee is [`IncrementalSource`]: it pulls
//! the origin response in bounded chunks, decodes from the same buffer it's
//! filling, and forwards each chunk to an on-disk cache file as it arrives —
//! nothing waits for the whole body before the first frame is produced.
//! Decode is grounded on [`decode::AudioDecoder`].

pub mod decode;

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::{CacheSlot, FileCache};
use crate::runtime::TaskSpawner;
use crate::track::TrackDescriptor;
use crate::voice::FrameSource;

/// Tracks longer than this are not eligible for background cache-filling.
pub const CACHE_MAX_TRACK_SECONDS: u64 = 30 * 60;

/// Frame channel depth; bounded so a stalled voice socket applies backpressure
/// to the decode thread instead of growing memory unboundedly.
const FRAME_CHANNEL_CAPACITY: usize = 64;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("stopped")]
    Stopped,
}

pub struct PipelineConfig {
    pub seek_seconds: f64,
    pub hard_stop_seconds: Option<f64>,
    pub initial_volume_ratio: f32,
}

/// A running pipeline: a [`FrameSource`] the voice platform pulls from. Handed
/// to [`crate::voice::VoicePlatform::play`] by value; live controls live on
/// the paired [`PipelineHandle`] instead, since the frame source itself is
/// moved out of the player's hands once playback starts.
pub struct Pipeline {
    frames: mpsc::Receiver<Bytes>,
}

/// Live controls for a pipeline handed off to the voice platform: stop the
/// decode loop promptly, or adjust volume without restarting decode.
#[derive(Clone)]
pub struct PipelineHandle {
    stop_flag: Arc<AtomicBool>,
    volume_bits: Arc<AtomicU32>,
}

impl PipelineHandle {
    /// Requests the decode loop stop promptly; the completion callback still fires.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Applies a new volume ratio (0.0..=1.0) live, without restarting decode.
    pub fn set_volume(&self, ratio: f32) {
        self.volume_bits
            .store(ratio.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl FrameSource for Pipeline {
    async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }
}

/// Opens a pipeline for `track`, resolving input per spec §4.A's order
/// (cache hit first, then origin URL). `on_decode_done` fires exactly once
/// when the decode thread itself exits (success, decode error, or stop
/// request) — it is informational only; the authoritative "this track is
/// done" signal is the completion callback passed to
/// [`crate::voice::VoicePlatform::play`], since frames may still be draining
/// through the platform after decode has finished.
pub fn open_pipeline(
    track: TrackDescriptor,
    config: PipelineConfig,
    cache: Arc<FileCache>,
    spawner: Arc<dyn TaskSpawner>,
    on_decode_done: Box<dyn FnOnce(Result<(), PipelineError>) + Send>,
) -> (Pipeline, PipelineHandle) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let stop_flag = Arc::new(AtomicBool::new(false));
    let volume_bits = Arc::new(AtomicU32::new(config.initial_volume_ratio.to_bits()));

    let worker_stop = stop_flag.clone();
    let worker_volume = volume_bits.clone();

    // Decode is synchronous (symphonia); it runs on a blocking thread so it
    // never stalls the async runtime the player's mailbox relies on.
    let handle = std::thread::spawn(move || {
        run_decode_loop(
            track,
            config.seek_seconds,
            config.hard_stop_seconds,
            worker_volume,
            worker_stop,
            cache,
            tx,
        )
    });

    spawner.spawn(async move {
        // The decode thread is synchronous; bridge its completion back into
        // async-land via a blocking join on a dedicated task.
        let result = tokio::task::spawn_blocking(move || handle.join())
            .await
            .unwrap_or_else(|_| Ok(Err(PipelineError::Decode("decode thread panicked".into()))));
        let result = result.unwrap_or(Err(PipelineError::Decode("decode thread panicked".into())));
        on_decode_done(result);
    });

    (
        Pipeline { frames: rx },
        PipelineHandle {
            stop_flag,
            volume_bits,
        },
    )
}

#[allow(clippy::too_many_arguments)]
fn run_decode_loop(
    track: TrackDescriptor,
    seek_seconds: f64,
    hard_stop_seconds: Option<f64>,
    volume_bits: Arc<AtomicU32>,
    stop_flag: Arc<AtomicBool>,
    cache: Arc<FileCache>,
    tx: mpsc::Sender<Bytes>,
) -> Result<(), PipelineError> {
    let fingerprint = crate::cache::fingerprint_url(&track.media_url);
    let extension_hint = track
        .media_url
        .rsplit('.')
        .next()
        .filter(|ext| ext.len() <= 4)
        .map(str::to_string);

    if let Some(path) = cache.lookup(&fingerprint) {
        let bytes = std::fs::read(&path).map_err(PipelineError::Io)?;
        let mut decoder = decode::AudioDecoder::open(Cursor::new(bytes), extension_hint.as_deref())
            .map_err(PipelineError::Decode)?;
        return stream_decoded_frames(
            &mut decoder,
            seek_seconds,
            hard_stop_seconds,
            &volume_bits,
            &stop_flag,
            &tx,
        );
    }

    let fill_slot = cache_fill_eligibility(&track, seek_seconds)
        .then(|| cache.acquire_slot(&fingerprint))
        .flatten();
    let cache_sink = fill_slot
        .as_ref()
        .and_then(|slot| File::create(&slot.tmp_path).ok());

    let response = match connect_with_retry(&track.media_url, &stop_flag) {
        Ok(response) => response,
        Err(err) => {
            abandon_fill(&cache, fill_slot);
            return Err(err);
        }
    };
    let completed = Arc::new(AtomicBool::new(false));
    let source = IncrementalSource::new(response, stop_flag.clone(), cache_sink, completed.clone());

    let mut decoder = match decode::AudioDecoder::open(source, extension_hint.as_deref()) {
        Ok(decoder) => decoder,
        Err(err) => {
            abandon_fill(&cache, fill_slot);
            return Err(PipelineError::Decode(err));
        }
    };

    let result = stream_decoded_frames(
        &mut decoder,
        seek_seconds,
        hard_stop_seconds,
        &volume_bits,
        &stop_flag,
        &tx,
    );

    if let Some(slot) = fill_slot {
        if completed.load(Ordering::SeqCst) {
            if let Err(err) = cache.commit(slot) {
                log::warn!("background cache fill failed to commit: {err}");
            }
        } else {
            cache.abandon(slot);
        }
    }

    result
}

fn abandon_fill(cache: &FileCache, slot: Option<CacheSlot>) {
    if let Some(slot) = slot {
        cache.abandon(slot);
    }
}

/// A track is eligible for a background cache fill when it's played from the
/// start, has a known (bounded) duration, and isn't a live stream.
fn cache_fill_eligibility(track: &TrackDescriptor, seek_seconds: f64) -> bool {
    seek_seconds == 0.0
        && !track.is_live()
        && track
            .duration_secs
            .is_some_and(|d| d <= CACHE_MAX_TRACK_SECONDS)
}

/// Runs the decode loop against an already-open decoder: applies the initial
/// seek, then decodes and forwards frames until stop, end of stream, or the
/// hard-stop bound is reached.
fn stream_decoded_frames(
    decoder: &mut decode::AudioDecoder,
    seek_seconds: f64,
    hard_stop_seconds: Option<f64>,
    volume_bits: &AtomicU32,
    stop_flag: &AtomicBool,
    tx: &mpsc::Sender<Bytes>,
) -> Result<(), PipelineError> {
    if seek_seconds > 0.0 {
        decoder.seek(seek_seconds).map_err(PipelineError::Decode)?;
    }

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut frame_bytes: Vec<u8> = Vec::new();
        let timestamp = decoder
            .decode_next(|samples| {
                let volume = f32::from_bits(volume_bits.load(Ordering::Relaxed));
                frame_bytes.reserve(samples.len() * 4);
                for sample in samples {
                    let scaled = sample * volume;
                    frame_bytes.extend_from_slice(&scaled.to_le_bytes());
                }
            })
            .map_err(PipelineError::Decode)?;

        let Some(timestamp) = timestamp else {
            return Ok(());
        };

        if let Some(bound) = hard_stop_seconds {
            if timestamp >= bound {
                return Ok(());
            }
        }

        if tx.blocking_send(Bytes::from(frame_bytes)).is_err() {
            // Receiver dropped: treat as an external stop.
            return Ok(());
        }
    }
}

/// Issues the origin request, retrying a failed connection with a capped,
/// exponentially growing delay. Does not buffer the body — the returned
/// response is read incrementally by [`IncrementalSource`].
fn connect_with_retry(
    url: &str,
    stop_flag: &AtomicBool,
) -> Result<reqwest::blocking::Response, PipelineError> {
    let client = reqwest::blocking::Client::new();
    let mut attempt = 0u32;
    let mut delay = Duration::from_millis(250);

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            return Err(PipelineError::Stopped);
        }
        match client.get(url).send() {
            Ok(resp) => return Ok(resp),
            Err(err) if attempt < MAX_RECONNECT_ATTEMPTS => {
                attempt += 1;
                log::warn!("origin connect fault ({attempt}/{MAX_RECONNECT_ATTEMPTS}): {err}");
                std::thread::sleep(delay);
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
            }
            Err(err) => {
                return Err(PipelineError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    err.to_string(),
                )))
            }
        }
    }
}

/// Bytes pulled from the origin response per `read`/`fill_to` iteration.
const CHUNK_SIZE: usize = 64 * 1024;

/// A `Read + Seek` adapter over an HTTP response body that buffers only what
/// it has read so far, rather than the whole body up front. This lets decode
/// start on the first arriving chunk instead of waiting for the download to
/// finish — critical for a live/unbounded source, where waiting for the full
/// body would mean decode never starts at all. `stop_flag` is polled between
/// chunk reads so an external stop aborts the fetch within one `CHUNK_SIZE`
/// read rather than at the end of the whole download. Each chunk pulled from
/// the origin is also written to `cache_sink`, if present, so a cache fill
/// runs off the same bytes as playback instead of a second fetch.
struct IncrementalSource {
    // `reqwest::blocking::Response` is `Send` but not guaranteed `Sync`;
    // `AudioDecoder::open` requires both, the same way `ReadOnlySource`
    // does for any media source it wraps. The mutex is never contended —
    // everything here runs on a single decode thread — it just makes the
    // auto-trait hold.
    body: Mutex<reqwest::blocking::Response>,
    buffer: Vec<u8>,
    pos: usize,
    finished: bool,
    stop_flag: Arc<AtomicBool>,
    cache_sink: Option<File>,
    /// Set once the origin body has been drained to a natural end (not a
    /// stop). Lets the caller tell "fully downloaded" apart from "aborted
    /// partway" after the source has been consumed by the decoder.
    completed: Arc<AtomicBool>,
}

impl IncrementalSource {
    fn new(
        body: reqwest::blocking::Response,
        stop_flag: Arc<AtomicBool>,
        cache_sink: Option<File>,
        completed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            body: Mutex::new(body),
            buffer: Vec::new(),
            pos: 0,
            finished: false,
            stop_flag,
            cache_sink,
            completed,
        }
    }

    fn fill_to(&mut self, target_len: usize) -> io::Result<()> {
        while self.buffer.len() < target_len && !self.finished {
            if self.stop_flag.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "pipeline stopped"));
            }
            let mut chunk = vec![0u8; CHUNK_SIZE];
            let n = self
                .body
                .lock()
                .read(&mut chunk)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            if n == 0 {
                self.finished = true;
                self.completed.store(true, Ordering::SeqCst);
                break;
            }
            chunk.truncate(n);
            if let Some(sink) = self.cache_sink.as_mut() {
                let _ = sink.write_all(&chunk);
            }
            self.buffer.extend_from_slice(&chunk);
        }
        Ok(())
    }
}

impl Read for IncrementalSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill_to(self.pos.saturating_add(buf.len()))?;
        let available = &self.buffer[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for IncrementalSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target: i64 = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => {
                // Only a true tail-seek needs the whole body; every other
                // seek stays within what's already been buffered or extends
                // it by one `fill_to` call.
                self.fill_to(usize::MAX)?;
                self.buffer.len() as i64 + delta
            }
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "negative seek"));
        }
        let target = target as usize;
        self.fill_to(target)?;
        self.pos = target.min(self.buffer.len());
        Ok(self.pos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_max_track_seconds_is_thirty_minutes() {
        assert_eq!(CACHE_MAX_TRACK_SECONDS, 1800);
    }
}
