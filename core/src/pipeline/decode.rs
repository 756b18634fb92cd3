//! Symphonia-backed decode + seek, adapted from the decoder shape in a
//! sibling example repo's `player/decoder.rs`. That version only ever opens a
//! local `Path`; this one opens anything that yields a `Read + Seek` byte
//! source, so the same decoder serves both cache-hit files and origin HTTP
//! streams buffered through a seekable adapter.

use std::io::{Read, Seek};
use std::time::Duration;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

pub struct AudioDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration_secs: Option<f64>,
    time_base: Option<TimeBase>,
}

impl AudioDecoder {
    pub fn open<S>(source: S, extension_hint: Option<&str>) -> Result<Self, String>
    where
        S: Read + Seek + Send + Sync + 'static,
    {
        let media_source: Box<dyn MediaSource> = Box::new(ReadOnlySource::new(source));
        let mss = MediaSourceStream::new(media_source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| format!("probe failed: {e}"))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| "no decodable track found".to_string())?;
        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48_000);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);
        let time_base = track.codec_params.time_base;
        let duration_secs = track
            .codec_params
            .n_frames
            .zip(time_base)
            .map(|(frames, tb)| tb.calc_time(frames).seconds as f64);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| format!("unsupported codec: {e}"))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration_secs,
            time_base,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Seeks the decoder input directly rather than reading-and-discarding.
    pub fn seek(&mut self, position_secs: f64) -> Result<(), String> {
        let target = Duration::from_secs_f64(position_secs.max(0.0));
        self.reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: target.into(),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| format!("seek failed: {e}"))?;
        self.decoder.reset();
        Ok(())
    }

    /// Decodes the next packet belonging to this track, invoking `callback`
    /// with interleaved f32 samples. Returns `Ok(None)` at end of stream.
    pub fn decode_next<F>(&mut self, mut callback: F) -> Result<Option<f64>, String>
    where
        F: FnMut(&[f32]),
    {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None)
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(format!("read error: {e}")),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let timestamp = self
                .time_base
                .map(|tb| tb.calc_time(packet.ts()).seconds as f64);

            match self.decoder.decode(&packet) {
                Ok(buf) => {
                    let samples = convert_to_f32(&buf);
                    callback(&samples);
                    return Ok(Some(timestamp.unwrap_or(0.0)));
                }
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(format!("decode error: {e}")),
            }
        }
    }
}

fn convert_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::F32(b) => interleave(b.planes().planes(), b.frames()),
        AudioBufferRef::S16(b) => {
            interleave_converting(b.planes().planes(), b.frames(), |s: &i16| {
                *s as f32 / i16::MAX as f32
            })
        }
        AudioBufferRef::S32(b) => {
            interleave_converting(b.planes().planes(), b.frames(), |s: &i32| {
                *s as f32 / i32::MAX as f32
            })
        }
        AudioBufferRef::U8(b) => interleave_converting(b.planes().planes(), b.frames(), |s: &u8| {
            (*s as f32 - 128.0) / 128.0
        }),
        _ => Vec::new(),
    }
}

fn interleave(planes: &[&[f32]], frames: usize) -> Vec<f32> {
    let channels = planes.len().max(1);
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for plane in planes {
            out.push(plane[frame]);
        }
    }
    out
}

fn interleave_converting<T: Copy>(
    planes: &[&[T]],
    frames: usize,
    convert: impl Fn(&T) -> f32,
) -> Vec<f32> {
    let channels = planes.len().max(1);
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for plane in planes {
            out.push(convert(&plane[frame]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn open_rejects_garbage() {
        let data = Cursor::new(vec![0u8; 64]);
        assert!(AudioDecoder::open(data, Some("mp3")).is_err());
    }
}
