//! Audio decoder using Symphonia
//!
//! `SymphoniaSource` decodes a byte stream into interleaved f32 samples for
//! the graph's DSP chain. Any format enabled in the workspace's symphonia
//! features is accepted (MP3, AAC/ADTS, MP4, Ogg Vorbis, FLAC, WAV).

use std::io::Read;
use std::num::NonZero;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{MediaError, PlayerError, Result};

const FALLBACK_CHANNELS: NonZero<u16> = match NonZero::new(2) {
    Some(n) => n,
    None => unreachable!(),
};
const FALLBACK_SAMPLE_RATE: NonZero<u32> = match NonZero::new(44100) {
    Some(n) => n,
    None => unreachable!(),
};

/// Convert a symphonia codec type to a human-readable name
pub fn codec_type_to_name(codec: symphonia::core::codecs::CodecType) -> &'static str {
    use symphonia::core::codecs::*;
    match codec {
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_VORBIS => "Vorbis",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM 16-bit",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM 24-bit",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM 32-bit Float",
        _ => "Audio",
    }
}

/// Adapts a non-seekable reader for symphonia, which needs `Send + Sync`.
struct SyncReader<R>(Mutex<R>);

impl<R: Read> Read for SyncReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.0.get_mut() {
            Ok(inner) => inner.read(buf),
            Err(poisoned) => poisoned.into_inner().read(buf),
        }
    }
}

/// What running out of input means for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfInput {
    /// The input has a known length; reaching its end finishes playback
    #[default]
    Finished,
    /// The input is an open-ended live feed; reaching its end means the
    /// connection dropped
    Interrupted,
}

fn probe_error(e: SymphoniaError, end: EndOfInput) -> PlayerError {
    match e {
        SymphoniaError::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            match end {
                EndOfInput::Finished => PlayerError::Decode(
                    "Stream ended before its format was recognized".to_string(),
                ),
                EndOfInput::Interrupted => PlayerError::Io(io),
            }
        }
        SymphoniaError::IoError(io) => PlayerError::Io(io),
        other => PlayerError::Decode(format!("Probe error: {}", other)),
    }
}

/// Shared slot holding the failure that ended a stream, if any
pub type ErrorSlot = Arc<Mutex<Option<MediaError>>>;

fn store_error(slot: &Mutex<Option<MediaError>>, e: &SymphoniaError) {
    let fault = match e {
        SymphoniaError::IoError(_) => MediaError::Network,
        _ => MediaError::Decode,
    };
    set_fault(slot, fault);
}

fn set_fault(slot: &Mutex<Option<MediaError>>, fault: MediaError) {
    if let Ok(mut err) = slot.lock() {
        *err = Some(fault);
    }
}

/// Decoded audio source
pub struct SymphoniaSource {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    format: Box<dyn symphonia::core::formats::FormatReader>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_idx: usize,
    channels: NonZero<u16>,
    sample_rate: NonZero<u32>,
    codec_name: &'static str,
    end_of_input: EndOfInput,
    /// Last non-EOF error, checked by the element once the stream runs dry
    last_error: ErrorSlot,
    /// Packets decoded so far; the stall watchdog reads it
    frames_decoded: Arc<AtomicU64>,
}

impl SymphoniaSource {
    /// Probe `reader` and prepare a decoder for its first audio track.
    ///
    /// Blocks while the probe reads enough of the stream to identify it.
    pub fn new<R: Read + Send + 'static>(reader: R, format_hint: Option<&str>) -> Result<Self> {
        Self::with_end(reader, format_hint, EndOfInput::Finished)
    }

    /// Like [`SymphoniaSource::new`], with an explicit policy for the end of input.
    ///
    /// With [`EndOfInput::Interrupted`] running out of bytes is recorded as a
    /// network fault instead of a normal end.
    pub fn with_end<R: Read + Send + 'static>(
        reader: R,
        format_hint: Option<&str>,
        end: EndOfInput,
    ) -> Result<Self> {
        let source = ReadOnlySource::new(SyncReader(Mutex::new(reader)));
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = format_hint {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| probe_error(e, end))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::Decode("No audio track found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| PlayerError::Decode(format!("Decoder creation error: {}", e)))?;

        let channels = codec_params
            .channels
            .and_then(|c| NonZero::new(c.count() as u16))
            .unwrap_or(FALLBACK_CHANNELS);
        let sample_rate = codec_params
            .sample_rate
            .and_then(NonZero::new)
            .unwrap_or(FALLBACK_SAMPLE_RATE);

        let mut source = Self {
            decoder,
            format,
            track_id,
            sample_buf: None,
            sample_idx: 0,
            channels,
            sample_rate,
            codec_name: codec_type_to_name(codec_params.codec),
            end_of_input: end,
            last_error: Arc::new(Mutex::new(None)),
            frames_decoded: Arc::new(AtomicU64::new(0)),
        };

        // Decode the first packet so channels and rate reflect the decoder output
        source.decode_next_packet();

        Ok(source)
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec_name
    }

    /// Error slot, set when the stream ended on an I/O or decode error
    pub fn error_slot(&self) -> ErrorSlot {
        self.last_error.clone()
    }

    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        self.frames_decoded.clone()
    }

    fn decode_next_packet(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    if self.end_of_input == EndOfInput::Interrupted {
                        debug!("live stream input ended");
                        set_fault(&self.last_error, MediaError::Network);
                    }
                    return false;
                }
                Err(e) => {
                    store_error(&self.last_error, &e);
                    return false;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.frames_decoded.fetch_add(1, Ordering::Relaxed);
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity();

                    if let Some(rate) = NonZero::new(spec.rate) {
                        self.sample_rate = rate;
                    }
                    if let Some(ch) = NonZero::new(spec.channels.count() as u16) {
                        self.channels = ch;
                    }

                    let buf = match self.sample_buf.take() {
                        Some(buf) if buf.capacity() >= capacity => buf,
                        _ => SampleBuffer::new(capacity as u64, spec),
                    };
                    let buf = self.sample_buf.insert(buf);
                    buf.copy_interleaved_ref(decoded);
                    self.sample_idx = 0;
                    return true;
                }
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => {
                    store_error(&self.last_error, &e);
                    return false;
                }
            }
        }
    }
}

impl Iterator for SymphoniaSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ref buf) = self.sample_buf {
                if let Some(&sample) = buf.samples().get(self.sample_idx) {
                    self.sample_idx += 1;
                    return Some(sample);
                }
            }

            if !self.decode_next_packet() {
                return None;
            }
        }
    }
}

impl Source for SymphoniaSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> NonZero<u16> {
        self.channels
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
