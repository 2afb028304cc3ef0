// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample decoding for chord playback.
//!
//! Samples are decoded entirely into memory ahead of time for zero-latency playback.

use std::io::{Cursor, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::AssetError;

/// Errors from turning an asset into playable samples.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("decode error: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("{0} not specified")]
    MissingParameter(&'static str),

    #[error("sample contains no audio")]
    Empty,

    #[error("decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A loaded sample that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Shared interleaved sample data.
    pub fn samples(&self) -> Arc<Vec<f32>> {
        self.data.clone()
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        let frames = self.data.len() as f64 / self.channel_count as f64;
        Duration::from_secs_f64(frames / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Decodes encoded audio into memory at the output sample rate.
#[derive(Clone, Debug)]
pub struct SampleLoader {
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Decodes a complete encoded file. Blocking; run it off the async runtime.
    pub fn decode(&self, bytes: Vec<u8>, hint: Option<&str>) -> Result<LoadedSample, SampleError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        // Create a hint to help the format registry guess the format
        let mut format_hint = Hint::new();
        if let Some(extension) = hint {
            format_hint.with_extension(extension);
        }

        let probed = get_probe().format(
            &format_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(SampleError::NoAudioTrack)?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let source_sample_rate = params
            .sample_rate
            .ok_or(SampleError::MissingParameter("sample rate"))?;
        let mut channel_count = params.channels.map(|channels| channels.count() as u16);

        let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
        let mut samples = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            channel_count.get_or_insert(spec.channels.count() as u16);
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let channel_count = channel_count.ok_or(SampleError::MissingParameter("channel count"))?;
        if samples.is_empty() {
            return Err(SampleError::Empty);
        }

        // Transcode if sample rate doesn't match
        let samples = if source_sample_rate != self.target_sample_rate {
            debug!(
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            transcode_samples(
                &samples,
                channel_count,
                source_sample_rate,
                self.target_sample_rate,
            )
        } else {
            samples
        };

        let loaded = LoadedSample::new(samples, channel_count, self.target_sample_rate);
        info!(
            channels = channel_count,
            sample_rate = loaded.sample_rate(),
            duration_ms = loaded.duration().as_millis() as u64,
            memory_kb = loaded.memory_size() / 1024,
            "Sample decoded"
        );
        Ok(loaded)
    }
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Chord samples are short one-shots, so this is sufficient.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            // Linear interpolation
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
