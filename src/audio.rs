// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config;
use crate::samples::LoadedSample;

pub mod cpal;
pub mod error;
pub mod mixer;
pub mod mock;
pub mod synth;

pub use error::AudioError;
pub use synth::{Envelope, OscillatorVoice, SynthSettings, Waveform};

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a new unique ID for a mixer source.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Whether an output device is currently producing sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    /// Created but not yet allowed to output. Most platforms need a user
    /// gesture before sound is permitted.
    Suspended,
    /// Producing sound.
    Running,
    /// Torn down; nothing can be played anymore.
    Closed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            DeviceState::Suspended => "suspended",
            DeviceState::Running => "running",
            DeviceState::Closed => "closed",
        };
        write!(f, "{}", state)
    }
}

/// An audio output. Playback is fire and forget: every call starts an
/// independent voice that overlaps whatever is already sounding.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// Returns the current output state.
    fn state(&self) -> DeviceState;

    /// Resumes a suspended device. Does nothing if the device is already running.
    fn resume(&self) -> Result<(), AudioError>;

    /// The output sample rate. Samples must be decoded to this rate.
    fn sample_rate(&self) -> u32;

    /// Starts playback of a decoded sample.
    fn play_sample(&self, label: &str, sample: &LoadedSample, volume: f32)
        -> Result<(), AudioError>;

    /// Starts an oscillator voice.
    fn play_voice(&self, voice: OscillatorVoice) -> Result<(), AudioError>;

    /// Stops all output and releases the device. Idempotent.
    fn close(&self);

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, AudioError>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, AudioError> {
    cpal::Device::list()
}

/// Gets the configured output device. No audio configuration means the
/// instrument runs silently, which is reported as `None`.
pub fn get_device(config: Option<&config::Audio>) -> Result<Option<Arc<dyn Device>>, AudioError> {
    let config = match config {
        Some(config) => config,
        None => return Ok(None),
    };

    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Some(Arc::new(mock::Device::get(
            device,
            config.sample_rate().unwrap_or(mock::DEFAULT_SAMPLE_RATE),
        ))));
    };

    Ok(Some(Arc::new(cpal::Device::get(config)?)))
}
