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
use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    mixer::{ActiveSource, AudioMixer, BufferSource},
    AudioError, DeviceState, OscillatorVoice,
};
use crate::samples::LoadedSample;

/// Sample rate used when the configuration doesn't name one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A mock device. Renders into an in-memory mixer instead of a sound card and
/// remembers everything it was asked to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    state: Arc<Mutex<DeviceState>>,
    mixer: Arc<Mutex<AudioMixer>>,
    samples_played: Arc<Mutex<Vec<String>>>,
    voices_played: Arc<Mutex<Vec<OscillatorVoice>>>,
}

impl Device {
    /// Gets the given mock device. Like real hardware it starts suspended.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            state: Arc::new(Mutex::new(DeviceState::Suspended)),
            mixer: Arc::new(Mutex::new(AudioMixer::new(2, sample_rate))),
            samples_played: Arc::new(Mutex::new(Vec::new())),
            voices_played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Labels of all samples played so far.
    pub fn samples_played(&self) -> Vec<String> {
        self.samples_played.lock().clone()
    }

    /// All oscillator voices started so far.
    pub fn voices_played(&self) -> Vec<OscillatorVoice> {
        self.voices_played.lock().clone()
    }

    /// Pulls the given number of stereo frames through the mixer.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        self.mixer.lock().process_frames(frames)
    }

    fn start(&self, source: ActiveSource) -> Result<(), AudioError> {
        if *self.state.lock() == DeviceState::Closed {
            return Err(AudioError::Closed);
        }
        debug!(device = self.name, source = source.label, "Starting source.");
        self.mixer.lock().add_source(source);
        Ok(())
    }
}

impl super::Device for Device {
    fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        match *state {
            DeviceState::Suspended => {
                *state = DeviceState::Running;
                info!(device = self.name, "Resumed mock device.");
                Ok(())
            }
            DeviceState::Running => Ok(()),
            DeviceState::Closed => Err(AudioError::Closed),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play_sample(
        &self,
        label: &str,
        sample: &LoadedSample,
        volume: f32,
    ) -> Result<(), AudioError> {
        self.start(ActiveSource::new(
            label,
            Box::new(BufferSource::new(
                sample.samples(),
                sample.channel_count(),
                volume,
            )),
        ))?;
        self.samples_played.lock().push(label.to_string());
        Ok(())
    }

    fn play_voice(&self, voice: OscillatorVoice) -> Result<(), AudioError> {
        let label = format!("{:.2}Hz", voice.frequency);
        self.start(ActiveSource::new(
            &label,
            Box::new(voice.into_source(self.sample_rate)),
        ))?;
        self.voices_played.lock().push(voice);
        Ok(())
    }

    fn close(&self) {
        *self.state.lock() = DeviceState::Closed;
        self.mixer.lock().clear();
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, AudioError> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
