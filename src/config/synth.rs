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
use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::audio::synth::{self, SynthSettings, Waveform};

/// The synthesized fallback used for chords without a sample.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Synth {
    /// "triangle" (default) or "sine".
    waveform: Option<String>,
    peak_gain: Option<f32>,
    attack: Option<String>,
    /// Extra attack per voice of the triad.
    stagger: Option<String>,
    decay: Option<String>,
    floor_gain: Option<f32>,
    stop: Option<String>,
}

impl Synth {
    /// Returns the waveform from the configuration.
    pub fn waveform(&self) -> Result<Waveform, ConfigError> {
        match self.waveform.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("triangle") => Ok(Waveform::Triangle),
            Some("sine") => Ok(Waveform::Sine),
            Some(other) => Err(ConfigError::Invalid(format!(
                "unknown waveform {}, expected triangle or sine",
                other
            ))),
        }
    }

    /// Resolves the configuration into synthesis settings, filling in defaults.
    pub fn settings(&self) -> Result<SynthSettings, ConfigError> {
        Ok(SynthSettings {
            waveform: self.waveform()?,
            peak_gain: self.peak_gain.unwrap_or(synth::DEFAULT_PEAK_GAIN),
            attack: parse_duration("synth.attack", &self.attack, synth::DEFAULT_ATTACK)?,
            stagger: parse_duration("synth.stagger", &self.stagger, synth::DEFAULT_STAGGER)?,
            decay: parse_duration("synth.decay", &self.decay, synth::DEFAULT_DECAY)?,
            floor_gain: self.floor_gain.unwrap_or(synth::DEFAULT_FLOOR_GAIN),
            stop: parse_duration("synth.stop", &self.stop, synth::DEFAULT_STOP)?,
        })
    }
}
