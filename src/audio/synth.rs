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

//! Oscillator voices used when no recorded sample is available for a chord.

use std::time::Duration;

use super::mixer::Source;

/// Default peak gain of each voice.
pub const DEFAULT_PEAK_GAIN: f32 = 0.1;
/// Default attack of the first voice.
pub const DEFAULT_ATTACK: Duration = Duration::from_millis(20);
/// Default extra attack added per voice, which spreads the triad like a strum.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(10);
/// Default time, from onset, at which the decay reaches the floor gain.
pub const DEFAULT_DECAY: Duration = Duration::from_secs(1);
/// Default gain the decay settles on.
pub const DEFAULT_FLOOR_GAIN: f32 = 0.001;
/// Default time, from onset, at which the voice is stopped.
pub const DEFAULT_STOP: Duration = Duration::from_millis(1500);

/// Oscillator wave shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Triangle,
    Sine,
}

impl Waveform {
    /// Value of the wave at the given phase, where phase is in [0, 1).
    pub fn value(&self, phase: f32) -> f32 {
        match self {
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
        }
    }
}

/// Gain over time for one voice. All times are offsets from the voice onset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub peak_gain: f32,
    /// Linear ramp from silence to the peak gain ends here.
    pub attack: Duration,
    /// Exponential decay from the peak reaches the floor gain here.
    pub decay: Duration,
    pub floor_gain: f32,
    /// The voice is silent from here on.
    pub stop: Duration,
}

impl Envelope {
    /// Gain of the envelope at the given offset from onset.
    pub fn gain_at(&self, t: Duration) -> f32 {
        if t >= self.stop {
            return 0.0;
        }

        if t < self.attack {
            return self.peak_gain * (t.as_secs_f32() / self.attack.as_secs_f32());
        }

        if t < self.decay {
            let progress =
                (t - self.attack).as_secs_f32() / (self.decay - self.attack).as_secs_f32();
            return self.peak_gain * (self.floor_gain / self.peak_gain).powf(progress);
        }

        // Decay finished but the voice hasn't been stopped yet.
        if self.decay > self.attack {
            self.floor_gain
        } else {
            self.peak_gain
        }
    }
}

/// One oscillator at a fixed frequency shaped by an envelope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillatorVoice {
    pub frequency: f32,
    pub waveform: Waveform,
    pub envelope: Envelope,
}

impl OscillatorVoice {
    /// Creates a mixer source rendering this voice at the given sample rate.
    pub fn into_source(self, sample_rate: u32) -> OscillatorSource {
        OscillatorSource {
            voice: self,
            sample_rate,
            elapsed_frames: 0,
            phase: 0.0,
        }
    }
}

/// Settings for the synthesized fallback chord.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthSettings {
    pub waveform: Waveform,
    pub peak_gain: f32,
    pub attack: Duration,
    pub stagger: Duration,
    pub decay: Duration,
    pub floor_gain: f32,
    pub stop: Duration,
}

impl SynthSettings {
    /// Builds one voice per frequency. Voice `i` reaches its peak `i` staggers
    /// after the first.
    pub fn voices(&self, frequencies: &[f32]) -> Vec<OscillatorVoice> {
        frequencies
            .iter()
            .enumerate()
            .map(|(i, frequency)| OscillatorVoice {
                frequency: *frequency,
                waveform: self.waveform,
                envelope: Envelope {
                    peak_gain: self.peak_gain,
                    attack: self.attack + self.stagger * i as u32,
                    decay: self.decay,
                    floor_gain: self.floor_gain,
                    stop: self.stop,
                },
            })
            .collect()
    }
}

impl Default for SynthSettings {
    fn default() -> Self {
        SynthSettings {
            waveform: Waveform::default(),
            peak_gain: DEFAULT_PEAK_GAIN,
            attack: DEFAULT_ATTACK,
            stagger: DEFAULT_STAGGER,
            decay: DEFAULT_DECAY,
            floor_gain: DEFAULT_FLOOR_GAIN,
            stop: DEFAULT_STOP,
        }
    }
}

/// Renders an oscillator voice frame by frame.
pub struct OscillatorSource {
    voice: OscillatorVoice,
    sample_rate: u32,
    elapsed_frames: u64,
    phase: f32,
}

impl Source for OscillatorSource {
    fn mix_next_frame(&mut self, frame: &mut [f32]) -> bool {
        let t = Duration::from_secs_f64(self.elapsed_frames as f64 / self.sample_rate as f64);
        if t >= self.voice.envelope.stop {
            return false;
        }

        let value = self.voice.waveform.value(self.phase) * self.voice.envelope.gain_at(t);
        for sample in frame.iter_mut() {
            *sample += value;
        }

        self.elapsed_frames += 1;
        self.phase = (self.phase + self.voice.frequency / self.sample_rate as f32).fract();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        SynthSettings::default().voices(&[440.0])[0].envelope
    }

    #[test]
    fn test_triangle_shape() {
        let wave = Waveform::Triangle;
        assert_eq!(wave.value(0.0), -1.0);
        assert_eq!(wave.value(0.25), 0.0);
        assert_eq!(wave.value(0.5), 1.0);
        assert_eq!(wave.value(0.75), 0.0);
    }

    #[test]
    fn test_envelope_attack() {
        let envelope = envelope();
        assert_eq!(envelope.gain_at(Duration::ZERO), 0.0);
        assert!((envelope.gain_at(Duration::from_millis(10)) - 0.05).abs() < 1e-6);
        assert!((envelope.gain_at(Duration::from_millis(20)) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_envelope_decay() {
        let envelope = envelope();
        let mid = envelope.gain_at(Duration::from_millis(510));
        // Halfway through an exponential ramp from 0.1 to 0.001 is 0.01.
        assert!((mid - 0.01).abs() < 1e-4, "got {}", mid);
        assert!((envelope.gain_at(Duration::from_millis(1000)) - 0.001).abs() < 1e-6);
        assert!((envelope.gain_at(Duration::from_millis(1200)) - 0.001).abs() < 1e-6);
        assert_eq!(envelope.gain_at(Duration::from_millis(1500)), 0.0);
    }

    #[test]
    fn test_voices_are_staggered() {
        let voices = SynthSettings::default().voices(&[261.63, 329.63, 392.0]);
        let attacks: Vec<Duration> = voices.iter().map(|v| v.envelope.attack).collect();
        assert_eq!(
            attacks,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(30),
                Duration::from_millis(40)
            ]
        );
        assert_eq!(voices[2].frequency, 392.0);
    }

    #[test]
    fn test_oscillator_source_stops() {
        let settings = SynthSettings {
            stop: Duration::from_millis(10),
            ..Default::default()
        };
        let mut source = settings.voices(&[440.0])[0].into_source(1000);
        let mut frame = [0.0f32; 2];
        let mut frames = 0;
        while source.mix_next_frame(&mut frame) {
            frames += 1;
        }
        assert_eq!(frames, 10);
    }
}
