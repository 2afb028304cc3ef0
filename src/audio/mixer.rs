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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::sync::Arc;

/// Something the mixer can pull audio from.
pub trait Source: Send {
    /// Adds this source's next frame into `frame`, one value per output
    /// channel. Returns false once the source is exhausted.
    fn mix_next_frame(&mut self, frame: &mut [f32]) -> bool;
}

/// Plays back decoded, interleaved samples from memory.
pub struct BufferSource {
    samples: Arc<Vec<f32>>,
    channel_count: u16,
    volume: f32,
    position: usize,
}

impl BufferSource {
    pub fn new(samples: Arc<Vec<f32>>, channel_count: u16, volume: f32) -> BufferSource {
        BufferSource {
            samples,
            channel_count: channel_count.max(1),
            volume,
            position: 0,
        }
    }
}

impl Source for BufferSource {
    fn mix_next_frame(&mut self, frame: &mut [f32]) -> bool {
        let channels = self.channel_count as usize;
        let start = self.position * channels;
        if start + channels > self.samples.len() {
            return false;
        }

        let source_frame = &self.samples[start..start + channels];
        for (channel, sample) in frame.iter_mut().enumerate() {
            // Mono sources feed every output; wider sources wrap around.
            *sample += source_frame[channel % channels] * self.volume;
        }
        self.position += 1;
        true
    }
}

/// Represents an active audio source in the mixer
pub struct ActiveSource {
    /// Unique ID for this source
    pub id: u64,
    /// What is playing, for logging
    pub label: String,
    pub source: Box<dyn Source>,
}

impl ActiveSource {
    pub fn new(label: &str, source: Box<dyn Source>) -> ActiveSource {
        ActiveSource {
            id: super::next_source_id(),
            label: label.to_string(),
            source,
        }
    }
}

/// Core audio mixing logic that's independent of any audio backend
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Vec<ActiveSource>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            active_sources: Vec::new(),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Adds a new audio source to the mixer
    pub fn add_source(&mut self, source: ActiveSource) {
        self.active_sources.push(source);
    }

    /// Drops every source.
    pub fn clear(&mut self) {
        self.active_sources.clear();
    }

    /// Mixes all active sources into an interleaved output buffer. Finished
    /// sources are removed. The output is clamped to [-1, 1].
    pub fn process_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        for frame in output.chunks_mut(self.num_channels as usize) {
            self.active_sources
                .retain_mut(|active_source| active_source.source.mix_next_frame(frame));
            for sample in frame.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&mut self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0; num_frames * self.num_channels as usize];
        self.process_into(&mut frames);
        frames
    }

    /// Number of sources still playing.
    pub fn active_count(&self) -> usize {
        self.active_sources.len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: Vec<f32>, channel_count: u16) -> ActiveSource {
        ActiveSource::new(
            "test",
            Box::new(BufferSource::new(Arc::new(samples), channel_count, 1.0)),
        )
    }

    #[test]
    fn test_basic_mixing() {
        let mut mixer = AudioMixer::new(2, 44100);
        mixer.add_source(buffer(vec![0.5, 0.8], 1));

        let frames = mixer.process_frames(3);

        // Mono is copied to both channels, then silence once it runs out.
        assert_eq!(frames, vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0]);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_multiple_source_mixing() {
        let mut mixer = AudioMixer::new(2, 44100);
        mixer.add_source(buffer(vec![0.5, 0.3], 2));
        mixer.add_source(buffer(vec![0.2, 0.1], 2));

        let frame = mixer.process_frames(1);

        assert!((frame[0] - 0.7).abs() < 1e-6);
        assert!((frame[1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_sources_overlap_independently() {
        let mut mixer = AudioMixer::new(1, 44100);
        mixer.add_source(buffer(vec![0.1; 4], 1));
        mixer.process_frames(2);
        mixer.add_source(buffer(vec![0.2; 4], 1));

        let frames = mixer.process_frames(4);
        let expected = [0.3, 0.3, 0.2, 0.2];
        for (actual, expected) in frames.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_output_is_clamped() {
        let mut mixer = AudioMixer::new(1, 44100);
        mixer.add_source(buffer(vec![0.8], 1));
        mixer.add_source(buffer(vec![0.8], 1));
        assert_eq!(mixer.process_frames(1), vec![1.0]);
    }

    #[test]
    fn test_volume() {
        let mut mixer = AudioMixer::new(1, 44100);
        mixer.add_source(ActiveSource::new(
            "quiet",
            Box::new(BufferSource::new(Arc::new(vec![0.8]), 1, 0.5)),
        ));
        assert!((mixer.process_frames(1)[0] - 0.4).abs() < 1e-6);
    }
}
