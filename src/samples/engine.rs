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

//! Audio engine that owns the output device, the chord sample cache, and the
//! synthesized fallback.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, span, warn, Instrument, Level};

use super::assets::AssetSource;
use super::loader::{LoadedSample, SampleError, SampleLoader};
use crate::audio::{self, DeviceState, SynthSettings};
use crate::chords::ChordSymbol;

/// Default playback volume of recorded samples.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// How a play request was rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    /// A preloaded recording was started.
    Sample,
    /// The chord triad was synthesized.
    Synthesized,
    /// Nothing was played: no device, or the device isn't running.
    Silent,
}

/// Plays chords. Every call starts new, independent voices; nothing is ever
/// cut off.
pub struct AudioEngine {
    device: Option<Arc<dyn audio::Device>>,
    assets: Arc<dyn AssetSource>,
    volume: f32,
    synth: SynthSettings,
    /// Decoded samples by chord. Only chords that loaded successfully are present.
    samples: RwLock<HashMap<ChordSymbol, LoadedSample>>,
    /// Set once preloading has finished, successfully or not.
    preloaded: OnceCell<usize>,
}

impl AudioEngine {
    pub fn new(
        device: Option<Arc<dyn audio::Device>>,
        assets: Arc<dyn AssetSource>,
        volume: f32,
        synth: SynthSettings,
    ) -> AudioEngine {
        AudioEngine {
            device,
            assets,
            volume,
            synth,
            samples: RwLock::new(HashMap::new()),
            preloaded: OnceCell::new(),
        }
    }

    /// The output device, if there is one.
    pub fn device(&self) -> Option<&Arc<dyn audio::Device>> {
        self.device.as_ref()
    }

    /// Fetches and decodes a sample for every chord, concurrently. Only the
    /// first call does any work; later and concurrent calls wait for it.
    /// Returns the number of chords that have a sample.
    pub async fn preload(&self) -> usize {
        *self
            .preloaded
            .get_or_init(|| {
                let span = span!(Level::INFO, "preload");
                self.load_all().instrument(span)
            })
            .await
    }

    /// Returns true once preloading has finished.
    pub fn is_preloaded(&self) -> bool {
        self.preloaded.initialized()
    }

    /// Returns true if the chord will play from a recorded sample.
    pub fn has_sample(&self, chord: ChordSymbol) -> bool {
        self.samples.read().contains_key(&chord)
    }

    async fn load_all(&self) -> usize {
        let device = match &self.device {
            Some(device) => device,
            None => {
                debug!("No audio output, skipping sample preload");
                return 0;
            }
        };

        let loader = SampleLoader::new(device.sample_rate());
        let loads = ChordSymbol::ALL.into_iter().map(|chord| {
            let assets = self.assets.clone();
            let loader = loader.clone();
            async move { (chord, load_sample(assets, loader, chord).await) }
        });

        // Results are only applied once everything has finished.
        let results = join_all(loads).await;
        let mut samples = self.samples.write();
        for (chord, result) in results {
            match result {
                Ok(sample) => {
                    info!(chord = %chord, channels = sample.channel_count(), "Sample loaded");
                    samples.insert(chord, sample);
                }
                Err(e) => {
                    warn!(chord = %chord, err = %e, "Unable to load sample, chord will be synthesized");
                }
            }
        }

        info!(
            loaded = samples.len(),
            total = ChordSymbol::ALL.len(),
            "Preload finished"
        );
        samples.len()
    }

    /// Resumes the output if it is suspended. Failures are logged.
    pub fn resume(&self) {
        let device = match &self.device {
            Some(device) => device,
            None => return,
        };

        if device.state() != DeviceState::Suspended {
            return;
        }
        match device.resume() {
            Ok(()) => info!(device = %device, "Audio output resumed"),
            Err(e) => warn!(device = %device, err = %e, "Unable to resume audio output"),
        }
    }

    /// Plays the chord: its sample if one was preloaded, otherwise a
    /// synthesized triad.
    pub fn play(&self, chord: ChordSymbol) -> Playback {
        let device = match self.running_device() {
            Some(device) => device,
            None => {
                debug!(chord = %chord, "Audio output not running, not playing");
                return Playback::Silent;
            }
        };

        let sample = self.samples.read().get(&chord).cloned();
        if let Some(sample) = sample {
            match device.play_sample(chord.name(), &sample, self.volume) {
                Ok(()) => {
                    debug!(chord = %chord, "Playing sample");
                    return Playback::Sample;
                }
                Err(e) => {
                    warn!(chord = %chord, err = %e, "Unable to play sample");
                    return Playback::Silent;
                }
            }
        }

        self.synthesize(device, chord.name(), &chord.triad())
    }

    /// Plays a chord by name. Unknown names play a synthesized C.
    pub fn play_named(&self, name: &str) -> Playback {
        match name.parse::<ChordSymbol>() {
            Ok(chord) => self.play(chord),
            Err(e) => {
                warn!(err = %e, "Falling back to a synthesized C");
                match self.running_device() {
                    Some(device) => self.synthesize(device, name, &ChordSymbol::C.triad()),
                    None => Playback::Silent,
                }
            }
        }
    }

    /// Closes the output device. Later calls do nothing.
    pub fn close(&self) {
        if let Some(device) = &self.device {
            if device.state() != DeviceState::Closed {
                device.close();
                info!(device = %device, "Audio output closed");
            }
        }
    }

    fn running_device(&self) -> Option<&Arc<dyn audio::Device>> {
        self.device
            .as_ref()
            .filter(|device| device.state() == DeviceState::Running)
    }

    fn synthesize(
        &self,
        device: &Arc<dyn audio::Device>,
        label: &str,
        frequencies: &[f32],
    ) -> Playback {
        debug!(chord = label, ?frequencies, "Synthesizing chord");
        for voice in self.synth.voices(frequencies) {
            if let Err(e) = device.play_voice(voice) {
                warn!(chord = label, err = %e, "Unable to start voice");
                return Playback::Silent;
            }
        }
        Playback::Synthesized
    }
}

/// Fetches and decodes one chord's sample. Decoding runs on the blocking pool.
async fn load_sample(
    assets: Arc<dyn AssetSource>,
    loader: SampleLoader,
    chord: ChordSymbol,
) -> Result<LoadedSample, SampleError> {
    let bytes = assets.fetch(chord.name()).await?;
    let hint = assets.format_hint().map(str::to_string);
    tokio::task::spawn_blocking(move || loader.decode(bytes, hint.as_deref())).await?
}
