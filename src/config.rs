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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;
use tracing::debug;

use crate::landmarks::Finger;

mod audio;
mod error;
mod samples;
mod synth;
mod tuning;

pub use self::audio::{Audio, DEFAULT_AUDIO_DEVICE};
pub use self::error::ConfigError;
pub use self::samples::Samples;
pub use self::synth::Synth;
pub use self::tuning::{Classifier, Roles, Stabilizer, Strum};

/// Prefix of environment variables that override file values, e.g.
/// `AIRSTRUM__AUDIO__DEVICE=mock`.
const ENV_PREFIX: &str = "AIRSTRUM";

/// The instrument configuration. Every section is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct InstrumentConfig {
    /// Omitting the audio section runs the instrument silently.
    audio: Option<Audio>,
    samples: Option<Samples>,
    synth: Option<Synth>,
    classifier: Option<Classifier>,
    stabilizer: Option<Stabilizer>,
    strum: Option<Strum>,
    roles: Option<Roles>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl InstrumentConfig {
    /// Loads the configuration from a YAML file, applying environment overrides.
    pub fn load(path: &Path) -> Result<InstrumentConfig, ConfigError> {
        let mut config: InstrumentConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;

        debug!(path = ?path, "Loaded configuration");
        Ok(config)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<InstrumentConfig, ConfigError> {
        let config: InstrumentConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let classifier = self.classifier();
        if classifier.min_matches() > Finger::ALL.len() {
            return Err(ConfigError::Invalid(format!(
                "classifier.min_matches must be at most {}, got {}",
                Finger::ALL.len(),
                classifier.min_matches()
            )));
        }
        if classifier.extension_margin() < 0.0 {
            return Err(ConfigError::Invalid(
                "classifier.extension_margin must not be negative".to_string(),
            ));
        }
        if classifier.thumb_spread() <= 0.0 {
            return Err(ConfigError::Invalid(
                "classifier.thumb_spread must be positive".to_string(),
            ));
        }

        let stabilizer = self.stabilizer();
        if stabilizer.window() == 0 {
            return Err(ConfigError::Invalid(
                "stabilizer.window must be at least 1".to_string(),
            ));
        }
        if stabilizer.min_votes() == 0 || stabilizer.min_votes() > stabilizer.window() {
            return Err(ConfigError::Invalid(format!(
                "stabilizer.min_votes must be between 1 and {}, got {}",
                stabilizer.window(),
                stabilizer.min_votes()
            )));
        }

        if self.strum().velocity_threshold() <= 0.0 {
            return Err(ConfigError::Invalid(
                "strum.velocity_threshold must be positive".to_string(),
            ));
        }
        self.strum().detector()?;

        let split = self.roles().split();
        if !(0.0..=1.0).contains(&split) {
            return Err(ConfigError::Invalid(format!(
                "roles.split must be between 0 and 1, got {}",
                split
            )));
        }

        if self.samples().volume() < 0.0 {
            return Err(ConfigError::Invalid(
                "samples.volume must not be negative".to_string(),
            ));
        }

        let synth = self.synth().settings()?;
        if synth.peak_gain <= 0.0 || synth.floor_gain <= 0.0 {
            return Err(ConfigError::Invalid(
                "synth gains must be positive".to_string(),
            ));
        }
        if synth.floor_gain > synth.peak_gain {
            return Err(ConfigError::Invalid(
                "synth.floor_gain must not exceed synth.peak_gain".to_string(),
            ));
        }
        let last_attack = synth.attack + synth.stagger * 2;
        if synth.decay <= last_attack {
            return Err(ConfigError::Invalid(format!(
                "synth.decay must be longer than the last voice's attack ({:?})",
                last_attack
            )));
        }
        if synth.stop < synth.decay {
            return Err(ConfigError::Invalid(
                "synth.stop must not be earlier than synth.decay".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the audio configuration, if audio output is configured.
    pub fn audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }

    pub fn samples(&self) -> Samples {
        self.samples.clone().unwrap_or_default()
    }

    pub fn synth(&self) -> Synth {
        self.synth.clone().unwrap_or_default()
    }

    pub fn classifier(&self) -> Classifier {
        self.classifier.clone().unwrap_or_default()
    }

    pub fn stabilizer(&self) -> Stabilizer {
        self.stabilizer.clone().unwrap_or_default()
    }

    pub fn strum(&self) -> Strum {
        self.strum.clone().unwrap_or_default()
    }

    pub fn roles(&self) -> Roles {
        self.roles.clone().unwrap_or_default()
    }

    /// Directory relative paths in this configuration are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Drops the audio section, so that the instrument runs silently.
    pub fn without_audio(mut self) -> InstrumentConfig {
        self.audio = None;
        self
    }
}

/// Parses an optional duration string such as `150ms`, falling back to a default.
pub(crate) fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Into::into)
            .map_err(|e| ConfigError::Duration {
                field,
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}
