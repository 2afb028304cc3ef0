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

//! Thresholds for the gesture path.

use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::chords::{classifier, stabilizer, ChordClassifier, ChordStabilizer};
use crate::pipeline::DEFAULT_SPLIT;
use crate::strum::{self, OnsetDetector};

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Classifier {
    extension_margin: Option<f32>,
    thumb_spread: Option<f32>,
    min_matches: Option<usize>,
}

impl Classifier {
    pub fn extension_margin(&self) -> f32 {
        self.extension_margin
            .unwrap_or(classifier::DEFAULT_EXTENSION_MARGIN)
    }

    pub fn thumb_spread(&self) -> f32 {
        self.thumb_spread.unwrap_or(classifier::DEFAULT_THUMB_SPREAD)
    }

    pub fn min_matches(&self) -> usize {
        self.min_matches.unwrap_or(classifier::DEFAULT_MIN_MATCHES)
    }

    pub fn classifier(&self) -> ChordClassifier {
        ChordClassifier::new(
            self.extension_margin(),
            self.thumb_spread(),
            self.min_matches(),
        )
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Stabilizer {
    window: Option<usize>,
    min_votes: Option<usize>,
}

impl Stabilizer {
    pub fn window(&self) -> usize {
        self.window.unwrap_or(stabilizer::DEFAULT_WINDOW)
    }

    pub fn min_votes(&self) -> usize {
        self.min_votes.unwrap_or(stabilizer::DEFAULT_MIN_VOTES)
    }

    pub fn stabilizer(&self) -> ChordStabilizer {
        ChordStabilizer::new(self.window(), self.min_votes())
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Strum {
    /// Downward wrist speed, in normalized units per millisecond.
    velocity_threshold: Option<f32>,
    cooldown: Option<String>,
}

impl Strum {
    pub fn velocity_threshold(&self) -> f32 {
        self.velocity_threshold
            .unwrap_or(strum::DEFAULT_VELOCITY_THRESHOLD)
    }

    pub fn detector(&self) -> Result<OnsetDetector, ConfigError> {
        Ok(OnsetDetector::new(
            self.velocity_threshold(),
            parse_duration("strum.cooldown", &self.cooldown, strum::DEFAULT_COOLDOWN)?,
        ))
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Roles {
    /// Hands with a wrist left of this x are chord hands.
    split: Option<f32>,
}

impl Roles {
    pub fn split(&self) -> f32 {
        self.split.unwrap_or(DEFAULT_SPLIT)
    }
}
