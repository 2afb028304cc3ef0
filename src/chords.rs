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

//! Chord symbols and the hand-shape path that produces them.
//!
//! This module provides:
//! - The closed set of chord symbols with their fingerprints and synthesis triads
//! - Per-frame classification of a hand into a chord
//! - Sliding-window stabilization of the per-frame chord stream

use std::fmt;
use std::str::FromStr;

use crate::landmarks::FingerState;

pub mod classifier;
pub mod stabilizer;

pub use classifier::ChordClassifier;
pub use stabilizer::ChordStabilizer;

/// A chord the instrument can play. "No chord" is represented as `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChordSymbol {
    C,
    G,
    Am,
    F,
    D,
    Em,
    Rock,
}

/// Error returned when parsing an unknown chord name.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown chord '{0}'")]
pub struct UnknownChord(pub String);

impl ChordSymbol {
    /// All chords in fingerprint table order. Earlier entries win ties during
    /// classification.
    pub const ALL: [ChordSymbol; 7] = [
        ChordSymbol::C,
        ChordSymbol::G,
        ChordSymbol::Am,
        ChordSymbol::F,
        ChordSymbol::D,
        ChordSymbol::Em,
        ChordSymbol::Rock,
    ];

    /// The display name, which is also the asset name for the chord's sample.
    pub fn name(&self) -> &'static str {
        match self {
            ChordSymbol::C => "C",
            ChordSymbol::G => "G",
            ChordSymbol::Am => "Am",
            ChordSymbol::F => "F",
            ChordSymbol::D => "D",
            ChordSymbol::Em => "Em",
            ChordSymbol::Rock => "Rock",
        }
    }

    /// The extended/curled pattern of the hand shape for this chord.
    pub fn fingerprint(&self) -> FingerState {
        // (thumb, index, middle, ring, pinky)
        match self {
            ChordSymbol::C => FingerState::new(false, true, true, false, false),
            ChordSymbol::G => FingerState::new(true, false, false, false, true),
            ChordSymbol::Am => FingerState::new(false, true, true, true, true),
            ChordSymbol::F => FingerState::new(false, false, false, false, false),
            // One finger away from Am. Am is earlier in the table and wins.
            ChordSymbol::D => FingerState::new(true, true, true, true, true),
            ChordSymbol::Em => FingerState::new(true, true, false, true, false),
            ChordSymbol::Rock => FingerState::new(false, true, false, false, true),
        }
    }

    /// Frequencies in Hz of the three oscillator voices used when no sample is
    /// loaded for this chord.
    pub fn triad(&self) -> [f32; 3] {
        match self {
            ChordSymbol::C => [261.63, 329.63, 392.00],
            ChordSymbol::G => [196.00, 246.94, 293.66],
            ChordSymbol::Am => [220.00, 261.63, 329.63],
            ChordSymbol::F => [174.61, 220.00, 261.63],
            ChordSymbol::D => [293.66, 369.99, 440.00],
            ChordSymbol::Em => [164.81, 196.00, 246.94],
            ChordSymbol::Rock => [82.41, 123.47, 164.81],
        }
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ChordSymbol {
    type Err = UnknownChord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ChordSymbol::ALL
            .iter()
            .find(|chord| chord.name().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| UnknownChord(s.to_string()))
    }
}
