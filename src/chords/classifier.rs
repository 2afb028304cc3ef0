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

//! Maps one hand's landmarks to a chord symbol.

use tracing::trace;

use super::ChordSymbol;
use crate::landmarks::{Finger, FingerState, Hand};

/// Default distance a fingertip must sit above its middle joint to count as extended.
pub const DEFAULT_EXTENSION_MARGIN: f32 = 0.02;

/// Default sideways distance between thumb tip and thumb knuckle to count as extended.
pub const DEFAULT_THUMB_SPREAD: f32 = 0.05;

/// Default number of fingers (out of 5) that must agree with a fingerprint.
pub const DEFAULT_MIN_MATCHES: usize = 4;

/// Classifies hand shapes against the chord fingerprint table. Stateless.
#[derive(Clone, Debug)]
pub struct ChordClassifier {
    extension_margin: f32,
    thumb_spread: f32,
    min_matches: usize,
}

impl ChordClassifier {
    pub fn new(extension_margin: f32, thumb_spread: f32, min_matches: usize) -> Self {
        Self {
            extension_margin,
            thumb_spread,
            min_matches,
        }
    }

    /// Computes which fingers of the hand are extended.
    pub fn finger_state(&self, hand: &Hand) -> FingerState {
        // The thumb extends sideways, so compare x against its knuckle.
        let thumb =
            (hand.tip(Finger::Thumb).x - hand.mcp(Finger::Thumb).x).abs() > self.thumb_spread;
        let extended =
            |finger: Finger| hand.tip(finger).y < hand.pip(finger).y - self.extension_margin;

        FingerState::new(
            thumb,
            extended(Finger::Index),
            extended(Finger::Middle),
            extended(Finger::Ring),
            extended(Finger::Pinky),
        )
    }

    /// Returns the first chord in table order whose fingerprint agrees with the
    /// hand on at least `min_matches` fingers.
    pub fn classify(&self, hand: &Hand) -> Option<ChordSymbol> {
        let state = self.finger_state(hand);
        let chord = ChordSymbol::ALL
            .into_iter()
            .find(|chord| chord.fingerprint().matches(&state) >= self.min_matches);

        trace!(fingers = %state, chord = ?chord, "Classified hand");
        chord
    }
}

impl Default for ChordClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSION_MARGIN,
            DEFAULT_THUMB_SPREAD,
            DEFAULT_MIN_MATCHES,
        )
    }
}
