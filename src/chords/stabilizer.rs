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

//! Sliding-window majority filter over the per-frame chord stream.

use std::collections::VecDeque;

use super::ChordSymbol;

/// Default number of frames considered by the stabilizer.
pub const DEFAULT_WINDOW: usize = 5;

/// Default number of frames in the window that must agree on a chord.
pub const DEFAULT_MIN_VOTES: usize = 3;

/// Suppresses single-frame misclassifications by requiring a chord to appear
/// in at least `min_votes` of the last `window` frames.
#[derive(Debug)]
pub struct ChordStabilizer {
    history: VecDeque<Option<ChordSymbol>>,
    window: usize,
    min_votes: usize,
}

impl ChordStabilizer {
    /// Creates a stabilizer. A window of zero is treated as one.
    pub fn new(window: usize, min_votes: usize) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
            min_votes,
        }
    }

    /// Records the latest raw classification and returns the chord that holds
    /// a majority of the window, if any. Does not hold previous results: the
    /// caller decides what to keep showing when this returns `None`.
    pub fn observe(&mut self, raw: Option<ChordSymbol>) -> Option<ChordSymbol> {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(raw);

        // Tallies in first-seen order so that ties go to the older chord.
        let mut tallies: Vec<(ChordSymbol, usize)> = Vec::with_capacity(self.window);
        for chord in self.history.iter().flatten() {
            match tallies.iter_mut().find(|(seen, _)| seen == chord) {
                Some((_, count)) => *count += 1,
                None => tallies.push((*chord, 1)),
            }
        }

        let mut best: Option<(ChordSymbol, usize)> = None;
        for (chord, count) in tallies {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((chord, count));
            }
        }

        best.filter(|(_, count)| *count >= self.min_votes)
            .map(|(chord, _)| chord)
    }

    /// Forgets all observed frames.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for ChordStabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MIN_VOTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChordSymbol::*;

    fn feed(
        stabilizer: &mut ChordStabilizer,
        frames: &[Option<ChordSymbol>],
    ) -> Option<ChordSymbol> {
        let mut last = None;
        for frame in frames {
            last = stabilizer.observe(*frame);
        }
        last
    }

    #[test]
    fn test_majority_survives_noise() {
        let mut stabilizer = ChordStabilizer::default();
        let result = feed(&mut stabilizer, &[Some(C), None, Some(C), Some(G), Some(C)]);
        assert_eq!(result, Some(C));
    }

    #[test]
    fn test_all_distinct_rejected() {
        let mut stabilizer = ChordStabilizer::default();
        let result = feed(
            &mut stabilizer,
            &[Some(C), Some(G), Some(Am), Some(F), Some(D)],
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_needs_three_frames() {
        let mut stabilizer = ChordStabilizer::default();
        assert_eq!(stabilizer.observe(Some(G)), None);
        assert_eq!(stabilizer.observe(Some(G)), None);
        assert_eq!(stabilizer.observe(Some(G)), Some(G));
    }

    #[test]
    fn test_oldest_frame_is_evicted() {
        let mut stabilizer = ChordStabilizer::default();
        feed(&mut stabilizer, &[Some(C), Some(C), Some(C), Some(G), Some(G)]);
        // Window is now [C, C, G, G, G].
        assert_eq!(stabilizer.observe(Some(G)), Some(G));
        // Window is now [C, G, G, G, None].
        assert_eq!(stabilizer.observe(None), Some(G));
        // Window is now [G, G, G, None, None].
        assert_eq!(stabilizer.observe(None), Some(G));
        // Window is now [G, G, None, None, None].
        assert_eq!(stabilizer.observe(None), None);
    }

    #[test]
    fn test_none_frames_never_vote() {
        let mut stabilizer = ChordStabilizer::default();
        assert_eq!(feed(&mut stabilizer, &[None; 5]), None);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        // Window of 4 with 2 votes: C and G both reach 2.
        let mut stabilizer = ChordStabilizer::new(4, 2);
        let result = feed(&mut stabilizer, &[Some(G), Some(C), Some(C), Some(G)]);
        assert_eq!(result, Some(G));
    }

    #[test]
    fn test_reset() {
        let mut stabilizer = ChordStabilizer::default();
        feed(&mut stabilizer, &[Some(Em), Some(Em)]);
        stabilizer.reset();
        assert_eq!(stabilizer.observe(Some(Em)), None);
    }
}
