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

//! Strum (note onset) detection from the wrist trajectory of the strumming hand.
//!
//! A strike is a downward wrist velocity above a threshold. After a strike the
//! detector ignores motion for a cooldown period so that one continuous stroke
//! produces a single onset.

use std::time::Duration;

use tracing::debug;

use crate::landmarks::Hand;

/// Default downward wrist velocity, in normalized units per millisecond, that counts as a strike.
pub const DEFAULT_VELOCITY_THRESHOLD: f32 = 0.0015;

/// Default refractory period after a strike.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(150);

/// The last wrist position seen by the detector.
#[derive(Clone, Copy, Debug)]
struct WristSample {
    y: f32,
    at: Duration,
}

/// Turns a stream of wrist positions into discrete strike events.
#[derive(Debug)]
pub struct OnsetDetector {
    velocity_threshold: f32,
    cooldown: Duration,
    last: Option<WristSample>,
    cooldown_until: Option<Duration>,
}

impl OnsetDetector {
    pub fn new(velocity_threshold: f32, cooldown: Duration) -> Self {
        Self {
            velocity_threshold,
            cooldown,
            last: None,
            cooldown_until: None,
        }
    }

    /// Feeds the strumming hand observed at time `now` and returns true if it
    /// strikes. Times must come from a monotonic source.
    pub fn detect(&mut self, hand: &Hand, now: Duration) -> bool {
        self.detect_wrist(hand.wrist().y, now)
    }

    /// Same as [`OnsetDetector::detect`] but takes the wrist height directly.
    pub fn detect_wrist(&mut self, y: f32, now: Duration) -> bool {
        let struck = match self.last {
            Some(last) if !self.is_cooling(now) => match now.checked_sub(last.at) {
                Some(elapsed) if !elapsed.is_zero() => {
                    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
                    // Positive means moving down the screen.
                    let velocity = (y - last.y) as f64 / elapsed_ms;
                    velocity > self.velocity_threshold as f64
                }
                _ => false,
            },
            _ => false,
        };

        if struck {
            self.cooldown_until = Some(now + self.cooldown);
            debug!(at_ms = now.as_millis() as u64, y, "Strum detected");
        }
        self.last = Some(WristSample { y, at: now });
        struck
    }

    /// Returns true if a recent strike still blocks new ones at `now`.
    pub fn is_cooling(&self, now: Duration) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Forgets the trajectory and any pending cooldown.
    pub fn reset(&mut self) {
        self.last = None;
        self.cooldown_until = None;
    }
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new(DEFAULT_VELOCITY_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::hand_at;

    const FRAME: Duration = Duration::from_millis(33);

    /// Runs a trajectory sampled every frame and returns the times of all strikes.
    fn strikes(detector: &mut OnsetDetector, ys: &[f32]) -> Vec<Duration> {
        ys.iter()
            .enumerate()
            .filter_map(|(i, y)| {
                let now = FRAME * i as u32;
                detector.detect(&hand_at(0.8, *y), now).then_some(now)
            })
            .collect()
    }

    #[test]
    fn test_first_sample_never_strikes() {
        let mut detector = OnsetDetector::default();
        assert!(!detector.detect_wrist(0.9, Duration::ZERO));
    }

    #[test]
    fn test_single_stroke_fires_with_cooldown() {
        let mut detector = OnsetDetector::default();
        // 0.002 units per ms downward for 300ms.
        let ys: Vec<f32> = (0..10).map(|i| 0.1 + 0.066 * i as f32).collect();
        let fired = strikes(&mut detector, &ys);

        assert!(!fired.is_empty());
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_COOLDOWN);
        }
        assert_eq!(fired[0], FRAME);
    }

    #[test]
    fn test_upward_motion_never_strikes() {
        let mut detector = OnsetDetector::default();
        let ys: Vec<f32> = (0..30).map(|i| 0.95 - 0.03 * i as f32).collect();
        assert!(strikes(&mut detector, &ys).is_empty());
    }

    #[test]
    fn test_slow_motion_never_strikes() {
        let mut detector = OnsetDetector::default();
        // 0.001 units per ms, below the threshold.
        let ys: Vec<f32> = (0..20).map(|i| 0.1 + 0.033 * i as f32).collect();
        assert!(strikes(&mut detector, &ys).is_empty());
    }

    #[test]
    fn test_cooldown_blocks_then_releases() {
        let mut detector = OnsetDetector::default();
        assert!(!detector.detect_wrist(0.1, Duration::from_millis(0)));
        assert!(detector.detect_wrist(0.2, Duration::from_millis(20)));
        assert!(detector.is_cooling(Duration::from_millis(100)));

        // Fast, but still cooling.
        assert!(!detector.detect_wrist(0.3, Duration::from_millis(100)));
        // Cooldown over: velocity is measured from the last recorded sample.
        assert!(detector.detect_wrist(0.5, Duration::from_millis(170)));
    }

    #[test]
    fn test_repeated_timestamp_does_not_strike() {
        let mut detector = OnsetDetector::default();
        detector.detect_wrist(0.1, Duration::from_millis(10));
        assert!(!detector.detect_wrist(0.9, Duration::from_millis(10)));
        assert!(!detector.detect_wrist(0.95, Duration::from_millis(5)));
    }

    #[test]
    fn test_reset() {
        let mut detector = OnsetDetector::default();
        detector.detect_wrist(0.1, Duration::from_millis(0));
        detector.reset();
        assert!(!detector.detect_wrist(0.9, Duration::from_millis(20)));
    }
}
