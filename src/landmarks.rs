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

//! Hand landmark data as delivered by the external detector.
//!
//! Every frame is an independent snapshot: hands carry no identity from one
//! frame to the next.

use std::fmt;
use std::time::Duration;

/// Number of keypoints per detected hand.
pub const LANDMARK_COUNT: usize = 21;

/// Landmark index of the wrist.
pub const WRIST: usize = 0;

/// A single normalized keypoint. x and y are in [0, 1] relative to the frame,
/// with smaller y being higher on screen. z is a relative depth estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Landmark {
        Landmark { x, y, z }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(value: [f32; 3]) -> Self {
        Landmark::new(value[0], value[1], value[2])
    }
}

/// The five fingers, in fingerprint order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers in fingerprint order.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Index of the knuckle joining the finger to the palm.
    pub fn mcp(&self) -> usize {
        match self {
            Finger::Thumb => 2,
            Finger::Index => 5,
            Finger::Middle => 9,
            Finger::Ring => 13,
            Finger::Pinky => 17,
        }
    }

    /// Index of the middle joint. For the thumb this is the IP joint.
    pub fn pip(&self) -> usize {
        self.mcp() + 1
    }

    /// Index of the fingertip.
    pub fn tip(&self) -> usize {
        self.mcp() + if *self == Finger::Thumb { 2 } else { 3 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

/// Error raised when raw detector output can't be turned into a hand.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} landmarks per hand, got {0}")]
    WrongCount(usize),

    #[error("landmark {index} has a non-finite coordinate")]
    NotFinite { index: usize },
}

/// One detected hand: exactly 21 landmarks in anatomical order.
#[derive(Clone, Debug, PartialEq)]
pub struct Hand {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl Hand {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Hand {
        Hand { landmarks }
    }

    /// Gets the landmark at the given anatomical index.
    pub fn landmark(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn wrist(&self) -> &Landmark {
        &self.landmarks[WRIST]
    }

    pub fn tip(&self, finger: Finger) -> &Landmark {
        &self.landmarks[finger.tip()]
    }

    pub fn pip(&self, finger: Finger) -> &Landmark {
        &self.landmarks[finger.pip()]
    }

    pub fn mcp(&self, finger: Finger) -> &Landmark {
        &self.landmarks[finger.mcp()]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }
}

impl TryFrom<Vec<[f32; 3]>> for Hand {
    type Error = LandmarkError;

    fn try_from(raw: Vec<[f32; 3]>) -> Result<Self, Self::Error> {
        if raw.len() != LANDMARK_COUNT {
            return Err(LandmarkError::WrongCount(raw.len()));
        }
        if let Some(index) = raw
            .iter()
            .position(|point| point.iter().any(|v| !v.is_finite()))
        {
            return Err(LandmarkError::NotFinite { index });
        }

        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (slot, point) in landmarks.iter_mut().zip(raw) {
            *slot = Landmark::from(point);
        }
        Ok(Hand { landmarks })
    }
}

/// Extended/curled state of each finger of one hand in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    pub const fn new(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> Self {
        FingerState {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    /// Number of fingers whose state agrees with the other state (0 to 5).
    pub fn matches(&self, other: &FingerState) -> usize {
        Finger::ALL
            .iter()
            .filter(|finger| self.is_extended(**finger) == other.is_extended(**finger))
            .count()
    }
}

impl fmt::Display for FingerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: String = Finger::ALL
            .iter()
            .map(|finger| if self.is_extended(*finger) { 'T' } else { 'F' })
            .collect();
        write!(f, "{}", flags)
    }
}

/// All hands seen in one camera frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandFrame {
    /// Capture time of the frame, if the source recorded one.
    pub timestamp: Option<Duration>,
    pub hands: Vec<Hand>,
}

impl HandFrame {
    pub fn new(hands: Vec<Hand>) -> HandFrame {
        HandFrame {
            timestamp: None,
            hands,
        }
    }

    pub fn at(timestamp: Duration, hands: Vec<Hand>) -> HandFrame {
        HandFrame {
            timestamp: Some(timestamp),
            hands,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}
