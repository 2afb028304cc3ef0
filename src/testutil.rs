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
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::landmarks::{Finger, FingerState, Hand, Landmark, LANDMARK_COUNT, WRIST};

/// Builds a hand with its wrist at the given position and each finger posed
/// extended or curled according to `state`.
pub fn hand_with_fingers(state: FingerState, wrist_x: f32, wrist_y: f32) -> Hand {
    let mut landmarks = [Landmark::new(wrist_x, wrist_y, 0.0); LANDMARK_COUNT];
    landmarks[WRIST] = Landmark::new(wrist_x, wrist_y, 0.0);

    // Thumb: CMC, MCP, IP, tip. Extension is sideways.
    let thumb_mcp_x = wrist_x - 0.08;
    let thumb_tip_x = if state.thumb {
        thumb_mcp_x - 0.1
    } else {
        thumb_mcp_x - 0.01
    };
    landmarks[1] = Landmark::new(wrist_x - 0.05, wrist_y - 0.05, 0.0);
    landmarks[Finger::Thumb.mcp()] = Landmark::new(thumb_mcp_x, wrist_y - 0.1, 0.0);
    landmarks[Finger::Thumb.pip()] =
        Landmark::new((thumb_mcp_x + thumb_tip_x) / 2.0, wrist_y - 0.13, 0.0);
    landmarks[Finger::Thumb.tip()] = Landmark::new(thumb_tip_x, wrist_y - 0.15, 0.0);

    // Other fingers: MCP, PIP, DIP, tip. Extension is upwards.
    let fingers = [
        (Finger::Index, -0.03),
        (Finger::Middle, 0.0),
        (Finger::Ring, 0.03),
        (Finger::Pinky, 0.06),
    ];
    for (finger, offset) in fingers {
        let x = wrist_x + offset;
        let (dip_y, tip_y) = if state.is_extended(finger) {
            (wrist_y - 0.35, wrist_y - 0.4)
        } else {
            (wrist_y - 0.27, wrist_y - 0.25)
        };
        landmarks[finger.mcp()] = Landmark::new(x, wrist_y - 0.2, 0.0);
        landmarks[finger.pip()] = Landmark::new(x, wrist_y - 0.3, 0.0);
        landmarks[finger.mcp() + 2] = Landmark::new(x, dip_y, 0.0);
        landmarks[finger.tip()] = Landmark::new(x, tip_y, 0.0);
    }

    Hand::new(landmarks)
}

/// A relaxed hand with its wrist at the given position.
pub fn hand_at(wrist_x: f32, wrist_y: f32) -> Hand {
    hand_with_fingers(FingerState::default(), wrist_x, wrist_y)
}

/// Encodes interleaved samples as a 32 bit float WAV file.
pub fn wav_bytes(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("unable to create WAV writer");
        for sample in samples {
            writer.write_sample(*sample).expect("unable to write sample");
        }
        writer.finalize().expect("unable to finalize WAV");
    }
    cursor.into_inner()
}
