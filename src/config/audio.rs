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
use serde::Deserialize;

/// Device name that selects the default output of the default host.
pub const DEFAULT_AUDIO_DEVICE: &str = "default";

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device (default: the system default output).
    device: Option<String>,

    /// Output sample rate in Hz (default: the device's preferred rate).
    sample_rate: Option<u32>,

    /// Resume output at startup instead of waiting for an interaction (default: true).
    auto_resume: Option<bool>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            sample_rate: None,
            auto_resume: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_AUDIO_DEVICE)
    }

    /// Returns the requested sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns whether output should resume at startup.
    pub fn auto_resume(&self) -> bool {
        self.auto_resume.unwrap_or(true)
    }
}
