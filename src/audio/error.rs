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
/// Error types for audio output operations
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No output device found with name {0}")]
    DeviceNotFound(String),

    #[error("Unable to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Audio host unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("Unable to get default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("Audio device is closed")]
    Closed,

    #[error("Output thread exited unexpectedly")]
    OutputThread,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
