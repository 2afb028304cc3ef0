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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::samples::{DirectoryAssetSource, DEFAULT_VOLUME};

const DEFAULT_DIRECTORY: &str = "sounds";
const DEFAULT_EXTENSION: &str = "mp3";

/// Where chord samples are read from. Each chord is `{directory}/{chord}.{extension}`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Samples {
    directory: Option<String>,
    extension: Option<String>,
    volume: Option<f32>,
}

impl Samples {
    /// Returns the sample directory. Relative paths are resolved against `base`.
    pub fn directory(&self, base: &Path) -> PathBuf {
        let directory = PathBuf::from(self.directory.as_deref().unwrap_or(DEFAULT_DIRECTORY));
        if directory.is_absolute() {
            directory
        } else {
            base.join(directory)
        }
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    /// Returns the sample playback volume (default: 1.0).
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }

    /// Creates the asset source described by this configuration.
    pub fn asset_source(&self, base: &Path) -> DirectoryAssetSource {
        DirectoryAssetSource::new(&self.directory(base), self.extension())
    }
}
