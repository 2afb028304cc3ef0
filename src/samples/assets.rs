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
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use tracing::debug;

/// Errors from fetching raw sample bytes.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset {0} not found")]
    NotFound(String),

    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where encoded chord samples come from. Assets are addressed by chord name.
pub trait AssetSource: Send + Sync {
    /// Fetches the raw encoded bytes of the named asset.
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetError>>;

    /// Format hint for the decoder, usually a file extension.
    fn format_hint(&self) -> Option<&str> {
        None
    }
}

/// Reads `{root}/{name}.{extension}` from the file system.
#[derive(Clone, Debug)]
pub struct DirectoryAssetSource {
    root: PathBuf,
    extension: String,
}

impl DirectoryAssetSource {
    pub fn new(root: &Path, extension: &str) -> DirectoryAssetSource {
        DirectoryAssetSource {
            root: root.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// The file an asset name resolves to.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, self.extension))
    }
}

impl AssetSource for DirectoryAssetSource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetError>> {
        Box::pin(async move {
            let path = self.path(name);
            debug!(path = ?path, "Reading sample asset");
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(AssetError::NotFound(path.display().to_string()))
                }
                Err(source) => Err(AssetError::Io { path, source }),
            }
        })
    }

    fn format_hint(&self) -> Option<&str> {
        Some(&self.extension)
    }
}

/// Assets held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetSource {
    assets: HashMap<String, Vec<u8>>,
    hint: Option<String>,
}

impl MemoryAssetSource {
    pub fn new(hint: Option<&str>) -> MemoryAssetSource {
        MemoryAssetSource {
            assets: HashMap::new(),
            hint: hint.map(str::to_string),
        }
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.assets.insert(name.to_string(), bytes);
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetError>> {
        Box::pin(async move {
            self.assets
                .get(name)
                .cloned()
                .ok_or_else(|| AssetError::NotFound(name.to_string()))
        })
    }

    fn format_hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Am.wav"), b"riff").unwrap();

        let source = DirectoryAssetSource::new(dir.path(), ".wav");
        assert_eq!(source.path("Am"), dir.path().join("Am.wav"));
        assert_eq!(source.fetch("Am").await.unwrap(), b"riff".to_vec());
        assert!(matches!(
            source.fetch("G").await,
            Err(AssetError::NotFound(_))
        ));
        assert_eq!(source.format_hint(), Some("wav"));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let mut source = MemoryAssetSource::new(Some("wav"));
        source.insert("C", vec![1, 2, 3]);
        assert_eq!(source.fetch("C").await.unwrap(), vec![1, 2, 3]);
        assert!(source.fetch("D").await.is_err());
    }
}
