//! Asset fetcher reading from a local directory using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    fetch::AssetFetcher,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based asset fetcher
///
/// Resolves asset URLs relative to a game directory. Percent-encoded names
/// (`audio/se/Cursor%201.ogg`) are decoded before touching the filesystem.
pub struct TokioAssetFetcher {
    root: PathBuf,
}

impl TokioAssetFetcher {
    /// Create a fetcher rooted at the current working directory
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("."))
    }

    /// Create a fetcher rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory assets are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let decoded = urlencoding::decode(url)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| url.to_string());
        self.root.join(decoded.trim_start_matches('/'))
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(url: &str, e: std::io::Error) -> BridgeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(url.to_string())
        } else {
            BridgeError::Io(e)
        }
    }
}

impl Default for TokioAssetFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for TokioAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let path = self.resolve(url);
        debug!(path = ?path, "Reading asset");
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_io_error(url, e))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_existing_file() {
        let dir = std::env::temp_dir().join(format!("stream-audio-fs-{}", std::process::id()));
        fs::create_dir_all(dir.join("audio/se")).await.unwrap();
        fs::write(dir.join("audio/se/Cursor 1.ogg"), b"OggS")
            .await
            .unwrap();

        let fetcher = TokioAssetFetcher::with_root(&dir);
        let data = fetcher.fetch("audio/se/Cursor%201.ogg").await.unwrap();
        assert_eq!(&data[..], b"OggS");

        fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let fetcher = TokioAssetFetcher::with_root(std::env::temp_dir());
        let err = fetcher
            .fetch("audio/bgm/does-not-exist.ogg")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
