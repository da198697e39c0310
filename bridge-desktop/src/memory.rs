//! In-memory asset fetcher for bundled assets and tests

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    fetch::AssetFetcher,
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Asset fetcher serving bytes registered up front.
///
/// Counts fetches per URL so callers can verify that an asset was not
/// requested twice.
#[derive(Default)]
pub struct MemoryAssetFetcher {
    assets: RwLock<HashMap<String, Bytes>>,
    fetch_counts: RwLock<HashMap<String, usize>>,
}

impl MemoryAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bytes served for `url`
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.assets.write().insert(url.into(), data.into());
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_asset(self, url: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(url, data);
        self
    }

    /// Number of fetches issued for `url`, found or not
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetch_counts.read().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AssetFetcher for MemoryAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        *self.fetch_counts.write().entry(url.to_string()).or_insert(0) += 1;
        self.assets
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_assets() {
        let fetcher = MemoryAssetFetcher::new().with_asset("audio/se/Decision1.ogg", &b"abc"[..]);

        let data = fetcher.fetch("audio/se/Decision1.ogg").await.unwrap();
        assert_eq!(&data[..], b"abc");
        assert!(fetcher.fetch("audio/se/Missing.ogg").await.unwrap_err().is_not_found());
        assert_eq!(fetcher.fetch_count("audio/se/Decision1.ogg"), 1);
        assert_eq!(fetcher.fetch_count("audio/se/Missing.ogg"), 1);
    }
}
