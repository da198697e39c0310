//! Asset Fetch Abstraction
//!
//! The audio core never performs I/O itself. Raw asset bytes are requested
//! through [`AssetFetcher`]; retries, caching headers and timeouts are the
//! implementation's business.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::Result, platform::PlatformSendSync};

/// Async source of raw asset bytes.
///
/// Implementations resolve `url` however the host sees fit (HTTP, a local
/// directory, an archive, an in-memory bundle) and return
/// [`BridgeError::NotFound`](crate::error::BridgeError::NotFound) when the
/// asset does not exist.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::fetch::AssetFetcher;
///
/// async fn fetch_title_theme(fetcher: &dyn AssetFetcher) {
///     match fetcher.fetch("audio/bgm/Theme1.ogg").await {
///         Ok(bytes) => println!("{} bytes", bytes.len()),
///         Err(e) => eprintln!("fetch failed: {}", e),
///     }
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AssetFetcher: PlatformSendSync {
    /// Fetch the complete contents of the asset at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}
