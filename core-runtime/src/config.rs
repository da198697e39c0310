//! # Core Configuration Module
//!
//! Provides configuration management for the audio core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges the channel manager needs. It enforces
//! fail-fast validation so missing capabilities surface before any audio is
//! requested.
//!
//! ## Required Dependencies
//!
//! - `AudioPlatform` - Node graph and/or media elements
//! - `AssetFetcher` - Asset bytes (desktop default: tokio fs rooted at the game directory)
//!
//! ## Optional Dependencies
//!
//! - `AudioDecryptor` - Encrypted asset support
//! - `EventBus` - Channel event notifications
//!
//! When the `desktop-shims` feature is enabled, a `TokioAssetFetcher` rooted
//! at [`CoreConfigBuilder::game_dir`] is injected if no fetcher is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .asset_fetcher(Arc::new(MyFetcher))
//!     .audio_platform(Arc::new(MyPlatform))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::{EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use bridge_traits::{AssetFetcher, AudioDecryptor, AudioPlatform};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory local asset URLs are resolved against
    pub game_dir: PathBuf,

    /// Asset byte source (required)
    pub asset_fetcher: Arc<dyn AssetFetcher>,

    /// Host audio primitives (required)
    pub audio_platform: Arc<dyn AudioPlatform>,

    /// Encrypted asset support (optional)
    pub decryptor: Option<Arc<dyn AudioDecryptor>>,

    /// Channel event notifications (optional)
    pub event_bus: Option<EventBus>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("game_dir", &self.game_dir)
            .field("asset_fetcher", &"AssetFetcher { ... }")
            .field("audio_platform", &"AudioPlatform { ... }")
            .field(
                "decryptor",
                &self.decryptor.as_ref().map(|_| "AudioDecryptor { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.game_dir.as_os_str().is_empty() {
            return Err(Error::Config("Game directory cannot be empty".to_string()));
        }

        if let Some(decryptor) = &self.decryptor {
            if !decryptor.has_encrypted_audio() {
                tracing::debug!("Decryptor provided but game reports plain audio assets");
            }
        }

        Ok(())
    }

    /// Whether fetched assets must go through the decryptor.
    pub fn has_encrypted_audio(&self) -> bool {
        self.decryptor
            .as_ref()
            .map(|d| d.has_encrypted_audio())
            .unwrap_or(false)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn asset_fetcher_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AssetFetcher".to_string(),
        message: "AssetFetcher implementation is required to load audio assets. \
                 Desktop: enable the 'desktop-shims' feature to read from the game directory. \
                 Web: inject a fetch-based implementation."
            .to_string(),
    }
}

fn audio_platform_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioPlatform".to_string(),
        message: "AudioPlatform implementation is required for playback. \
                 Inject the host's audio primitives, or bridge_desktop::HeadlessAudioPlatform \
                 for tools and servers."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_asset_fetcher(game_dir: &std::path::Path) -> Result<Arc<dyn AssetFetcher>> {
    use bridge_desktop::TokioAssetFetcher;

    let fetcher: Arc<dyn AssetFetcher> = Arc::new(TokioAssetFetcher::with_root(game_dir));
    Ok(fetcher)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_asset_fetcher(_game_dir: &std::path::Path) -> Result<Arc<dyn AssetFetcher>> {
    Err(asset_fetcher_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    game_dir: Option<PathBuf>,
    asset_fetcher: Option<Arc<dyn AssetFetcher>>,
    audio_platform: Option<Arc<dyn AudioPlatform>>,
    decryptor: Option<Arc<dyn AudioDecryptor>>,
    event_bus: Option<EventBus>,
}

impl CoreConfigBuilder {
    /// Sets the directory local asset URLs are resolved against.
    ///
    /// Default: the current working directory.
    pub fn game_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.game_dir = Some(path.into());
        self
    }

    /// Sets the asset fetcher.
    pub fn asset_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.asset_fetcher = Some(fetcher);
        self
    }

    /// Sets the host audio platform.
    pub fn audio_platform(mut self, platform: Arc<dyn AudioPlatform>) -> Self {
        self.audio_platform = Some(platform);
        self
    }

    /// Sets the decryptor for encrypted games.
    pub fn decryptor(mut self, decryptor: Arc<dyn AudioDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Sets the event bus channel events are published on.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Creates and attaches a default-sized event bus.
    pub fn with_default_event_bus(self) -> Self {
        self.event_bus(EventBus::new(DEFAULT_EVENT_BUFFER_SIZE))
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityMissing` when a required bridge is absent and
    /// no platform default is available.
    pub fn build(self) -> Result<CoreConfig> {
        let game_dir = self.game_dir.unwrap_or_else(|| PathBuf::from("."));

        let audio_platform = self
            .audio_platform
            .ok_or_else(audio_platform_missing_error)?;

        let asset_fetcher = match self.asset_fetcher {
            Some(fetcher) => fetcher,
            None => provide_default_asset_fetcher(&game_dir)?,
        };

        let config = CoreConfig {
            game_dir,
            asset_fetcher,
            audio_platform,
            decryptor: self.decryptor,
            event_bus: self.event_bus,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::audio::{
        AudioGraph, DecodeHint, MediaElement, PlatformCapabilities,
    };
    use bridge_traits::BridgeError;
    use bytes::Bytes;

    struct StubFetcher;

    #[async_trait]
    impl AssetFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> bridge_traits::error::Result<Bytes> {
            Err(BridgeError::NotFound(url.to_string()))
        }
    }

    struct StubPlatform;

    impl AudioPlatform for StubPlatform {
        fn audio_graph(&self) -> Option<Arc<dyn AudioGraph>> {
            None
        }

        fn create_media_element(
            &self,
            _data: Bytes,
            _hint: DecodeHint,
        ) -> bridge_traits::error::Result<Box<dyn MediaElement>> {
            Err(BridgeError::NotAvailable("stub".to_string()))
        }

        fn capabilities(&self) -> PlatformCapabilities {
            PlatformCapabilities::default()
        }
    }

    struct StubDecryptor;

    impl AudioDecryptor for StubDecryptor {
        fn has_encrypted_audio(&self) -> bool {
            true
        }

        fn decrypt(&self, data: Bytes) -> bridge_traits::error::Result<Bytes> {
            Ok(data)
        }
    }

    #[test]
    fn test_builder_requires_audio_platform() {
        let result = CoreConfig::builder()
            .asset_fetcher(Arc::new(StubFetcher))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioPlatform");
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_asset_fetcher() {
        let result = CoreConfig::builder()
            .audio_platform(Arc::new(StubPlatform))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "AssetFetcher"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_default_fetcher() {
        let config = CoreConfig::builder()
            .game_dir("/tmp/game")
            .audio_platform(Arc::new(StubPlatform))
            .build()
            .expect("desktop defaults should succeed");

        assert_eq!(config.game_dir, PathBuf::from("/tmp/game"));
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = CoreConfig::builder()
            .asset_fetcher(Arc::new(StubFetcher))
            .audio_platform(Arc::new(StubPlatform))
            .decryptor(Arc::new(StubDecryptor))
            .with_default_event_bus()
            .build()
            .unwrap();

        assert!(config.has_encrypted_audio());
        assert!(config.event_bus.is_some());
        assert_eq!(config.game_dir, PathBuf::from("."));
    }

    #[test]
    fn test_validate_rejects_empty_game_dir() {
        let result = CoreConfig::builder()
            .game_dir("")
            .asset_fetcher(Arc::new(StubFetcher))
            .audio_platform(Arc::new(StubPlatform))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = CoreConfig::builder()
            .asset_fetcher(Arc::new(StubFetcher))
            .audio_platform(Arc::new(StubPlatform))
            .build()
            .unwrap();

        let cloned = config.clone();
        assert!(!cloned.has_encrypted_audio());
        let rendered = format!("{:?}", cloned);
        assert!(rendered.contains("AssetFetcher { ... }"));
    }
}
