//! # Playback Error Types
//!
//! Error types for asset loading, decryption and channel control.
//!
//! None of these are fatal to the host: load failures are stored on the
//! backend that hit them, misuse is logged and ignored.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The asset does not exist at the requested URL.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Fetching the asset failed for a reason other than absence.
    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// Encrypted asset could not be decrypted.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The platform rejected the audio data.
    #[error("Media error: {0}")]
    Media(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Operation needs a media handle the backend does not have.
    #[error("No media loaded: {0}")]
    NoMedia(String),

    /// A plugin-style command had unusable arguments.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Error reported by a host bridge.
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Map a fetcher error for `url` onto the playback taxonomy.
    pub fn from_fetch(url: &str, err: BridgeError) -> Self {
        if err.is_not_found() {
            PlaybackError::AssetNotFound(url.to_string())
        } else {
            PlaybackError::FetchFailed {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::FetchFailed { .. })
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::FetchFailed { .. } | PlaybackError::AssetNotFound(_)
        )
    }

    /// Returns `true` if this error signals a caller mistake rather than a
    /// runtime failure.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoMedia(_)
                | PlaybackError::InvalidCommand(_)
                | PlaybackError::InvalidSettings(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Media(message) => PlaybackError::Media(message),
            BridgeError::NotFound(what) => PlaybackError::AssetNotFound(what),
            other => PlaybackError::Bridge(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
