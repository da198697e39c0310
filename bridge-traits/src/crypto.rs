//! Asset Decryption Abstraction
//!
//! Games may ship their audio encrypted. The core only reads the capability
//! flag and hands fetched bytes through the transform before parsing them.

use bytes::Bytes;

use crate::{error::Result, platform::PlatformSendSync};

/// Optional transform applied to fetched audio bytes.
pub trait AudioDecryptor: PlatformSendSync {
    /// Whether the game's audio assets are stored encrypted.
    fn has_encrypted_audio(&self) -> bool;

    /// Map a plain asset URL to the URL of its encrypted counterpart.
    ///
    /// The default keeps the URL unchanged.
    fn encrypted_url(&self, url: &str) -> String {
        url.to_string()
    }

    /// Decrypt raw asset bytes into a playable container.
    fn decrypt(&self, data: Bytes) -> Result<Bytes>;
}
