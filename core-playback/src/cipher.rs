//! Header XOR cipher for encrypted audio assets.
//!
//! Encrypted files carry a fixed 16-byte signature header, followed by the
//! original file whose first 16 bytes are XORed with the game's key.
//! Encrypted assets use the `.rpgmvo` (Ogg) and `.rpgmvm` (M4A) extensions.

use bridge_traits::{error::Result as BridgeResult, AudioDecryptor, BridgeError};
use bytes::{Bytes, BytesMut};

use crate::error::{PlaybackError, Result};

const HEADER_LEN: usize = 16;
const SIGNATURE: [u8; HEADER_LEN] = [
    0x52, 0x50, 0x47, 0x4d, 0x56, 0x00, 0x00, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Clone)]
pub struct HeaderXorCipher {
    key: [u8; HEADER_LEN],
    enabled: bool,
}

impl HeaderXorCipher {
    /// Cipher from a 32-hex-digit key.
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes = hex::decode(key.trim())
            .map_err(|e| PlaybackError::Decryption(format!("invalid key: {e}")))?;
        let key: [u8; HEADER_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            PlaybackError::Decryption(format!("key must be {HEADER_LEN} bytes, got {}", b.len()))
        })?;
        Ok(Self { key, enabled: true })
    }

    /// Toggle whether assets are treated as encrypted.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Strip the header and restore the first payload bytes.
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Bytes> {
        if data.len() < HEADER_LEN {
            return Err(PlaybackError::Decryption(format!(
                "input too short: {} bytes",
                data.len()
            )));
        }
        if data[..HEADER_LEN] != SIGNATURE {
            return Err(PlaybackError::Decryption("header signature mismatch".to_string()));
        }

        let mut body = BytesMut::from(&data[HEADER_LEN..]);
        for (byte, key) in body.iter_mut().zip(self.key.iter()) {
            *byte ^= key;
        }
        Ok(body.freeze())
    }

    /// Inverse of [`decrypt_bytes`](Self::decrypt_bytes).
    pub fn encrypt_bytes(&self, data: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER_LEN + data.len());
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(data);
        for (byte, key) in out[HEADER_LEN..].iter_mut().zip(self.key.iter()) {
            *byte ^= key;
        }
        out.freeze()
    }
}

impl AudioDecryptor for HeaderXorCipher {
    fn has_encrypted_audio(&self) -> bool {
        self.enabled
    }

    fn encrypted_url(&self, url: &str) -> String {
        if let Some(stem) = url.strip_suffix(".ogg") {
            format!("{stem}.rpgmvo")
        } else if let Some(stem) = url.strip_suffix(".m4a") {
            format!("{stem}.rpgmvm")
        } else {
            url.to_string()
        }
    }

    fn decrypt(&self, data: Bytes) -> BridgeResult<Bytes> {
        self.decrypt_bytes(&data)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))
    }
}
