//! Runtime errors raised while wiring the audio core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or logging setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
