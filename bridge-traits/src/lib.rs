//! # Host Bridge Traits
//!
//! Platform abstraction traits that the audio core requires from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the streaming audio core and the
//! engine or application embedding it. Each trait represents a capability the
//! core needs but that is implemented differently per platform (desktop,
//! browser, mobile).
//!
//! ## Traits
//!
//! ### Assets
//! - [`AssetFetcher`](fetch::AssetFetcher) - Async retrieval of raw asset bytes
//! - [`AudioDecryptor`](crypto::AudioDecryptor) - Optional decryption of encrypted audio
//!
//! ### Audio
//! - [`AudioPlatform`](audio::AudioPlatform) - Entry point to the host's audio primitives
//! - [`AudioGraph`](audio::AudioGraph) / [`NodeChain`](audio::NodeChain) - Node-graph playback
//! - [`MediaElement`](audio::MediaElement) - Streaming-element playback
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Fetchers + headless platform |
//! | Web      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map a missing asset to `BridgeError::NotFound` so the core can tell
//! it apart from transport failures.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` on native targets so they can be shared
//! between the frame loop and the task pumping asset loads.

pub mod audio;
pub mod crypto;
pub mod error;
pub mod fetch;
pub mod logger;
pub mod platform;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio::{
    AudioBuffer, AudioGraph, AudioPlatform, DecodeHint, MediaElement, NodeChain,
    PlatformCapabilities,
};
pub use crypto::AudioDecryptor;
pub use fetch::AssetFetcher;
pub use logger::{LogEntry, LogLevel, LoggerSink};
