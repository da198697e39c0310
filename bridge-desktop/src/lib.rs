//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux) and headless hosts.
//!
//! ## Overview
//!
//! - `AssetFetcher` over HTTP using `reqwest` ([`ReqwestAssetFetcher`])
//! - `AssetFetcher` over a game directory using `tokio::fs` ([`TokioAssetFetcher`])
//! - `AssetFetcher` over bundled bytes ([`MemoryAssetFetcher`])
//! - `AudioPlatform` driven by a virtual clock ([`HeadlessAudioPlatform`]),
//!   with stream probing through `symphonia`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HeadlessAudioPlatform, TokioAssetFetcher, VirtualClock};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = TokioAssetFetcher::with_root("/path/to/game");
//!     let clock = VirtualClock::new();
//!     let platform = HeadlessAudioPlatform::new(clock.clone());
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod headless;
mod http;
mod memory;
mod probe;

pub use filesystem::TokioAssetFetcher;
pub use headless::{
    HeadlessAudioGraph, HeadlessAudioPlatform, HeadlessMediaElement, HeadlessNodeChain,
    VirtualClock,
};
pub use http::{ReqwestAssetFetcher, RetryPolicy};
pub use memory::MemoryAssetFetcher;
pub use probe::{probe_stream, StreamInfo};
