//! Workspace facade crate.
//!
//! Re-exports the workspace crates so a host can depend on
//! `stream-audio-core` alone. The `desktop-shims` feature (on by default)
//! pulls in the desktop bridges: asset fetchers and the headless platform.

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;

pub use core_playback::{AudioChannelManager, AudioClip, AudioSettings, PlaybackBackend};
pub use core_runtime::config::CoreConfig;
