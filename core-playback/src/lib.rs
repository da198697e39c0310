//! # Streaming Audio Core
//!
//! Channel-based audio playback on top of host-provided audio primitives.
//!
//! ## Overview
//!
//! This crate handles:
//! - Loop-point extraction from Ogg/Vorbis and MP4 headers ([`loop_metadata`])
//! - Playback backends with node-graph and streaming-element strategies ([`backend`])
//! - Tick-driven fade emulation for strategies without gain ramps ([`fade`])
//! - Preloading assets ahead of playback ([`registry`])
//! - Music, ambient, jingle and effect channels ([`manager`])
//! - Preload commands and encrypted asset support ([`commands`], [`cipher`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{AudioChannelManager, AudioClip, AudioSettings};
//!
//! let mut audio = AudioChannelManager::new(&core_config, AudioSettings::default())?;
//! audio.play_music(AudioClip::new("Theme1").with_volume(90), 0.0);
//! audio.flush_loads().await;
//!
//! // once per frame
//! audio.update();
//! ```

pub mod backend;
pub mod cipher;
pub mod clip;
pub mod commands;
pub mod config;
pub mod error;
pub mod fade;
pub mod loop_metadata;
pub mod manager;
pub mod registry;

pub use backend::{
    BackendId, LoadContext, PlaybackBackend, PlaybackParams, PlaybackState, PlaybackStrategy,
    StrategyKind, StrategySelection, TickOutcome,
};
pub use cipher::HeaderXorCipher;
pub use clip::{AudioCategory, AudioClip, AudioSnapshot, Channel};
pub use commands::AudioCommand;
pub use config::{AudioSettings, MasterVolumes};
pub use error::{PlaybackError, Result};
pub use fade::{FadeTimer, FADE_EPSILON};
pub use loop_metadata::{LoopMetadata, LoopMetadataReader, LoopWindow};
pub use manager::AudioChannelManager;
pub use registry::{PreloadEntry, PreloadRegistry};
