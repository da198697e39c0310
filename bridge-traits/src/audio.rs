//! Audio platform bridge traits.
//!
//! The core drives two kinds of platform audio primitives:
//!
//! - A **node graph** ([`AudioGraph`]): decoded buffers played through a
//!   single-use source node feeding a gain stage and a stereo panner, all
//!   scheduled against a monotonic audio clock.
//! - A **media element** ([`MediaElement`]): a progressive streaming player
//!   with a position, volume and rate, but no gain automation or panning.
//!
//! Hosts expose both through [`AudioPlatform`]. A platform without a node
//! graph returns `None` from [`AudioPlatform::audio_graph`] and the core falls
//! back to media elements.

use bytes::Bytes;
use std::sync::Arc;

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Information the core already extracted from the encoded bytes.
///
/// Platforms may use it instead of probing the stream again.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodeHint {
    /// Stream duration in seconds, when the container exposes it.
    pub duration: Option<f64>,
    /// Sample rate in hertz, when known.
    pub sample_rate: Option<u32>,
}

/// Capability flags reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// The device has hardware/OS constraints (mobile browsers, low memory)
    /// that make fully decoded buffers a poor fit.
    pub constrained_device: bool,
    /// Ogg/Vorbis can be decoded. When `false` the core requests `.m4a` assets.
    pub supports_ogg: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            constrained_device: false,
            supports_ogg: true,
        }
    }
}

/// A fully decoded audio buffer owned by the node graph.
pub trait AudioBuffer: PlatformSendSync {
    /// Duration in seconds.
    fn duration(&self) -> f64;

    /// Sample rate in hertz.
    fn sample_rate(&self) -> u32;
}

/// Low-latency audio graph with a monotonic clock.
pub trait AudioGraph: PlatformSendSync {
    /// Monotonic audio clock in seconds.
    fn current_time(&self) -> f64;

    /// Decode an encoded stream into a reusable buffer.
    fn decode(&self, data: Bytes, hint: DecodeHint) -> Result<Arc<dyn AudioBuffer>>;

    /// Build a fresh source -> gain -> pan chain for `buffer`, connected to
    /// the shared output destination.
    fn create_chain(&self, buffer: Arc<dyn AudioBuffer>) -> Result<Box<dyn NodeChain>>;
}

/// One source -> gain -> pan chain.
///
/// The source stage is single-use: once started and stopped, a new chain is
/// required to play again.
pub trait NodeChain: PlatformSend {
    /// Configure native looping over `[loop_start, loop_end]`.
    fn set_loop(&mut self, looping: bool, loop_start: f64, loop_end: f64);

    /// Raw playback-rate multiplier on the source stage.
    fn set_playback_rate(&mut self, rate: f64);

    /// Set the gain immediately, cancelling any scheduled ramp.
    fn set_gain(&mut self, gain: f64);

    /// Gain value at the current audio-clock time.
    fn gain(&self) -> f64;

    /// Schedule a linear ramp from `from` at `start_time` to `to` at `end_time`.
    fn ramp_gain(&mut self, from: f64, to: f64, start_time: f64, end_time: f64);

    /// Stereo pan in `[-1, 1]`.
    fn set_pan(&mut self, pan: f64);

    /// Start the source at audio-clock time `when`, `offset` seconds into the buffer.
    fn start(&mut self, when: f64, offset: f64);

    /// Stop the source stage.
    fn stop(&mut self);

    /// Disconnect every stage from the destination.
    fn disconnect(&mut self);

    /// Whether a started, non-looping source has played past its end.
    fn has_ended(&self) -> bool;
}

/// Progressive streaming media element.
pub trait MediaElement: PlatformSend {
    fn play(&mut self);

    fn pause(&mut self);

    /// Current media position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    /// Media duration in seconds.
    fn duration(&self) -> f64;

    /// Volume in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);

    fn volume(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    /// Whether playback reached the end of the media.
    fn has_ended(&self) -> bool;

    /// Release the element's source (revoking any object URL it holds).
    fn release(&mut self);
}

/// Host audio platform.
pub trait AudioPlatform: PlatformSendSync {
    /// The node graph, or `None` when the platform has no such API.
    fn audio_graph(&self) -> Option<Arc<dyn AudioGraph>>;

    /// Create a media element streaming `data`.
    fn create_media_element(&self, data: Bytes, hint: DecodeHint)
        -> Result<Box<dyn MediaElement>>;

    fn capabilities(&self) -> PlatformCapabilities;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_prefer_ogg() {
        let caps = PlatformCapabilities::default();
        assert!(caps.supports_ogg);
        assert!(!caps.constrained_device);
    }

    #[test]
    fn decode_hint_defaults_empty() {
        let hint = DecodeHint::default();
        assert!(hint.duration.is_none());
        assert!(hint.sample_rate.is_none());
    }
}
