//! Playback strategy seam.
//!
//! A backend picks its [`StrategyKind`] once, when it is constructed, and
//! instantiates the matching [`PlaybackStrategy`] once its media is decoded.
//! Everything after that goes through the trait object.

use bridge_traits::audio::{AudioPlatform, PlatformCapabilities};

use crate::clip::AudioClip;
use crate::loop_metadata::LoopWindow;

/// Which family of platform primitives a backend plays through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Decoded buffer through a source -> gain -> pan node chain.
    NodeGraph,
    /// Progressive media element.
    StreamingElement,
}

/// Inputs to strategy selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelection {
    pub force_streaming: bool,
    /// Use the node graph whenever it exists, ignoring device constraints and
    /// the streaming override.
    pub prefer_node_graph: bool,
}

impl StrategyKind {
    /// Choose a strategy for `platform`.
    ///
    /// Without a node graph the streaming element is the only option.
    pub fn select(platform: &dyn AudioPlatform, selection: StrategySelection) -> Self {
        let has_graph = platform.audio_graph().is_some();
        Self::select_with(has_graph, platform.capabilities(), selection)
    }

    pub fn select_with(
        has_graph: bool,
        capabilities: PlatformCapabilities,
        selection: StrategySelection,
    ) -> Self {
        if !has_graph {
            return StrategyKind::StreamingElement;
        }
        if selection.prefer_node_graph {
            return StrategyKind::NodeGraph;
        }
        if selection.force_streaming || capabilities.constrained_device {
            return StrategyKind::StreamingElement;
        }
        StrategyKind::NodeGraph
    }
}

/// Live output parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Linear gain in `[0, 1]`.
    pub gain: f64,
    /// Raw playback-rate factor. Changes speed and pitch together.
    pub pitch: f64,
    /// Stereo pan in `[-1, 1]`.
    pub pan: f64,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pitch: 1.0,
            pan: 0.0,
        }
    }
}

impl PlaybackParams {
    /// Parameters for `clip` under a channel master volume of `master` (0..=100).
    pub fn for_clip(clip: &AudioClip, master: u8) -> Self {
        Self {
            gain: (master.min(100) as f64 / 100.0) * (clip.volume.min(100) as f64 / 100.0),
            pitch: clip.pitch,
            pan: clip.pan as f64 / 100.0,
        }
    }
}

/// What a tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Playback wrapped from the loop end back to the loop start.
    Looped,
    /// A non-looping source reached its end.
    Ended,
}

/// One way of driving platform audio for a loaded backend.
pub trait PlaybackStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Media duration in seconds.
    fn duration(&self) -> f64;

    fn loop_window(&self) -> LoopWindow;

    /// Start from `offset` seconds, replacing any current playback.
    fn start(&mut self, looping: bool, offset: f64, params: PlaybackParams);

    /// Pause, keeping the media and position.
    fn pause(&mut self);

    /// Continue from the paused position.
    fn resume(&mut self, params: PlaybackParams);

    /// Halt and release every platform resource.
    fn stop(&mut self);

    /// Elapsed playback position in the current source, wrapped into the
    /// loop window while looping.
    fn position(&self) -> f64;

    fn set_position(&mut self, seconds: f64);

    fn apply_params(&mut self, params: PlaybackParams);

    /// Ramp from silence to `params.gain` over `duration` seconds.
    fn fade_in(&mut self, duration: f64, params: PlaybackParams);

    /// Ramp from the current gain to silence over `duration` seconds.
    fn fade_out(&mut self, duration: f64);

    fn is_fading(&self) -> bool;

    /// Gain currently reaching the output.
    fn output_gain(&self) -> f64;

    /// Per-frame poll.
    fn tick(&mut self) -> TickOutcome;
}
