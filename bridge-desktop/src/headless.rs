//! Headless audio platform
//!
//! Implements the audio bridge traits without producing sound. Positions,
//! gains and end-of-stream are computed from a [`VirtualClock`] the host
//! advances explicitly, which makes playback behaviour deterministic for
//! servers, tools and tests.

use bridge_traits::{
    audio::{
        AudioBuffer, AudioGraph, AudioPlatform, DecodeHint, MediaElement, NodeChain,
        PlatformCapabilities,
    },
    error::{BridgeError, Result},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::debug;

use crate::probe::probe_stream;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Shared, manually advanced clock in seconds.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Arc<Mutex<f64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        *self.now.lock()
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds.max(0.0);
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock() = seconds;
    }
}

/// Stream properties for freshly created buffers and elements.
fn resolve_stream(data: &Bytes, hint: DecodeHint, default_duration: f64) -> Result<(f64, u32)> {
    if data.is_empty() {
        return Err(BridgeError::Media("empty audio stream".to_string()));
    }

    let probed = if hint.duration.is_none() || hint.sample_rate.is_none() {
        probe_stream(data).unwrap_or_default()
    } else {
        Default::default()
    };

    let duration = hint
        .duration
        .or(probed.duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(default_duration);
    let sample_rate = hint
        .sample_rate
        .or(probed.sample_rate)
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    Ok((duration, sample_rate))
}

/// Headless host platform.
pub struct HeadlessAudioPlatform {
    clock: VirtualClock,
    graph: Option<Arc<HeadlessAudioGraph>>,
    capabilities: PlatformCapabilities,
    default_duration: f64,
    elements_created: AtomicUsize,
}

impl HeadlessAudioPlatform {
    /// Platform with both a node graph and media elements.
    pub fn new(clock: VirtualClock) -> Self {
        let default_duration = 60.0;
        Self {
            graph: Some(Arc::new(HeadlessAudioGraph::new(
                clock.clone(),
                default_duration,
            ))),
            clock,
            capabilities: PlatformCapabilities::default(),
            default_duration,
            elements_created: AtomicUsize::new(0),
        }
    }

    /// Platform without a node graph.
    pub fn streaming_only(clock: VirtualClock) -> Self {
        Self {
            graph: None,
            ..Self::new(clock)
        }
    }

    pub fn with_capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Duration used when neither the hint nor a probe yields one.
    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        if let Some(graph) = self.graph.as_mut() {
            *graph = Arc::new(HeadlessAudioGraph::new(self.clock.clone(), seconds));
        }
        self
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Number of node chains built so far.
    pub fn chains_created(&self) -> usize {
        self.graph
            .as_ref()
            .map(|g| g.chains_created.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of media elements built so far.
    pub fn elements_created(&self) -> usize {
        self.elements_created.load(Ordering::Relaxed)
    }
}

impl AudioPlatform for HeadlessAudioPlatform {
    fn audio_graph(&self) -> Option<Arc<dyn AudioGraph>> {
        self.graph.clone().map(|g| g as Arc<dyn AudioGraph>)
    }

    fn create_media_element(
        &self,
        data: Bytes,
        hint: DecodeHint,
    ) -> Result<Box<dyn MediaElement>> {
        let (duration, _) = resolve_stream(&data, hint, self.default_duration)?;
        self.elements_created.fetch_add(1, Ordering::Relaxed);
        debug!(duration, "Created headless media element");
        Ok(Box::new(HeadlessMediaElement::new(self.clock.clone(), duration)))
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }
}

#[derive(Debug)]
struct HeadlessBuffer {
    duration: f64,
    sample_rate: u32,
}

impl AudioBuffer for HeadlessBuffer {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Node graph driven by a [`VirtualClock`].
pub struct HeadlessAudioGraph {
    clock: VirtualClock,
    default_duration: f64,
    chains_created: AtomicUsize,
}

impl HeadlessAudioGraph {
    pub fn new(clock: VirtualClock, default_duration: f64) -> Self {
        Self {
            clock,
            default_duration,
            chains_created: AtomicUsize::new(0),
        }
    }
}

impl AudioGraph for HeadlessAudioGraph {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn decode(&self, data: Bytes, hint: DecodeHint) -> Result<Arc<dyn AudioBuffer>> {
        let (duration, sample_rate) = resolve_stream(&data, hint, self.default_duration)?;
        Ok(Arc::new(HeadlessBuffer {
            duration,
            sample_rate,
        }))
    }

    fn create_chain(&self, buffer: Arc<dyn AudioBuffer>) -> Result<Box<dyn NodeChain>> {
        self.chains_created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HeadlessNodeChain::new(
            self.clock.clone(),
            buffer.duration(),
        )))
    }
}

#[derive(Debug, Clone, Copy)]
enum GainState {
    Fixed(f64),
    Ramp {
        from: f64,
        to: f64,
        start_time: f64,
        end_time: f64,
    },
}

/// Source -> gain -> pan chain over a virtual buffer.
pub struct HeadlessNodeChain {
    clock: VirtualClock,
    duration: f64,
    looping: bool,
    loop_start: f64,
    loop_end: f64,
    rate: f64,
    gain: GainState,
    pan: f64,
    started: Option<(f64, f64)>,
    stopped: bool,
    connected: bool,
}

impl HeadlessNodeChain {
    pub fn new(clock: VirtualClock, duration: f64) -> Self {
        Self {
            clock,
            duration,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            rate: 1.0,
            gain: GainState::Fixed(1.0),
            pan: 0.0,
            started: None,
            stopped: false,
            connected: true,
        }
    }

    fn raw_position(&self) -> Option<f64> {
        let (when, offset) = self.started?;
        let elapsed = (self.clock.now() - when).max(0.0) * self.rate;
        Some(offset + elapsed)
    }

    /// Playback position in seconds within the buffer.
    pub fn position(&self) -> f64 {
        let Some(pos) = self.raw_position() else {
            return 0.0;
        };
        let (start, end) = if self.loop_end > self.loop_start {
            (self.loop_start, self.loop_end)
        } else {
            (0.0, self.duration)
        };
        if self.looping && end > start && pos > end {
            start + (pos - start) % (end - start)
        } else {
            pos.min(self.duration)
        }
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl NodeChain for HeadlessNodeChain {
    fn set_loop(&mut self, looping: bool, loop_start: f64, loop_end: f64) {
        self.looping = looping;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain = GainState::Fixed(gain);
    }

    fn gain(&self) -> f64 {
        match self.gain {
            GainState::Fixed(g) => g,
            GainState::Ramp {
                from,
                to,
                start_time,
                end_time,
            } => {
                let now = self.clock.now();
                if now <= start_time {
                    from
                } else if now >= end_time || end_time <= start_time {
                    to
                } else {
                    from + (to - from) * (now - start_time) / (end_time - start_time)
                }
            }
        }
    }

    fn ramp_gain(&mut self, from: f64, to: f64, start_time: f64, end_time: f64) {
        self.gain = GainState::Ramp {
            from,
            to,
            start_time,
            end_time,
        };
    }

    fn set_pan(&mut self, pan: f64) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    fn start(&mut self, when: f64, offset: f64) {
        self.started = Some((when, offset.max(0.0)));
        self.stopped = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn has_ended(&self) -> bool {
        if self.looping || self.stopped {
            return false;
        }
        self.raw_position()
            .map(|pos| pos >= self.duration)
            .unwrap_or(false)
    }
}

/// Streaming element over a virtual stream.
pub struct HeadlessMediaElement {
    clock: VirtualClock,
    duration: f64,
    base_position: f64,
    playing_since: Option<f64>,
    rate: f64,
    volume: f64,
    released: bool,
}

impl HeadlessMediaElement {
    pub fn new(clock: VirtualClock, duration: f64) -> Self {
        Self {
            clock,
            duration,
            base_position: 0.0,
            playing_since: None,
            rate: 1.0,
            volume: 1.0,
            released: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl MediaElement for HeadlessMediaElement {
    fn play(&mut self) {
        if self.released || self.playing_since.is_some() {
            return;
        }
        if self.base_position >= self.duration {
            self.base_position = 0.0;
        }
        self.playing_since = Some(self.clock.now());
    }

    fn pause(&mut self) {
        self.base_position = self.current_time();
        self.playing_since = None;
    }

    fn current_time(&self) -> f64 {
        let pos = match self.playing_since {
            Some(since) => self.base_position + (self.clock.now() - since).max(0.0) * self.rate,
            None => self.base_position,
        };
        pos.min(self.duration)
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.base_position = seconds.clamp(0.0, self.duration);
        if self.playing_since.is_some() {
            self.playing_since = Some(self.clock.now());
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if self.playing_since.is_some() {
            self.base_position = self.current_time();
            self.playing_since = Some(self.clock.now());
        }
        self.rate = rate;
    }

    fn has_ended(&self) -> bool {
        self.current_time() >= self.duration
    }

    fn release(&mut self) {
        self.pause();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(duration: f64) -> DecodeHint {
        DecodeHint {
            duration: Some(duration),
            sample_rate: Some(44_100),
        }
    }

    #[test]
    fn test_chain_loops_within_window() {
        let clock = VirtualClock::new();
        let mut chain = HeadlessNodeChain::new(clock.clone(), 10.0);
        chain.set_loop(true, 2.0, 6.0);
        chain.start(0.0, 0.0);

        clock.advance(5.0);
        assert!((chain.position() - 5.0).abs() < 1e-9);
        clock.advance(2.0);
        assert!((chain.position() - 3.0).abs() < 1e-9);
        assert!(!chain.has_ended());
    }

    #[test]
    fn test_chain_ends_without_loop() {
        let clock = VirtualClock::new();
        let mut chain = HeadlessNodeChain::new(clock.clone(), 4.0);
        chain.start(0.0, 1.0);
        clock.advance(2.5);
        assert!(!chain.has_ended());
        clock.advance(1.0);
        assert!(chain.has_ended());
    }

    #[test]
    fn test_gain_ramp_is_linear() {
        let clock = VirtualClock::new();
        let mut chain = HeadlessNodeChain::new(clock.clone(), 4.0);
        chain.ramp_gain(0.0, 1.0, 0.0, 2.0);
        clock.advance(1.0);
        assert!((chain.gain() - 0.5).abs() < 1e-9);
        clock.advance(5.0);
        assert_eq!(chain.gain(), 1.0);
        chain.set_gain(0.25);
        assert_eq!(chain.gain(), 0.25);
    }

    #[test]
    fn test_media_element_tracks_clock() {
        let clock = VirtualClock::new();
        let platform = HeadlessAudioPlatform::streaming_only(clock.clone());
        assert!(platform.audio_graph().is_none());

        let mut element = platform
            .create_media_element(Bytes::from_static(b"data"), hint(3.0))
            .unwrap();
        element.play();
        clock.advance(1.5);
        assert!((element.current_time() - 1.5).abs() < 1e-9);

        element.pause();
        clock.advance(10.0);
        assert!((element.current_time() - 1.5).abs() < 1e-9);

        element.play();
        clock.advance(2.0);
        assert!(element.has_ended());
        assert_eq!(platform.elements_created(), 1);
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        let platform = HeadlessAudioPlatform::new(VirtualClock::new());
        let graph = platform.audio_graph().unwrap();
        assert!(graph.decode(Bytes::new(), DecodeHint::default()).is_err());
    }

    #[test]
    fn test_decode_falls_back_to_default_duration() {
        let platform =
            HeadlessAudioPlatform::new(VirtualClock::new()).with_default_duration(12.0);
        let graph = platform.audio_graph().unwrap();
        let buffer = graph
            .decode(Bytes::from_static(b"opaque"), DecodeHint::default())
            .unwrap();
        assert_eq!(buffer.duration(), 12.0);
        assert_eq!(buffer.sample_rate(), 44_100);
    }
}
