//! Node-graph strategy: a decoded buffer played through a fresh
//! source -> gain -> pan chain per start.
//!
//! Pitch is applied as the source playback rate, so it changes speed along
//! with pitch.

use bridge_traits::audio::{AudioBuffer, AudioGraph, NodeChain};
use std::sync::Arc;
use tracing::warn;

use super::strategy::{PlaybackParams, PlaybackStrategy, StrategyKind, TickOutcome};
use crate::loop_metadata::LoopWindow;

pub struct NodeGraphStrategy {
    graph: Arc<dyn AudioGraph>,
    buffer: Arc<dyn AudioBuffer>,
    window: LoopWindow,
    chain: Option<Box<dyn NodeChain>>,
    looping: bool,
    /// Audio-clock time at which position 0 would have played.
    start_time: f64,
    pitch: f64,
    gain: f64,
    pan: f64,
    paused_position: f64,
    fade_end: Option<f64>,
    fading_in: bool,
    passes: u64,
}

impl NodeGraphStrategy {
    pub fn new(graph: Arc<dyn AudioGraph>, buffer: Arc<dyn AudioBuffer>, window: LoopWindow) -> Self {
        Self {
            graph,
            buffer,
            window,
            chain: None,
            looping: false,
            start_time: 0.0,
            pitch: 1.0,
            gain: 1.0,
            pan: 0.0,
            paused_position: 0.0,
            fade_end: None,
            fading_in: false,
            passes: 0,
        }
    }

    fn raw_position(&self) -> f64 {
        (self.graph.current_time() - self.start_time) * self.pitch
    }

    fn teardown_chain(&mut self) {
        if let Some(mut chain) = self.chain.take() {
            chain.stop();
            chain.disconnect();
        }
        self.fade_end = None;
    }
}

impl PlaybackStrategy for NodeGraphStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NodeGraph
    }

    fn duration(&self) -> f64 {
        self.buffer.duration()
    }

    fn loop_window(&self) -> LoopWindow {
        self.window
    }

    fn start(&mut self, looping: bool, offset: f64, params: PlaybackParams) {
        self.teardown_chain();

        let mut chain = match self.graph.create_chain(Arc::clone(&self.buffer)) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(error = %e, "Failed to build node chain");
                return;
            }
        };

        let offset = offset.max(0.0);
        let pitch = if params.pitch > 0.0 { params.pitch } else { 1.0 };
        let now = self.graph.current_time();

        chain.set_loop(looping, self.window.start, self.window.end);
        chain.set_playback_rate(pitch);
        chain.set_gain(params.gain);
        chain.set_pan(params.pan);
        chain.start(now, offset);

        self.looping = looping;
        self.pitch = pitch;
        self.gain = params.gain;
        self.pan = params.pan;
        self.start_time = now - offset / pitch;
        self.passes = if looping { self.window.passes(offset) } else { 0 };
        self.paused_position = 0.0;
        self.chain = Some(chain);
    }

    fn pause(&mut self) {
        if self.chain.is_none() {
            return;
        }
        self.paused_position = self.position();
        self.teardown_chain();
    }

    fn resume(&mut self, params: PlaybackParams) {
        if self.chain.is_some() {
            return;
        }
        let offset = self.paused_position;
        self.start(self.looping, offset, params);
    }

    fn stop(&mut self) {
        self.teardown_chain();
        self.paused_position = 0.0;
        self.passes = 0;
    }

    fn position(&self) -> f64 {
        if self.chain.is_none() {
            return self.paused_position;
        }
        let position = self.raw_position().max(0.0);
        if self.looping {
            self.window.wrap(position)
        } else {
            position.min(self.duration())
        }
    }

    fn set_position(&mut self, seconds: f64) {
        if self.chain.is_some() {
            let params = PlaybackParams {
                gain: self.gain,
                pitch: self.pitch,
                pan: self.pan,
            };
            self.start(self.looping, seconds, params);
        } else {
            self.paused_position = seconds.max(0.0);
        }
    }

    fn apply_params(&mut self, params: PlaybackParams) {
        let pitch = if params.pitch > 0.0 { params.pitch } else { 1.0 };
        if let Some(chain) = self.chain.as_mut() {
            if (pitch - self.pitch).abs() > f64::EPSILON {
                let now = self.graph.current_time();
                let position = (now - self.start_time) * self.pitch;
                self.start_time = now - position / pitch;
                chain.set_playback_rate(pitch);
            }
            match self.fade_end {
                None => chain.set_gain(params.gain),
                // Re-aim a running fade-in so it lands on the new gain.
                Some(end) if self.fading_in => {
                    let now = self.graph.current_time();
                    if now < end {
                        let from = chain.gain();
                        chain.ramp_gain(from, params.gain, now, end);
                    } else {
                        chain.set_gain(params.gain);
                    }
                }
                Some(_) => {}
            }
            chain.set_pan(params.pan);
        }
        self.pitch = pitch;
        self.gain = params.gain;
        self.pan = params.pan;
    }

    fn fade_in(&mut self, duration: f64, params: PlaybackParams) {
        self.gain = params.gain;
        let Some(chain) = self.chain.as_mut() else {
            return;
        };
        let now = self.graph.current_time();
        let end = now + duration.max(0.0);
        chain.ramp_gain(0.0, params.gain, now, end);
        self.fade_end = Some(end);
        self.fading_in = true;
    }

    fn fade_out(&mut self, duration: f64) {
        let Some(chain) = self.chain.as_mut() else {
            return;
        };
        let now = self.graph.current_time();
        let end = now + duration.max(0.0);
        let from = chain.gain();
        chain.ramp_gain(from, 0.0, now, end);
        self.fade_end = Some(end);
        self.fading_in = false;
    }

    fn is_fading(&self) -> bool {
        self.fade_end
            .map(|end| self.graph.current_time() < end)
            .unwrap_or(false)
    }

    fn output_gain(&self) -> f64 {
        self.chain.as_ref().map(|c| c.gain()).unwrap_or(0.0)
    }

    fn tick(&mut self) -> TickOutcome {
        if let Some(end) = self.fade_end {
            if self.graph.current_time() >= end {
                self.fade_end = None;
                if self.fading_in {
                    if let Some(chain) = self.chain.as_mut() {
                        chain.set_gain(self.gain);
                    }
                }
            }
        }

        let Some(chain) = self.chain.as_ref() else {
            return TickOutcome::Continue;
        };

        if !self.looping {
            return if chain.has_ended() {
                TickOutcome::Ended
            } else {
                TickOutcome::Continue
            };
        }

        let passes = self.window.passes(self.raw_position());
        if passes > self.passes {
            self.passes = passes;
            TickOutcome::Looped
        } else {
            TickOutcome::Continue
        }
    }
}
