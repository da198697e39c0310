//! Streaming-element strategy.
//!
//! Media elements loop over the whole file at best, so loop windows are
//! enforced by polling: once the position reaches 99.99% of the window end
//! the element is snapped back to the window start. Fades are emulated with
//! a [`FadeTimer`] stepped once per tick. There is no pan stage.

use bridge_traits::audio::MediaElement;

use super::strategy::{PlaybackParams, PlaybackStrategy, StrategyKind, TickOutcome};
use crate::fade::FadeTimer;
use crate::loop_metadata::LoopWindow;

/// Fraction of the window end at which a looping element wraps.
const LOOP_WRAP_THRESHOLD: f64 = 0.9999;

pub struct StreamingElementStrategy {
    element: Box<dyn MediaElement>,
    window: LoopWindow,
    tick_rate: u32,
    looping: bool,
    playing: bool,
    /// Volume the element plays at outside of fades; fades never exceed it.
    volume: f64,
    fade: Option<FadeTimer>,
    fading_in: bool,
}

impl StreamingElementStrategy {
    pub fn new(element: Box<dyn MediaElement>, window: LoopWindow, tick_rate: u32) -> Self {
        Self {
            element,
            window,
            tick_rate,
            looping: false,
            playing: false,
            volume: 1.0,
            fade: None,
            fading_in: false,
        }
    }

    fn wrap_end(&self) -> f64 {
        self.window.end * LOOP_WRAP_THRESHOLD
    }
}

impl PlaybackStrategy for StreamingElementStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StreamingElement
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn loop_window(&self) -> LoopWindow {
        self.window
    }

    fn start(&mut self, looping: bool, offset: f64, params: PlaybackParams) {
        self.fade = None;
        self.looping = looping;
        self.volume = params.gain.clamp(0.0, 1.0);
        self.element.set_current_time(offset.max(0.0));
        self.element.set_volume(self.volume);
        self.element.set_playback_rate(params.pitch);
        self.element.play();
        self.playing = true;
    }

    fn pause(&mut self) {
        self.element.pause();
        self.playing = false;
    }

    fn resume(&mut self, params: PlaybackParams) {
        if self.playing {
            return;
        }
        self.apply_params(params);
        self.element.play();
        self.playing = true;
    }

    fn stop(&mut self) {
        self.fade = None;
        self.playing = false;
        self.element.pause();
        self.element.set_current_time(0.0);
        self.element.release();
    }

    fn position(&self) -> f64 {
        let position = self.element.current_time();
        if self.looping {
            self.window.wrap(position)
        } else {
            position
        }
    }

    fn set_position(&mut self, seconds: f64) {
        self.element.set_current_time(seconds.max(0.0));
    }

    fn apply_params(&mut self, params: PlaybackParams) {
        self.volume = params.gain.clamp(0.0, 1.0);
        match self.fade.as_mut() {
            None => self.element.set_volume(self.volume),
            Some(fade) if self.fading_in => {
                fade.retarget(self.volume, self.volume);
                if fade.is_finished() {
                    self.fade = None;
                    self.element.set_volume(self.volume);
                }
            }
            Some(_) => {}
        }
        self.element.set_playback_rate(params.pitch);
    }

    fn fade_in(&mut self, duration: f64, params: PlaybackParams) {
        self.volume = params.gain.clamp(0.0, 1.0);
        let fade = FadeTimer::new(0.0, self.volume, duration, self.tick_rate, self.volume);
        self.element.set_volume(fade.value());
        self.fade = (!fade.is_finished()).then_some(fade);
        self.fading_in = true;
    }

    fn fade_out(&mut self, duration: f64) {
        let current = self.element.volume();
        let fade = FadeTimer::new(current, 0.0, duration, self.tick_rate, self.volume.max(current));
        self.element.set_volume(fade.value());
        self.fade = (!fade.is_finished()).then_some(fade);
        self.fading_in = false;
    }

    fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    fn output_gain(&self) -> f64 {
        self.element.volume()
    }

    fn tick(&mut self) -> TickOutcome {
        if let Some(fade) = self.fade.as_mut() {
            let value = fade.tick();
            let finished = fade.is_finished();
            if finished && self.fading_in {
                self.element.set_volume(self.volume);
            } else {
                self.element.set_volume(value);
            }
            if finished {
                self.fade = None;
            }
        }

        if !self.playing {
            return TickOutcome::Continue;
        }

        if self.looping {
            let position = self.element.current_time();
            if position >= self.wrap_end() || self.element.has_ended() {
                self.element.set_current_time(self.window.start);
                self.element.play();
                return TickOutcome::Looped;
            }
            return TickOutcome::Continue;
        }

        if self.element.has_ended() {
            self.playing = false;
            return TickOutcome::Ended;
        }
        TickOutcome::Continue
    }
}
