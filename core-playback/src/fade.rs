//! Tick-driven volume fades for strategies without a native gain ramp.

/// Distance from the target at which a fade snaps and finishes.
pub const FADE_EPSILON: f64 = 0.01;

/// Linear volume fade advanced one fixed step per tick.
///
/// The step is `(target - start) / (duration * tick_rate)`; every value is
/// clamped to `[0, ceiling]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeTimer {
    value: f64,
    target: f64,
    step: f64,
    ceiling: f64,
    finished: bool,
}

impl FadeTimer {
    pub fn new(start: f64, target: f64, duration: f64, tick_rate: u32, ceiling: f64) -> Self {
        let ceiling = ceiling.max(0.0);
        let ticks = duration * tick_rate as f64;
        let mut timer = Self {
            value: start.clamp(0.0, ceiling),
            target: target.clamp(0.0, ceiling),
            step: 0.0,
            ceiling,
            finished: false,
        };

        if ticks.is_finite() && ticks > 0.0 {
            timer.step = (timer.target - timer.value) / ticks;
        }
        if timer.step == 0.0 || (timer.value - timer.target).abs() < FADE_EPSILON {
            timer.value = timer.target;
            timer.finished = true;
        }
        timer
    }

    /// Advance one tick and return the new value.
    pub fn tick(&mut self) -> f64 {
        if self.finished {
            return self.value;
        }
        self.value = (self.value + self.step).clamp(0.0, self.ceiling);
        if (self.value - self.target).abs() < FADE_EPSILON {
            self.value = self.target;
            self.finished = true;
        }
        self.value
    }

    /// Point an unfinished fade at a new target, keeping the ticks it has left.
    pub fn retarget(&mut self, target: f64, ceiling: f64) {
        if self.finished {
            return;
        }
        let remaining = if self.step != 0.0 {
            ((self.target - self.value) / self.step).ceil().max(1.0)
        } else {
            1.0
        };
        self.ceiling = ceiling.max(0.0);
        self.value = self.value.clamp(0.0, self.ceiling);
        self.target = target.clamp(0.0, self.ceiling);
        self.step = (self.target - self.value) / remaining;
        if self.step == 0.0 || (self.value - self.target).abs() < FADE_EPSILON {
            self.value = self.target;
            self.finished = true;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_out_converges_in_expected_ticks() {
        let mut fade = FadeTimer::new(1.0, 0.0, 0.5, 60, 1.0);
        let mut ticks = 0;
        while !fade.is_finished() {
            fade.tick();
            ticks += 1;
            assert!(ticks <= 31, "fade did not converge");
        }
        assert!(ticks >= 29);
        assert_eq!(fade.value(), 0.0);
    }

    #[test]
    fn test_fade_in_is_clamped_to_ceiling() {
        let mut fade = FadeTimer::new(0.0, 2.0, 0.1, 60, 0.8);
        assert_eq!(fade.target(), 0.8);
        for _ in 0..10 {
            assert!(fade.tick() <= 0.8);
        }
        assert!(fade.is_finished());
        assert_eq!(fade.value(), 0.8);
    }

    #[test]
    fn test_zero_duration_snaps() {
        let fade = FadeTimer::new(0.7, 0.0, 0.0, 60, 1.0);
        assert!(fade.is_finished());
        assert_eq!(fade.value(), 0.0);
    }

    #[test]
    fn test_retarget_keeps_remaining_ticks() {
        let mut fade = FadeTimer::new(0.0, 0.5, 1.0, 60, 0.5);
        for _ in 0..30 {
            fade.tick();
        }
        fade.retarget(0.8, 0.8);
        assert!(!fade.is_finished());
        let mut ticks = 0;
        while !fade.is_finished() {
            fade.tick();
            ticks += 1;
            assert!(ticks <= 31, "retargeted fade did not converge");
        }
        assert!(ticks >= 29);
        assert_eq!(fade.value(), 0.8);
    }

    #[test]
    fn test_retarget_below_value_snaps_to_ceiling() {
        let mut fade = FadeTimer::new(0.0, 1.0, 1.0, 60, 1.0);
        for _ in 0..30 {
            fade.tick();
        }
        fade.retarget(0.3, 0.3);
        assert!(fade.is_finished());
        assert_eq!(fade.value(), 0.3);
    }
}
