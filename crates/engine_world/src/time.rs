//! Fixed timestep accumulator.
//!
//! Converts variable frame deltas into a whole number of constant-duration
//! simulation steps, so physics integrates at the same rate no matter how
//! fast frames are rendered.

#[derive(Debug, Clone)]
pub struct FixedTimestep {
    /// Duration of one fixed step, in seconds.
    step: f64,
    /// Upper bound applied to every frame delta, in seconds.
    max_frame_delta: f64,
    /// Time not yet consumed by fixed steps.
    accumulator: f64,
}

impl FixedTimestep {
    #[must_use]
    pub fn new(step: f64, max_frame_delta: f64) -> Self {
        Self {
            step,
            max_frame_delta,
            accumulator: 0.0,
        }
    }

    /// Clamp a raw frame delta into `[0, max_frame_delta]`. The upper bound
    /// keeps a stalled frame (e.g. a backgrounded tab) from queueing an
    /// unbounded number of steps.
    #[must_use]
    pub fn clamp_delta(&self, raw: f64) -> f64 {
        raw.clamp(0.0, self.max_frame_delta)
    }

    /// Add an (already clamped) frame delta to the accumulator.
    pub fn accumulate(&mut self, dt: f64) {
        self.accumulator += dt;
    }

    /// Consume one fixed step if enough time has accumulated.
    pub fn consume_step(&mut self) -> bool {
        if self.accumulator >= self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }

    /// Fraction of a step left in the accumulator (0.0 to 1.0), for
    /// render-side blending.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.step
    }

    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }
}
