//! Exponential parameter smoothing
//!
//! Every automatable value in the effects chain goes through a
//! [`SmoothedParam`]: the control plane only ever moves the target, and the
//! signal plane walks the current value toward it one tick at a time. The
//! curve is the classic one-pole "set target" approach: after one time
//! constant the value has covered ~63% of the distance to the target.

/// Default smoothing time constant in seconds (~20ms)
pub const DEFAULT_TIME_CONSTANT: f32 = 0.02;

/// Distance (relative to the target's magnitude, floored at 1) below which
/// the current value snaps onto the target
const SNAP_EPSILON: f32 = 1e-6;

/// A ramped parameter value
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    sample_rate: f32,
    current: f32,
    target: f32,
    /// Per-sample pole, exp(-1 / (tau * sample_rate)); 0 means jump
    coeff: f32,
}

impl SmoothedParam {
    /// Create a parameter that starts settled at `value`
    pub fn new(sample_rate: f32, value: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            current: value,
            target: value,
            coeff: 0.0,
        }
    }

    /// Move the target, ramping toward it with the given time constant (seconds)
    ///
    /// A time constant of zero (or less) behaves like [`set_immediate`](Self::set_immediate).
    pub fn set_target(&mut self, value: f32, time_constant: f32) {
        if time_constant <= 0.0 {
            self.set_immediate(value);
            return;
        }
        self.target = value;
        self.coeff = (-1.0 / (time_constant * self.sample_rate)).exp();
    }

    /// Move the target using [`DEFAULT_TIME_CONSTANT`]
    pub fn set(&mut self, value: f32) {
        self.set_target(value, DEFAULT_TIME_CONSTANT);
    }

    /// Jump straight to `value` with no ramp
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.coeff = 0.0;
    }

    /// Advance one sample and return the new current value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            let next = self.target + (self.current - self.target) * self.coeff;
            self.settle_toward(next);
        }
        self.current
    }

    /// Advance `samples` ticks at once (used for per-block parameters)
    #[inline]
    pub fn advance(&mut self, samples: usize) -> f32 {
        if self.current != self.target {
            let decay = self.coeff.powi(samples.min(i32::MAX as usize) as i32);
            let next = self.target + (self.current - self.target) * decay;
            self.settle_toward(next);
        }
        self.current
    }

    /// Store `next`, snapping onto the target when close enough or when the
    /// step is too small to change the value in f32
    #[inline]
    fn settle_toward(&mut self, next: f32) {
        let tolerance = SNAP_EPSILON * self.target.abs().max(1.0);
        if next == self.current || (next - self.target).abs() < tolerance {
            self.current = self.target;
        } else {
            self.current = next;
        }
    }

    /// Current (smoothed) value
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Value the parameter is heading toward
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the current value has reached the target
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
