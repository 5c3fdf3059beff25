//! Resonant filter (high-pass → low-pass)
//!
//! Both stages default to inert corners, so enabling the unit untouched is a
//! no-op. Corner frequency and Q are smoothed, which makes the unit usable
//! for sweep automation driven by a stream of frequency updates.

use super::biquad::{BiquadCoeffs, BiquadShape, StereoBiquad};
use super::{Bypass, Effect, StateSync, CONTROL_BLOCK};
use crate::smoother::SmoothedParam;

const HIGHPASS_MIN: f32 = 20.0;
const HIGHPASS_MAX: f32 = 2000.0;
const LOWPASS_MIN: f32 = 1000.0;
const LOWPASS_MAX: f32 = 20000.0;
const Q_MIN: f32 = 0.1;
const Q_MAX: f32 = 10.0;

/// Butterworth Q
const DEFAULT_Q: f32 = 0.707;

/// Filter settings as held by the control plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub enabled: bool,
    /// High-pass corner (Hz)
    pub highpass: f32,
    pub highpass_q: f32,
    /// Low-pass corner (Hz)
    pub lowpass: f32,
    pub lowpass_q: f32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            enabled: false,
            highpass: HIGHPASS_MIN,
            highpass_q: DEFAULT_Q,
            lowpass: LOWPASS_MAX,
            lowpass_q: DEFAULT_Q,
        }
    }
}

/// High-pass/low-pass filter unit
pub struct Filter {
    sample_rate: f32,
    bypass: Bypass,

    highpass_freq: SmoothedParam,
    highpass_q: SmoothedParam,
    lowpass_freq: SmoothedParam,
    lowpass_q: SmoothedParam,

    highpass: StereoBiquad,
    lowpass: StereoBiquad,

    needs_update: bool,
}

impl Filter {
    /// Create a filter with inert corners (disabled)
    pub fn new(sample_rate: f32) -> Self {
        let defaults = FilterState::default();
        let mut filter = Self {
            sample_rate,
            bypass: Bypass::new(sample_rate, false, 1.0),
            highpass_freq: SmoothedParam::new(sample_rate, defaults.highpass),
            highpass_q: SmoothedParam::new(sample_rate, defaults.highpass_q),
            lowpass_freq: SmoothedParam::new(sample_rate, defaults.lowpass),
            lowpass_q: SmoothedParam::new(sample_rate, defaults.lowpass_q),
            highpass: StereoBiquad::default(),
            lowpass: StereoBiquad::default(),
            needs_update: true,
        };
        filter.update_coefficients(0);
        filter
    }

    /// Set high-pass corner in Hz (20 - 2000)
    pub fn set_highpass(&mut self, freq: f32) {
        self.highpass_freq.set(freq.clamp(HIGHPASS_MIN, HIGHPASS_MAX));
        self.needs_update = true;
    }

    /// Set high-pass resonance (0.1 - 10)
    pub fn set_highpass_q(&mut self, q: f32) {
        self.highpass_q.set(q.clamp(Q_MIN, Q_MAX));
        self.needs_update = true;
    }

    /// Set low-pass corner in Hz (1000 - 20000)
    pub fn set_lowpass(&mut self, freq: f32) {
        self.lowpass_freq.set(freq.clamp(LOWPASS_MIN, LOWPASS_MAX));
        self.needs_update = true;
    }

    /// Set low-pass resonance (0.1 - 10)
    pub fn set_lowpass_q(&mut self, q: f32) {
        self.lowpass_q.set(q.clamp(Q_MIN, Q_MAX));
        self.needs_update = true;
    }

    pub fn highpass(&self) -> f32 {
        self.highpass_freq.target()
    }

    pub fn highpass_q(&self) -> f32 {
        self.highpass_q.target()
    }

    pub fn lowpass(&self) -> f32 {
        self.lowpass_freq.target()
    }

    pub fn lowpass_q(&self) -> f32 {
        self.lowpass_q.target()
    }

    fn update_coefficients(&mut self, frames: usize) {
        if !self.needs_update {
            return;
        }

        let hp = self.highpass_freq.advance(frames);
        let hp_q = self.highpass_q.advance(frames);
        let lp = self.lowpass_freq.advance(frames);
        let lp_q = self.lowpass_q.advance(frames);

        // Inert at the outer ends of each range
        self.highpass.coeffs = if hp <= HIGHPASS_MIN {
            BiquadCoeffs::IDENTITY
        } else {
            BiquadCoeffs::design(BiquadShape::HighPass, self.sample_rate, hp, hp_q, 0.0)
        };
        self.lowpass.coeffs = if lp >= LOWPASS_MAX {
            BiquadCoeffs::IDENTITY
        } else {
            BiquadCoeffs::design(BiquadShape::LowPass, self.sample_rate, lp, lp_q, 0.0)
        };

        self.needs_update = !(self.highpass_freq.is_settled()
            && self.highpass_q.is_settled()
            && self.lowpass_freq.is_settled()
            && self.lowpass_q.is_settled());
    }
}

impl Effect for Filter {
    fn process(&mut self, samples: &mut [f32]) {
        if self.bypass.is_disposed() {
            return;
        }

        for block in samples.chunks_mut(CONTROL_BLOCK * 2) {
            self.update_coefficients(block.len() / 2);

            let Self {
                bypass,
                highpass,
                lowpass,
                ..
            } = self;
            bypass.process(block, |l, r| {
                let (l, r) = highpass.process(l, r);
                lowpass.process(l, r)
            });
        }
    }

    fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
    }

    fn bypass(&self) -> &Bypass {
        &self.bypass
    }

    fn bypass_mut(&mut self) -> &mut Bypass {
        &mut self.bypass
    }

    fn name(&self) -> &'static str {
        "Filter"
    }

    fn dispose(&mut self) {
        if self.bypass.dispose() {
            self.reset();
        }
    }
}

impl StateSync for Filter {
    type State = FilterState;

    fn update_from_state(&mut self, state: &FilterState) {
        self.set_enabled(state.enabled);
        self.set_highpass(state.highpass);
        self.set_highpass_q(state.highpass_q);
        self.set_lowpass(state.lowpass);
        self.set_lowpass_q(state.lowpass_q);
    }

    fn state(&self) -> FilterState {
        FilterState {
            enabled: self.is_enabled(),
            highpass: self.highpass(),
            highpass_q: self.highpass_q(),
            lowpass: self.lowpass(),
            lowpass_q: self.lowpass_q(),
        }
    }
}
