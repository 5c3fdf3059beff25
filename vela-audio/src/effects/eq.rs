//! 3-band equalizer
//!
//! Low shelf → mid bell → high shelf, each band gain-controlled in dB.
//! The whole cascade is the wet path; bypass is purely the dry/wet crossfade,
//! so the mix is pinned at 1.
//!
//! Bands:
//! - Low shelf: 250Hz, ±12dB
//! - Mid bell: 1kHz, Q = 1, ±12dB
//! - High shelf: 4kHz, ±12dB

use super::biquad::{BiquadCoeffs, BiquadShape, StereoBiquad};
use super::{Bypass, Effect, StateSync, CONTROL_BLOCK};
use crate::smoother::SmoothedParam;

const LOW_SHELF_FREQ: f32 = 250.0;
const MID_PEAK_FREQ: f32 = 1000.0;
const MID_PEAK_Q: f32 = 1.0;
const HIGH_SHELF_FREQ: f32 = 4000.0;

/// Band gain limit in dB (symmetric)
const MAX_GAIN_DB: f32 = 12.0;

/// EQ settings as held by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EqState {
    pub enabled: bool,
    /// Low shelf gain (dB)
    pub low: f32,
    /// Mid bell gain (dB)
    pub mid: f32,
    /// High shelf gain (dB)
    pub high: f32,
}

/// Three-band equalizer unit
pub struct Equalizer {
    sample_rate: f32,
    bypass: Bypass,

    low_gain: SmoothedParam,
    mid_gain: SmoothedParam,
    high_gain: SmoothedParam,

    low: StereoBiquad,
    mid: StereoBiquad,
    high: StereoBiquad,

    // Flag to recalculate coefficients
    needs_update: bool,
}

impl Equalizer {
    /// Create a flat, disabled EQ
    pub fn new(sample_rate: f32) -> Self {
        let mut eq = Self {
            sample_rate,
            bypass: Bypass::new(sample_rate, false, 1.0),
            low_gain: SmoothedParam::new(sample_rate, 0.0),
            mid_gain: SmoothedParam::new(sample_rate, 0.0),
            high_gain: SmoothedParam::new(sample_rate, 0.0),
            low: StereoBiquad::default(),
            mid: StereoBiquad::default(),
            high: StereoBiquad::default(),
            needs_update: true,
        };
        eq.update_coefficients(0);
        eq
    }

    /// Set low shelf gain in dB (±12dB range)
    pub fn set_low_gain(&mut self, gain_db: f32) {
        self.low_gain.set(gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB));
        self.needs_update = true;
    }

    /// Set mid bell gain in dB (±12dB range)
    pub fn set_mid_gain(&mut self, gain_db: f32) {
        self.mid_gain.set(gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB));
        self.needs_update = true;
    }

    /// Set high shelf gain in dB (±12dB range)
    pub fn set_high_gain(&mut self, gain_db: f32) {
        self.high_gain.set(gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB));
        self.needs_update = true;
    }

    /// Get low shelf gain
    pub fn low_gain(&self) -> f32 {
        self.low_gain.target()
    }

    /// Get mid bell gain
    pub fn mid_gain(&self) -> f32 {
        self.mid_gain.target()
    }

    /// Get high shelf gain
    pub fn high_gain(&self) -> f32 {
        self.high_gain.target()
    }

    /// Advance the gain ramps by `frames` and refresh coefficients if they moved
    fn update_coefficients(&mut self, frames: usize) {
        if !self.needs_update {
            return;
        }

        let low = self.low_gain.advance(frames);
        let mid = self.mid_gain.advance(frames);
        let high = self.high_gain.advance(frames);

        let sr = self.sample_rate;
        self.low.coeffs = BiquadCoeffs::design(BiquadShape::LowShelf, sr, LOW_SHELF_FREQ, 1.0, low);
        self.mid.coeffs = BiquadCoeffs::design(BiquadShape::Peaking, sr, MID_PEAK_FREQ, MID_PEAK_Q, mid);
        self.high.coeffs =
            BiquadCoeffs::design(BiquadShape::HighShelf, sr, HIGH_SHELF_FREQ, 1.0, high);

        self.needs_update = !(self.low_gain.is_settled()
            && self.mid_gain.is_settled()
            && self.high_gain.is_settled());
    }
}

impl Effect for Equalizer {
    fn process(&mut self, samples: &mut [f32]) {
        if self.bypass.is_disposed() {
            return;
        }

        for block in samples.chunks_mut(CONTROL_BLOCK * 2) {
            self.update_coefficients(block.len() / 2);

            let Self {
                bypass,
                low,
                mid,
                high,
                ..
            } = self;
            bypass.process(block, |l, r| {
                let (l, r) = low.process(l, r);
                let (l, r) = mid.process(l, r);
                high.process(l, r)
            });
        }
    }

    fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
    }

    fn bypass(&self) -> &Bypass {
        &self.bypass
    }

    fn bypass_mut(&mut self) -> &mut Bypass {
        &mut self.bypass
    }

    fn name(&self) -> &'static str {
        "EQ"
    }

    fn dispose(&mut self) {
        if self.bypass.dispose() {
            self.reset();
        }
    }

    /// The EQ is always fully inline once enabled
    fn set_mix(&mut self, _mix: f32) {}
}

impl StateSync for Equalizer {
    type State = EqState;

    fn update_from_state(&mut self, state: &EqState) {
        self.set_enabled(state.enabled);
        self.set_low_gain(state.low);
        self.set_mid_gain(state.mid);
        self.set_high_gain(state.high);
    }

    fn state(&self) -> EqState {
        EqState {
            enabled: self.is_enabled(),
            low: self.low_gain(),
            mid: self.mid_gain(),
            high: self.high_gain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn sine(freq: f32, frames: usize, amp: f32) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = amp * (2.0 * std::f32::consts::PI * freq * i as f32 / SR).sin();
                [s, s]
            })
            .collect()
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_eq_creation() {
        let eq = Equalizer::new(SR);
        assert!(!eq.is_enabled());
        assert_eq!(eq.mix(), 1.0);
        assert_eq!(eq.low_gain(), 0.0);
        assert_eq!(eq.mid_gain(), 0.0);
        assert_eq!(eq.high_gain(), 0.0);
    }

    #[test]
    fn test_gain_clamping() {
        let mut eq = Equalizer::new(SR);

        eq.set_low_gain(30.0);
        assert_eq!(eq.low_gain(), 12.0);

        eq.set_mid_gain(-30.0);
        assert_eq!(eq.mid_gain(), -12.0);

        eq.set_high_gain(13.0);
        assert_eq!(eq.high_gain(), 12.0);
    }

    #[test]
    fn test_mix_is_pinned() {
        let mut eq = Equalizer::new(SR);
        eq.set_mix(0.2);
        assert_eq!(eq.mix(), 1.0);
    }

    #[test]
    fn test_flat_enabled_is_transparent() {
        let mut eq = Equalizer::new(SR);
        eq.set_enabled(true);

        let mut samples = sine(440.0, 4800, 0.5);
        let original = samples.clone();
        eq.process(&mut samples);

        for (out, inp) in samples.iter().zip(&original) {
            assert!((out - inp).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mid_boost_raises_1k() {
        let mut eq = Equalizer::new(SR);
        eq.update_from_state(&EqState {
            enabled: true,
            low: 0.0,
            mid: 12.0,
            high: 0.0,
        });

        // Let gain ramp and enable crossfade settle
        let mut warmup = sine(1000.0, 48000, 0.1);
        eq.process(&mut warmup);

        let mut samples = sine(1000.0, 4800, 0.1);
        eq.process(&mut samples);
        let gain_db = 20.0 * (peak(&samples) / 0.1).log10();
        assert!((gain_db - 12.0).abs() < 0.5, "got {} dB", gain_db);
    }

    #[test]
    fn test_update_from_state_idempotent() {
        let mut eq = Equalizer::new(SR);
        let state = EqState {
            enabled: true,
            low: 3.0,
            mid: -4.5,
            high: 20.0,
        };
        eq.update_from_state(&state);
        let first = eq.state();
        eq.update_from_state(&state);
        assert_eq!(eq.state(), first);
        assert_eq!(first.high, 12.0);
    }

    #[test]
    fn test_bypass_round_trip_keeps_gains() {
        let mut eq = Equalizer::new(SR);
        eq.set_enabled(true);
        eq.set_low_gain(-6.0);
        let before = eq.state();

        eq.set_enabled(false);
        eq.set_enabled(true);
        assert_eq!(eq.state(), before);
    }
}
