//! Dynamics compressor with makeup gain
//!
//! Wet path: compression stage → makeup gain stage.
//! Features:
//! - Linked-stereo peak detection
//! - Soft knee (quadratic) for smooth onset
//! - Attack/release ballistics on the gain-reduction envelope
//! - Makeup gain stored in dB, applied as an exact linear multiplier

use super::{Bypass, Effect, StateSync, CONTROL_BLOCK};
use crate::smoother::SmoothedParam;

/// Compressor settings as held by the control plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorState {
    pub enabled: bool,
    /// Threshold in dB (-60 to 0)
    pub threshold: f32,
    /// Compression ratio (1 to 20)
    pub ratio: f32,
    /// Attack time in seconds (0 to 1)
    pub attack: f32,
    /// Release time in seconds (0 to 1)
    pub release: f32,
    /// Knee width in dB (0 to 40)
    pub knee: f32,
    /// Makeup gain in dB (0 to 12)
    pub makeup_gain: f32,
}

impl Default for CompressorState {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: -24.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
            knee: 6.0,
            makeup_gain: 0.0,
        }
    }
}

/// Compressor unit
pub struct Compressor {
    sample_rate: f32,
    bypass: Bypass,

    // Parameters
    threshold: SmoothedParam,
    ratio: SmoothedParam,
    attack: SmoothedParam,
    release: SmoothedParam,
    knee: SmoothedParam,
    makeup_db: f32,
    makeup: SmoothedParam,

    // Computed coefficients
    attack_coeff: f32,
    release_coeff: f32,

    // Gain-reduction envelope in dB (<= 0)
    envelope_db: f32,
}

impl Compressor {
    /// Create a new compressor with default settings (disabled)
    pub fn new(sample_rate: f32) -> Self {
        let defaults = CompressorState::default();
        let mut comp = Self {
            sample_rate,
            bypass: Bypass::new(sample_rate, false, 1.0),
            threshold: SmoothedParam::new(sample_rate, defaults.threshold),
            ratio: SmoothedParam::new(sample_rate, defaults.ratio),
            attack: SmoothedParam::new(sample_rate, defaults.attack),
            release: SmoothedParam::new(sample_rate, defaults.release),
            knee: SmoothedParam::new(sample_rate, defaults.knee),
            makeup_db: defaults.makeup_gain,
            makeup: SmoothedParam::new(sample_rate, db_to_linear(defaults.makeup_gain)),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope_db: 0.0,
        };
        comp.update_coefficients();
        comp
    }

    /// Set threshold in dB (-60 to 0)
    pub fn set_threshold(&mut self, db: f32) {
        self.threshold.set(db.clamp(-60.0, 0.0));
    }

    /// Set compression ratio (1 to 20)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio.set(ratio.clamp(1.0, 20.0));
    }

    /// Set attack time in seconds (0 to 1)
    pub fn set_attack(&mut self, seconds: f32) {
        self.attack.set(seconds.clamp(0.0, 1.0));
    }

    /// Set release time in seconds (0 to 1)
    pub fn set_release(&mut self, seconds: f32) {
        self.release.set(seconds.clamp(0.0, 1.0));
    }

    /// Set knee width in dB (0 to 40)
    pub fn set_knee(&mut self, db: f32) {
        self.knee.set(db.clamp(0.0, 40.0));
    }

    /// Set makeup gain in dB (0 to 12)
    pub fn set_makeup_gain(&mut self, db: f32) {
        self.makeup_db = db.clamp(0.0, 12.0);
        self.makeup.set(db_to_linear(self.makeup_db));
    }

    pub fn threshold(&self) -> f32 {
        self.threshold.target()
    }

    pub fn ratio(&self) -> f32 {
        self.ratio.target()
    }

    pub fn attack(&self) -> f32 {
        self.attack.target()
    }

    pub fn release(&self) -> f32 {
        self.release.target()
    }

    pub fn knee(&self) -> f32 {
        self.knee.target()
    }

    /// Makeup gain in dB
    pub fn makeup_gain(&self) -> f32 {
        self.makeup_db
    }

    /// Linear multiplier the makeup stage is heading toward
    pub fn makeup_gain_linear(&self) -> f32 {
        self.makeup.target()
    }

    /// Current gain reduction in dB (for metering, <= 0)
    pub fn reduction_db(&self) -> f32 {
        self.envelope_db
    }

    /// Update time constants from the (smoothed) attack and release
    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(self.attack.value(), self.sample_rate);
        self.release_coeff = time_to_coeff(self.release.value(), self.sample_rate);
    }

    /// Static curve: gain reduction in dB for an input level in dB
    #[inline]
    fn compute_gain_reduction(input_db: f32, threshold: f32, ratio: f32, knee: f32) -> f32 {
        if knee > 0.0 && (input_db - threshold).abs() <= knee / 2.0 {
            // In knee - soft transition
            let x = input_db - threshold + knee / 2.0;
            (1.0 / ratio - 1.0) * (x * x) / (2.0 * knee)
        } else if input_db > threshold {
            threshold + (input_db - threshold) / ratio - input_db
        } else {
            0.0
        }
    }
}

/// One-pole coefficient for a time constant; zero time means instant
#[inline]
fn time_to_coeff(seconds: f32, sample_rate: f32) -> f32 {
    if seconds > 0.0 {
        (-1.0 / (seconds * sample_rate)).exp()
    } else {
        0.0
    }
}

/// Convert dB to linear
#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert linear to dB
#[inline]
fn linear_to_db(linear: f32) -> f32 {
    if linear > 1e-10 {
        20.0 * linear.log10()
    } else {
        -200.0
    }
}

impl Effect for Compressor {
    fn process(&mut self, samples: &mut [f32]) {
        if self.bypass.is_disposed() {
            return;
        }

        for block in samples.chunks_mut(CONTROL_BLOCK * 2) {
            let frames = block.len() / 2;
            let threshold = self.threshold.advance(frames);
            let ratio = self.ratio.advance(frames);
            let knee = self.knee.advance(frames);
            self.attack.advance(frames);
            self.release.advance(frames);
            self.update_coefficients();

            let Self {
                bypass,
                makeup,
                attack_coeff,
                release_coeff,
                envelope_db,
                ..
            } = self;
            let (attack_coeff, release_coeff) = (*attack_coeff, *release_coeff);

            bypass.process(block, |l, r| {
                // Peak detection (linked stereo)
                let peak_db = linear_to_db(l.abs().max(r.abs()));
                let target_db = Self::compute_gain_reduction(peak_db, threshold, ratio, knee);

                let coeff = if target_db < *envelope_db {
                    attack_coeff
                } else {
                    release_coeff
                };
                *envelope_db = target_db + (*envelope_db - target_db) * coeff;

                let gain = db_to_linear(*envelope_db) * makeup.next();
                (l * gain, r * gain)
            });
        }
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }

    fn bypass(&self) -> &Bypass {
        &self.bypass
    }

    fn bypass_mut(&mut self) -> &mut Bypass {
        &mut self.bypass
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }

    fn dispose(&mut self) {
        if self.bypass.dispose() {
            self.reset();
        }
    }
}

impl StateSync for Compressor {
    type State = CompressorState;

    fn update_from_state(&mut self, state: &CompressorState) {
        self.set_enabled(state.enabled);
        self.set_threshold(state.threshold);
        self.set_ratio(state.ratio);
        self.set_attack(state.attack);
        self.set_release(state.release);
        self.set_knee(state.knee);
        self.set_makeup_gain(state.makeup_gain);
    }

    fn state(&self) -> CompressorState {
        CompressorState {
            enabled: self.is_enabled(),
            threshold: self.threshold(),
            ratio: self.ratio(),
            attack: self.attack(),
            release: self.release(),
            knee: self.knee(),
            makeup_gain: self.makeup_gain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn test_compressor_creation() {
        let comp = Compressor::new(SR);
        assert!(!comp.is_enabled());
        assert_eq!(comp.threshold(), -24.0);
        assert_eq!(comp.ratio(), 4.0);
        assert_eq!(comp.reduction_db(), 0.0);
    }

    #[test]
    fn test_parameter_clamping() {
        let mut comp = Compressor::new(SR);

        comp.set_threshold(10.0);
        assert_eq!(comp.threshold(), 0.0);
        comp.set_threshold(-100.0);
        assert_eq!(comp.threshold(), -60.0);

        comp.set_ratio(50.0);
        assert_eq!(comp.ratio(), 20.0);
        comp.set_ratio(0.5);
        assert_eq!(comp.ratio(), 1.0);

        comp.set_attack(5.0);
        assert_eq!(comp.attack(), 1.0);
        comp.set_release(-1.0);
        assert_eq!(comp.release(), 0.0);

        comp.set_knee(100.0);
        assert_eq!(comp.knee(), 40.0);

        comp.set_makeup_gain(20.0);
        assert_eq!(comp.makeup_gain(), 12.0);
    }

    #[test]
    fn test_makeup_gain_conversion() {
        let mut comp = Compressor::new(SR);
        comp.set_makeup_gain(6.0);
        assert!((comp.makeup_gain_linear() - 1.995).abs() < 1e-3);

        comp.set_makeup_gain(0.0);
        assert_eq!(comp.makeup_gain_linear(), 1.0);
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut comp = Compressor::new(SR);
        let mut samples = vec![0.9, 0.9, -0.9, -0.9];
        let original = samples.clone();
        comp.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut comp = Compressor::new(SR);
        comp.set_enabled(true);

        // -40 dB, well below threshold minus half the knee
        let mut samples = vec![0.01f32; 9600];
        comp.process(&mut samples);
        assert!(samples.iter().all(|s| (s - 0.01).abs() < 1e-6));
        assert_eq!(comp.reduction_db(), 0.0);
    }

    #[test]
    fn test_loud_signal_compression() {
        let mut comp = Compressor::new(SR);
        comp.update_from_state(&CompressorState {
            enabled: true,
            knee: 0.0,
            ..CompressorState::default()
        });

        // -6 dB into -24 dB threshold at 4:1 -> 13.5 dB of reduction
        let mut samples = vec![0.5f32; 96000];
        comp.process(&mut samples);

        let gr = comp.reduction_db();
        assert!((gr + 13.5).abs() < 0.5, "Expected ~-13.5 dB, got {} dB", gr);
        let expected = 0.5 * db_to_linear(-13.5);
        assert!((samples[samples.len() - 1] - expected).abs() < 0.01);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let (t, r, k) = (-20.0, 4.0, 10.0);
        let below = Compressor::compute_gain_reduction(t - k / 2.0 - 1e-3, t, r, k);
        let at_start = Compressor::compute_gain_reduction(t - k / 2.0, t, r, k);
        let at_end = Compressor::compute_gain_reduction(t + k / 2.0, t, r, k);
        let above = Compressor::compute_gain_reduction(t + k / 2.0 + 1e-3, t, r, k);

        assert!((below - at_start).abs() < 1e-3);
        assert!((at_end - above).abs() < 1e-2);
    }

    #[test]
    fn test_reduction_is_observational() {
        let mut comp = Compressor::new(SR);
        comp.set_enabled(true);
        let mut samples = vec![0.8f32; 4800];
        comp.process(&mut samples);

        let state = comp.state();
        let first = comp.reduction_db();
        let second = comp.reduction_db();
        assert_eq!(first, second);
        assert_eq!(comp.state(), state);
    }

    #[test]
    fn test_update_from_state_idempotent() {
        let mut comp = Compressor::new(SR);
        let state = CompressorState {
            enabled: true,
            threshold: -30.0,
            ratio: 8.0,
            attack: 0.01,
            release: 0.1,
            knee: 12.0,
            makeup_gain: 3.0,
        };
        comp.update_from_state(&state);
        let first = comp.state();
        comp.update_from_state(&state);
        assert_eq!(comp.state(), first);
        assert_eq!(first, state);
    }
}
