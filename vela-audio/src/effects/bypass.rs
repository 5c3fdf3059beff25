//! Dry/wet bypass shared by every effect unit
//!
//! The input is always split into a dry path and the unit's wet path; both
//! are summed through smoothed gains. Enabling, disabling and changing the
//! mix only move gain targets, so toggling an effect never reconnects
//! anything and never produces a step.

use crate::smoother::{SmoothedParam, DEFAULT_TIME_CONSTANT};

/// Dry/wet crossfade with click-free enable/disable
#[derive(Debug, Clone)]
pub struct Bypass {
    enabled: bool,
    mix: f32,
    dry: SmoothedParam,
    wet: SmoothedParam,
    disposed: bool,
}

impl Bypass {
    /// Create a bypass stage; gains start settled on the requested state
    pub fn new(sample_rate: f32, enabled: bool, mix: f32) -> Self {
        let mix = mix.clamp(0.0, 1.0);
        let (dry, wet) = Self::gains(enabled, mix);
        Self {
            enabled,
            mix,
            dry: SmoothedParam::new(sample_rate, dry),
            wet: SmoothedParam::new(sample_rate, wet),
            disposed: false,
        }
    }

    /// Dry/wet gains for a state
    ///
    /// Constant-amplitude: dry + wet stays at unity, also mid-ramp.
    #[inline]
    fn gains(enabled: bool, mix: f32) -> (f32, f32) {
        let m = if enabled { mix } else { 0.0 };
        (1.0 - m, m)
    }

    fn retarget(&mut self) {
        let (dry, wet) = Self::gains(self.enabled, self.mix);
        self.dry.set_target(dry, DEFAULT_TIME_CONSTANT);
        self.wet.set_target(wet, DEFAULT_TIME_CONSTANT);
    }

    /// Enable or disable the wet contribution
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.retarget();
        }
    }

    /// Check if the unit is audible
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set wet/dry mix (0.0 - 1.0); kept while disabled
    pub fn set_mix(&mut self, mix: f32) {
        let mix = mix.clamp(0.0, 1.0);
        if self.mix != mix {
            self.mix = mix;
            if self.enabled {
                self.retarget();
            }
        }
    }

    /// Get wet/dry mix
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Current (smoothed) dry gain
    pub fn dry_gain(&self) -> f32 {
        self.dry.value()
    }

    /// Current (smoothed) wet gain
    pub fn wet_gain(&self) -> f32 {
        self.wet.value()
    }

    /// Run the wet path over every stereo frame and blend it with the dry signal
    ///
    /// `wet_path` receives the dry input frame and returns the processed frame.
    /// It is called for every frame even while bypassed so internal state
    /// (delay lines, envelopes, convolution history) keeps following the input.
    #[inline]
    pub fn process<F>(&mut self, samples: &mut [f32], mut wet_path: F)
    where
        F: FnMut(f32, f32) -> (f32, f32),
    {
        if self.disposed {
            return;
        }

        for frame in samples.chunks_exact_mut(2) {
            let (dry_l, dry_r) = (frame[0], frame[1]);
            let (wet_l, wet_r) = wet_path(dry_l, dry_r);

            let dry = self.dry.next();
            let wet = self.wet.next();
            frame[0] = dry_l * dry + wet_l * wet;
            frame[1] = dry_r * dry + wet_r * wet;
        }
    }

    /// Mark the unit as torn down; returns false if it already was
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            tracing::warn!("effect unit disposed more than once");
            return false;
        }
        self.disposed = true;
        true
    }

    /// Check if the unit has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn test_disabled_is_all_dry() {
        let mut bypass = Bypass::new(SR, false, 0.7);
        let mut samples = vec![0.5, -0.5, 0.25, -0.25];
        let original = samples.clone();

        bypass.process(&mut samples, |_, _| (1.0, 1.0));
        assert_eq!(samples, original);
    }

    #[test]
    fn test_full_mix_is_all_wet() {
        let mut bypass = Bypass::new(SR, true, 1.0);
        let mut samples = vec![0.5, -0.5];

        bypass.process(&mut samples, |l, r| (l * 2.0, r * 2.0));
        assert!((samples[0] - 1.0).abs() < 1e-6);
        assert!((samples[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gains_sum_to_unity_while_ramping() {
        let mut bypass = Bypass::new(SR, false, 0.6);
        bypass.set_enabled(true);

        let mut samples = vec![1.0; 2000];
        bypass.process(&mut samples, |l, r| (l, r));
        assert!(samples.iter().all(|s| (s - 1.0).abs() < 1e-5));
        assert!((bypass.dry_gain() + bypass.wet_gain() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_toggle_has_no_step() {
        let mut bypass = Bypass::new(SR, false, 1.0);
        bypass.set_enabled(true);

        // Wet path inverts: a hard switch would jump from 1.0 to -1.0
        let mut samples = vec![1.0; 96000];
        bypass.process(&mut samples, |l, r| (-l, -r));

        let max_step = samples
            .chunks_exact(2)
            .map(|f| f[0])
            .collect::<Vec<_>>()
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        assert!(max_step < 0.01, "step of {}", max_step);
        assert!(samples[samples.len() - 2] < -0.99);
    }

    #[test]
    fn test_gains_settle_exactly() {
        let mut bypass = Bypass::new(SR, false, 1.0);
        bypass.set_enabled(true);

        let mut samples = vec![0.5; 2 * 48000];
        bypass.process(&mut samples, |l, r| (l, r));
        assert_eq!(bypass.wet_gain(), 1.0);
        assert_eq!(bypass.dry_gain(), 0.0);

        bypass.set_enabled(false);
        bypass.process(&mut samples, |l, r| (l, r));
        assert_eq!(bypass.wet_gain(), 0.0);
        assert_eq!(bypass.dry_gain(), 1.0);
    }

    #[test]
    fn test_mix_retained_while_disabled() {
        let mut bypass = Bypass::new(SR, true, 0.4);
        bypass.set_enabled(false);
        bypass.set_mix(0.8);
        assert_eq!(bypass.mix(), 0.8);

        bypass.set_enabled(true);
        assert_eq!(bypass.mix(), 0.8);
    }

    #[test]
    fn test_mix_clamping() {
        let mut bypass = Bypass::new(SR, true, 0.5);
        bypass.set_mix(3.0);
        assert_eq!(bypass.mix(), 1.0);
        bypass.set_mix(-1.0);
        assert_eq!(bypass.mix(), 0.0);
    }

    #[test]
    fn test_disposed_passes_audio_untouched() {
        let mut bypass = Bypass::new(SR, true, 1.0);
        assert!(bypass.dispose());
        let mut samples = vec![0.3, 0.3];
        bypass.process(&mut samples, |_, _| (0.0, 0.0));
        assert_eq!(samples, vec![0.3, 0.3]);
        assert!(!bypass.dispose());
    }
}
