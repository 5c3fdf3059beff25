//! Convolution reverb
//!
//! Wet path: pre-delay line → partitioned convolver. Impulse responses come
//! from a shared [`ImpulseCache`]; when the cache already holds the preset
//! (the engine makes sure of that before asking), loading is an `Arc` swap.

use std::sync::Arc;

use super::{Bypass, Effect, StateSync};
use crate::reverb::{Convolver, ImpulseCache, ImpulseResponse, ReverbPreset};
use crate::smoother::SmoothedParam;

/// Pre-delay limit in milliseconds
const MAX_PRE_DELAY_MS: f32 = 100.0;

/// Reverb settings as held by the control plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbState {
    pub enabled: bool,
    pub preset: ReverbPreset,
    /// Pre-delay in milliseconds (0 - 100)
    pub pre_delay_ms: f32,
    pub mix: f32,
}

impl Default for ReverbState {
    fn default() -> Self {
        Self {
            enabled: false,
            preset: ReverbPreset::default(),
            pre_delay_ms: 0.0,
            mix: 0.3,
        }
    }
}

/// Stereo pre-delay ring (integer read with linear interpolation)
struct PreDelay {
    left: Vec<f32>,
    right: Vec<f32>,
    write_pos: usize,
}

impl PreDelay {
    fn new(len: usize) -> Self {
        let len = len.max(2);
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
            write_pos: 0,
        }
    }

    /// Write a frame, then read `delay_frames` behind it (0 = the frame just written)
    #[inline]
    fn process(&mut self, left: f32, right: f32, delay_frames: f32) -> (f32, f32) {
        let len = self.left.len();
        self.left[self.write_pos] = left;
        self.right[self.write_pos] = right;

        let delay = delay_frames.clamp(0.0, (len - 2) as f32);
        let int_delay = delay as usize;
        let frac = delay - int_delay as f32;
        let i0 = (self.write_pos + len - int_delay) % len;
        let i1 = (i0 + len - 1) % len;
        self.write_pos = (self.write_pos + 1) % len;

        (
            self.left[i0] * (1.0 - frac) + self.left[i1] * frac,
            self.right[i0] * (1.0 - frac) + self.right[i1] * frac,
        )
    }

    fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write_pos = 0;
    }
}

/// Convolution reverb unit
pub struct Reverb {
    sample_rate: f32,
    bypass: Bypass,
    cache: Arc<ImpulseCache>,
    preset: Option<ReverbPreset>,
    pre_delay: SmoothedParam,
    pre_delay_line: PreDelay,
    convolver: Convolver,
}

impl Reverb {
    /// Create a reverb with no impulse loaded (disabled)
    ///
    /// The convolver is sized for the longest preset at this rate, so later
    /// preset changes never grow its buffers.
    pub fn new(sample_rate: f32, cache: Arc<ImpulseCache>) -> Self {
        let defaults = ReverbState::default();
        let rate = ImpulseCache::rate_key(sample_rate);
        let pre_delay_len = (sample_rate * MAX_PRE_DELAY_MS / 1000.0).ceil() as usize + 3;

        Self {
            sample_rate,
            bypass: Bypass::new(sample_rate, false, defaults.mix),
            cache,
            preset: None,
            pre_delay: SmoothedParam::new(sample_rate, defaults.pre_delay_ms / 1000.0),
            pre_delay_line: PreDelay::new(pre_delay_len),
            convolver: Convolver::new(ReverbPreset::max_ir_len(rate)),
        }
    }

    /// Install `preset`'s impulse response, synthesizing it on a cache miss
    pub fn load_preset(&mut self, preset: ReverbPreset) -> Arc<ImpulseResponse> {
        let ir = self
            .cache
            .get_or_synthesize(preset, ImpulseCache::rate_key(self.sample_rate));
        self.convolver.set_impulse(Arc::clone(&ir));
        self.preset = Some(preset);
        ir
    }

    /// Currently loaded preset, if any
    pub fn preset(&self) -> Option<ReverbPreset> {
        self.preset
    }

    /// Currently installed impulse response
    pub fn impulse(&self) -> Option<&Arc<ImpulseResponse>> {
        self.convolver.impulse()
    }

    /// Set pre-delay in milliseconds (0 - 100)
    pub fn set_pre_delay_ms(&mut self, ms: f32) {
        self.pre_delay.set(ms.clamp(0.0, MAX_PRE_DELAY_MS) / 1000.0);
    }

    pub fn pre_delay_ms(&self) -> f32 {
        self.pre_delay.target() * 1000.0
    }

    pub fn cache(&self) -> &Arc<ImpulseCache> {
        &self.cache
    }
}

impl Effect for Reverb {
    fn process(&mut self, samples: &mut [f32]) {
        if self.bypass.is_disposed() {
            return;
        }

        let Self {
            sample_rate,
            bypass,
            pre_delay,
            pre_delay_line,
            convolver,
            ..
        } = self;
        let sample_rate = *sample_rate;

        bypass.process(samples, |l, r| {
            let delay_frames = pre_delay.next() * sample_rate;
            let (l, r) = pre_delay_line.process(l, r, delay_frames);
            convolver.process_frame(l, r)
        });
    }

    fn reset(&mut self) {
        self.pre_delay_line.clear();
        self.convolver.reset();
    }

    fn bypass(&self) -> &Bypass {
        &self.bypass
    }

    fn bypass_mut(&mut self) -> &mut Bypass {
        &mut self.bypass
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }

    fn dispose(&mut self) {
        if self.bypass.dispose() {
            self.convolver.release();
            self.pre_delay_line = PreDelay::new(0);
        }
    }
}

impl StateSync for Reverb {
    type State = ReverbState;

    fn update_from_state(&mut self, state: &ReverbState) {
        self.set_enabled(state.enabled);
        if self.preset != Some(state.preset) {
            self.load_preset(state.preset);
        }
        self.set_pre_delay_ms(state.pre_delay_ms);
        self.set_mix(state.mix);
    }

    fn state(&self) -> ReverbState {
        ReverbState {
            enabled: self.is_enabled(),
            preset: self.preset.unwrap_or_default(),
            pre_delay_ms: self.pre_delay_ms(),
            mix: self.mix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low rate keeps the convolution cheap in unoptimized test builds
    const SR: f32 = 16000.0;

    fn reverb() -> Reverb {
        Reverb::new(SR, Arc::new(ImpulseCache::new()))
    }

    #[test]
    fn test_reverb_defaults() {
        let reverb = reverb();
        assert!(!reverb.is_enabled());
        assert_eq!(reverb.mix(), 0.3);
        assert_eq!(reverb.preset(), None);
        assert!(reverb.impulse().is_none());
        assert_eq!(reverb.pre_delay_ms(), 0.0);
    }

    #[test]
    fn test_pre_delay_clamping() {
        let mut reverb = reverb();
        reverb.set_pre_delay_ms(250.0);
        assert!((reverb.pre_delay_ms() - 100.0).abs() < 1e-3);
        reverb.set_pre_delay_ms(-5.0);
        assert_eq!(reverb.pre_delay_ms(), 0.0);
    }

    #[test]
    fn test_load_preset_reuses_cached_ir() {
        let cache = Arc::new(ImpulseCache::new());
        let mut a = Reverb::new(SR, Arc::clone(&cache));
        let mut b = Reverb::new(SR, Arc::clone(&cache));

        let first = a.load_preset(ReverbPreset::SmallRoom);
        let second = b.load_preset(ReverbPreset::SmallRoom);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.synthesis_count(), 1);
        assert_eq!(a.preset(), Some(ReverbPreset::SmallRoom));
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut reverb = reverb();
        reverb.load_preset(ReverbPreset::SmallRoom);

        let mut samples: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let original = samples.clone();
        reverb.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_tail_rings_after_input_stops() {
        let mut reverb = reverb();
        reverb.update_from_state(&ReverbState {
            enabled: true,
            preset: ReverbPreset::SmallRoom,
            pre_delay_ms: 0.0,
            mix: 1.0,
        });

        let mut burst = vec![0.5f32; 2 * 1600];
        reverb.process(&mut burst);

        let mut silence = vec![0.0f32; 2 * 4000];
        reverb.process(&mut silence);
        let energy: f32 = silence.iter().map(|s| s * s).sum();
        assert!(energy > 1e-3, "no reverb tail");
    }

    #[test]
    fn test_update_from_state_idempotent() {
        let cache = Arc::new(ImpulseCache::new());
        let mut reverb = Reverb::new(SR, Arc::clone(&cache));
        let state = ReverbState {
            enabled: true,
            preset: ReverbPreset::Plate,
            pre_delay_ms: 20.0,
            mix: 0.4,
        };
        reverb.update_from_state(&state);
        let first = reverb.state();
        reverb.update_from_state(&state);

        assert_eq!(reverb.state(), first);
        assert_eq!(first.preset, ReverbPreset::Plate);
        assert_eq!(cache.synthesis_count(), 1);
    }

    #[test]
    fn test_dispose_passes_through() {
        let mut reverb = reverb();
        reverb.set_enabled(true);
        reverb.load_preset(ReverbPreset::SmallRoom);
        reverb.dispose();
        assert!(reverb.impulse().is_none());

        let mut samples = vec![0.1f32; 64];
        reverb.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.1));
    }
}
