//! Audio effects for Vela
//!
//! Every unit is a self-contained two-port stage: stereo interleaved samples
//! in, the same buffer out. The shared [`Bypass`] provides the dry path and
//! the click-free enable/mix crossfade; each unit only supplies its wet path.

mod biquad;
mod bypass;
mod compressor;
mod delay;
mod eq;
mod filter;
mod reverb;

pub use biquad::{BiquadCoeffs, BiquadShape, BiquadState, StereoBiquad};
pub use bypass::Bypass;
pub use compressor::{Compressor, CompressorState};
pub use delay::{Delay, DelayState, DelayTopology};
pub use eq::{EqState, Equalizer};
pub use filter::{Filter, FilterState};
pub use reverb::{Reverb, ReverbState};

/// Frames between coefficient updates for block-rate parameters
pub(crate) const CONTROL_BLOCK: usize = 32;

/// Trait for audio effect units
pub trait Effect: Send {
    /// Process audio samples in place (stereo interleaved)
    fn process(&mut self, samples: &mut [f32]);

    /// Reset effect state (filter history, delay lines, envelopes)
    fn reset(&mut self);

    /// Shared dry/wet stage
    fn bypass(&self) -> &Bypass;

    /// Shared dry/wet stage (mutable)
    fn bypass_mut(&mut self) -> &mut Bypass;

    /// Get effect name
    fn name(&self) -> &'static str;

    /// Release internally owned resources. Must be called exactly once.
    fn dispose(&mut self);

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool {
        self.bypass().is_enabled()
    }

    /// Enable/disable the effect (crossfaded)
    fn set_enabled(&mut self, enabled: bool) {
        self.bypass_mut().set_enabled(enabled);
    }

    /// Get wet/dry mix
    fn mix(&self) -> f32 {
        self.bypass().mix()
    }

    /// Set wet/dry mix (0.0 - 1.0)
    fn set_mix(&mut self, mix: f32) {
        self.bypass_mut().set_mix(mix);
    }
}

/// Apply a plain settings object to a unit
///
/// Implementations must be idempotent: applying the same state twice leaves
/// every internal target unchanged.
pub trait StateSync {
    type State;

    fn update_from_state(&mut self, state: &Self::State);

    /// Snapshot of the unit's current settings
    fn state(&self) -> Self::State;
}
