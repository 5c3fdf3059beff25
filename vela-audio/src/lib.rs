//! Audio effects engine for Vela - bypassable DSP units and their chain
//!
//! This crate provides the effects processing pipeline:
//! - Smoother: exponential ramps behind every automatable parameter
//! - Effects: EQ, compressor, filter, delay (mono / ping-pong), convolution reverb
//! - Reverb: impulse response synthesis, shared IR cache, partitioned convolver
//! - Chain: the five units in a reorderable series
//! - Engine: control-plane handle, IR worker thread and audio-thread processor
//!
//! All audio is stereo interleaved `f32` (L, R, L, R, ...).

mod chain;
mod effects;
mod engine;
pub mod reverb;
mod smoother;

pub use chain::{ChainState, EffectChain, EffectSlot, ParseSlotError, DEFAULT_ORDER};
pub use effects::{
    BiquadCoeffs, BiquadShape, BiquadState, Bypass, Compressor, CompressorState, Delay,
    DelayState, DelayTopology, Effect, EqState, Equalizer, Filter, FilterState, Reverb,
    ReverbState, StateSync, StereoBiquad,
};
pub use engine::{EngineError, FxCommand, FxEngine, FxEvent, FxProcessor, ImpulseWorker};
pub use reverb::{ImpulseCache, ImpulseResponse, ReverbPreset};
pub use smoother::{SmoothedParam, DEFAULT_TIME_CONSTANT};
