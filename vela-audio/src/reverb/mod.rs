//! Convolution reverb building blocks
//!
//! [`ImpulseResponse`] renders a preset, [`ImpulseCache`] shares renders
//! across reverb units, and [`Convolver`] runs the partitioned convolution.

mod cache;
mod convolver;
mod impulse;

pub use cache::ImpulseCache;
pub use convolver::{Convolver, KernelSpectra, PARTITION_SIZE};
pub use impulse::{ImpulseResponse, ParsePresetError, PresetConfig, ReverbPreset};
