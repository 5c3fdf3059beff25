//! Impulse response synthesis
//!
//! Every preset is rendered from four numbers: decay time, tail density,
//! high-frequency dampening and room size. The render is an exponentially
//! decaying noise tail plus a handful of early reflections, with a linear
//! damping ramp over the whole response. Each channel is normalized to a
//! peak of 0.5.

use super::convolver::KernelSpectra;
use rustfft::FftPlanner;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Number of discrete early reflections
const EARLY_REFLECTIONS: usize = 6;
/// Reflection spacing before room scaling (seconds)
const REFLECTION_SPACING: f32 = 0.008;
/// Reflections are only placed inside this window (seconds)
const EARLY_WINDOW: f32 = 0.05;
/// IR length as a multiple of the decay time
const LENGTH_FACTOR: f32 = 1.5;
/// Peak absolute sample after normalization
const NORMALIZED_PEAK: f32 = 0.5;

/// Built-in reverb spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReverbPreset {
    SmallRoom,
    #[default]
    MediumRoom,
    LargeHall,
    Plate,
    Cathedral,
}

/// Synthesis parameters behind a preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetConfig {
    /// Time for the tail envelope to fall by 3 nepers (seconds)
    pub decay: f32,
    /// Tail noise amplitude (0 - 1)
    pub density: f32,
    /// Fraction removed by the end of the response (0 - 1)
    pub dampening: f32,
    /// Scales early reflection spacing (0 - 1)
    pub room_size: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reverb preset: {0}")]
pub struct ParsePresetError(pub String);

impl ReverbPreset {
    pub const ALL: [ReverbPreset; 5] = [
        ReverbPreset::SmallRoom,
        ReverbPreset::MediumRoom,
        ReverbPreset::LargeHall,
        ReverbPreset::Plate,
        ReverbPreset::Cathedral,
    ];

    pub fn config(self) -> PresetConfig {
        let (decay, density, dampening, room_size) = match self {
            ReverbPreset::SmallRoom => (0.8, 0.70, 0.50, 0.3),
            ReverbPreset::MediumRoom => (1.5, 0.80, 0.40, 0.5),
            ReverbPreset::LargeHall => (3.0, 0.90, 0.30, 0.8),
            ReverbPreset::Plate => (2.0, 1.00, 0.20, 0.4),
            ReverbPreset::Cathedral => (5.0, 0.95, 0.25, 1.0),
        };
        PresetConfig {
            decay,
            density,
            dampening,
            room_size,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReverbPreset::SmallRoom => "small-room",
            ReverbPreset::MediumRoom => "medium-room",
            ReverbPreset::LargeHall => "large-hall",
            ReverbPreset::Plate => "plate",
            ReverbPreset::Cathedral => "cathedral",
        }
    }

    /// Samples per channel of this preset's IR at `sample_rate`
    pub fn ir_len(self, sample_rate: u32) -> usize {
        (sample_rate as f32 * self.config().decay * LENGTH_FACTOR).round() as usize
    }

    /// Longest IR any preset renders at `sample_rate`
    pub fn max_ir_len(sample_rate: u32) -> usize {
        Self::ALL
            .iter()
            .map(|p| p.ir_len(sample_rate))
            .max()
            .unwrap_or(0)
    }

    fn index(self) -> u64 {
        match self {
            ReverbPreset::SmallRoom => 1,
            ReverbPreset::MediumRoom => 2,
            ReverbPreset::LargeHall => 3,
            ReverbPreset::Plate => 4,
            ReverbPreset::Cathedral => 5,
        }
    }
}

impl fmt::Display for ReverbPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReverbPreset {
    type Err = ParsePresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ParsePresetError(s.to_string()))
    }
}

/// xorshift64 noise source (deterministic, no allocation)
struct NoiseSource {
    state: u64,
}

impl NoiseSource {
    fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift
        Self { state: seed | 1 }
    }

    /// Uniform in [0, 1]
    #[inline]
    fn next_unit(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state as f32) / (u64::MAX as f32)
    }

    /// Uniform in [lo, hi]
    #[inline]
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_unit()
    }
}

/// A rendered stereo impulse response with its convolution kernel
pub struct ImpulseResponse {
    preset: ReverbPreset,
    sample_rate: u32,
    channels: [Vec<f32>; 2],
    spectra: [KernelSpectra; 2],
}

impl fmt::Debug for ImpulseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpulseResponse")
            .field("preset", &self.preset)
            .field("sample_rate", &self.sample_rate)
            .field("len", &self.len())
            .finish()
    }
}

impl ImpulseResponse {
    /// Render `preset` at `sample_rate` and prepare its partitioned spectra
    pub fn synthesize(preset: ReverbPreset, sample_rate: u32) -> Self {
        let start = Instant::now();
        let config = preset.config();

        let left = render_channel(&config, sample_rate, seed_for(preset, 0));
        let right = render_channel(&config, sample_rate, seed_for(preset, 1));

        let mut planner = FftPlanner::new();
        let spectra = [
            KernelSpectra::new(&left, &mut planner),
            KernelSpectra::new(&right, &mut planner),
        ];

        tracing::debug!(
            preset = %preset,
            sample_rate,
            len = left.len(),
            elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
            "synthesized impulse response"
        );

        Self {
            preset,
            sample_rate,
            channels: [left, right],
            spectra,
        }
    }

    pub fn preset(&self) -> ReverbPreset {
        self.preset
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn left(&self) -> &[f32] {
        &self.channels[0]
    }

    pub fn right(&self) -> &[f32] {
        &self.channels[1]
    }

    pub(crate) fn spectra(&self, channel: usize) -> &KernelSpectra {
        &self.spectra[channel.min(1)]
    }
}

fn seed_for(preset: ReverbPreset, channel: u64) -> u64 {
    0x9E37_79B9_7F4A_7C15u64
        .wrapping_mul(preset.index())
        .wrapping_add(channel.wrapping_mul(0xD1B5_4A32_D192_ED03))
}

fn render_channel(config: &PresetConfig, sample_rate: u32, seed: u64) -> Vec<f32> {
    let sr = sample_rate as f32;
    let len = (sr * config.decay * LENGTH_FACTOR).round() as usize;
    let mut noise = NoiseSource::new(seed);

    let mut early = vec![0.0f32; len];
    for r in 0..EARLY_REFLECTIONS {
        let time = (r + 1) as f32 * REFLECTION_SPACING * config.room_size;
        if time >= EARLY_WINDOW {
            continue;
        }
        let index = (time * sr).round() as usize;
        let weight = 1.0 - r as f32 / EARLY_REFLECTIONS as f32;
        let amplitude = weight * 0.5 * noise.range(-0.5, 0.5);
        if let Some(slot) = early.get_mut(index) {
            *slot += amplitude;
        }
    }

    let mut samples: Vec<f32> = early
        .iter()
        .enumerate()
        .map(|(i, &reflection)| {
            let t = i as f32 / sr;
            let progress = i as f32 / len as f32;
            let envelope = (-3.0 * t / config.decay).exp();
            let tail = noise.range(-1.0, 1.0) * config.density;
            (reflection + tail * envelope) * (1.0 - config.dampening * progress)
        })
        .collect();

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        let scale = NORMALIZED_PEAK / peak;
        samples.iter_mut().for_each(|s| *s *= scale);
    }
    samples
}
