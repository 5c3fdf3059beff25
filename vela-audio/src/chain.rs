//! Effect chain: the five units wired in series
//!
//! The chain owns every unit for its whole life. Units are never removed or
//! rebuilt; reordering only changes the order in which the same units are
//! run over the buffer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::effects::{
    Compressor, CompressorState, Delay, DelayState, Effect, EqState, Equalizer, Filter,
    FilterState, Reverb, ReverbState, StateSync,
};
use crate::reverb::ImpulseCache;

/// One position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectSlot {
    Eq,
    Filter,
    Compressor,
    Delay,
    Reverb,
}

/// Default signal flow: EQ → Filter → Compressor → Delay → Reverb
pub const DEFAULT_ORDER: [EffectSlot; 5] = [
    EffectSlot::Eq,
    EffectSlot::Filter,
    EffectSlot::Compressor,
    EffectSlot::Delay,
    EffectSlot::Reverb,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown effect: {0}")]
pub struct ParseSlotError(pub String);

impl EffectSlot {
    pub const ALL: [EffectSlot; 5] = DEFAULT_ORDER;

    pub fn name(self) -> &'static str {
        match self {
            EffectSlot::Eq => "eq",
            EffectSlot::Filter => "filter",
            EffectSlot::Compressor => "compressor",
            EffectSlot::Delay => "delay",
            EffectSlot::Reverb => "reverb",
        }
    }
}

impl fmt::Display for EffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectSlot {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|slot| slot.name() == wanted)
            .ok_or_else(|| ParseSlotError(s.to_string()))
    }
}

/// Settings for the whole chain
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChainState {
    pub eq: EqState,
    pub compressor: CompressorState,
    pub filter: FilterState,
    pub delay: DelayState,
    pub reverb: ReverbState,
}

/// The five effect units plus their processing order
pub struct EffectChain {
    sample_rate: f32,
    eq: Equalizer,
    filter: Filter,
    compressor: Compressor,
    delay: Delay,
    reverb: Reverb,
    order: [EffectSlot; 5],
}

impl EffectChain {
    /// Build all units up front (all disabled, default order)
    pub fn new(sample_rate: f32, cache: Arc<ImpulseCache>) -> Self {
        Self {
            sample_rate,
            eq: Equalizer::new(sample_rate),
            filter: Filter::new(sample_rate),
            compressor: Compressor::new(sample_rate),
            delay: Delay::new(sample_rate),
            reverb: Reverb::new(sample_rate, cache),
            order: DEFAULT_ORDER,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn order(&self) -> [EffectSlot; 5] {
        self.order
    }

    /// Reorder the units; anything but a permutation of all five is ignored
    pub fn set_order(&mut self, order: [EffectSlot; 5]) -> bool {
        if !is_permutation(&order) {
            return false;
        }
        self.order = order;
        true
    }

    pub fn unit(&self, slot: EffectSlot) -> &dyn Effect {
        match slot {
            EffectSlot::Eq => &self.eq,
            EffectSlot::Filter => &self.filter,
            EffectSlot::Compressor => &self.compressor,
            EffectSlot::Delay => &self.delay,
            EffectSlot::Reverb => &self.reverb,
        }
    }

    pub fn unit_mut(&mut self, slot: EffectSlot) -> &mut dyn Effect {
        match slot {
            EffectSlot::Eq => &mut self.eq,
            EffectSlot::Filter => &mut self.filter,
            EffectSlot::Compressor => &mut self.compressor,
            EffectSlot::Delay => &mut self.delay,
            EffectSlot::Reverb => &mut self.reverb,
        }
    }

    pub fn eq(&self) -> &Equalizer {
        &self.eq
    }

    pub fn eq_mut(&mut self) -> &mut Equalizer {
        &mut self.eq
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn compressor_mut(&mut self) -> &mut Compressor {
        &mut self.compressor
    }

    pub fn delay(&self) -> &Delay {
        &self.delay
    }

    pub fn delay_mut(&mut self) -> &mut Delay {
        &mut self.delay
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn reverb_mut(&mut self) -> &mut Reverb {
        &mut self.reverb
    }

    /// Run every unit over the buffer in the configured order
    pub fn process(&mut self, samples: &mut [f32]) {
        for slot in self.order {
            self.unit_mut(slot).process(samples);
        }
    }

    pub fn apply_eq(&mut self, state: &EqState) {
        self.eq.update_from_state(state);
    }

    pub fn apply_compressor(&mut self, state: &CompressorState) {
        self.compressor.update_from_state(state);
    }

    pub fn apply_filter(&mut self, state: &FilterState) {
        self.filter.update_from_state(state);
    }

    pub fn apply_delay(&mut self, state: &DelayState) {
        self.delay.update_from_state(state);
    }

    pub fn apply_reverb(&mut self, state: &ReverbState) {
        self.reverb.update_from_state(state);
    }

    /// Push a full settings snapshot into every unit
    pub fn apply_state(&mut self, state: &ChainState) {
        self.apply_eq(&state.eq);
        self.apply_compressor(&state.compressor);
        self.apply_filter(&state.filter);
        self.apply_delay(&state.delay);
        self.apply_reverb(&state.reverb);
    }

    pub fn state(&self) -> ChainState {
        ChainState {
            eq: self.eq.state(),
            compressor: self.compressor.state(),
            filter: self.filter.state(),
            delay: self.delay.state(),
            reverb: self.reverb.state(),
        }
    }

    /// Clear all signal history (delay lines, reverb tail, envelopes)
    pub fn reset(&mut self) {
        for slot in EffectSlot::ALL {
            self.unit_mut(slot).reset();
        }
    }

    /// Tear down every unit; the chain passes audio through afterwards
    pub fn dispose(&mut self) {
        for slot in EffectSlot::ALL {
            self.unit_mut(slot).dispose();
        }
    }
}

fn is_permutation(order: &[EffectSlot; 5]) -> bool {
    EffectSlot::ALL
        .iter()
        .all(|slot| order.iter().filter(|s| *s == slot).count() == 1)
}
