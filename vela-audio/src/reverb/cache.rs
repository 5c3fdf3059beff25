//! Shared impulse response cache
//!
//! Keyed by `(preset, sample_rate)`. Entries are never evicted or replaced,
//! so a handed-out `Arc` stays the canonical IR for its key for the lifetime
//! of the cache. Synthesis runs outside the lock; when two callers race on
//! the same key the first insert wins and both get that entry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ImpulseResponse, ReverbPreset};

type CacheKey = (ReverbPreset, u32);

/// Append-only map of synthesized impulse responses
#[derive(Default)]
pub struct ImpulseCache {
    entries: RwLock<HashMap<CacheKey, Arc<ImpulseResponse>>>,
    /// Number of syntheses performed (including ones that lost an insert race)
    synthesized: AtomicUsize,
}

impl ImpulseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integer rate used in cache keys for a stream sample rate
    pub fn rate_key(sample_rate: f32) -> u32 {
        sample_rate.round().max(1.0) as u32
    }

    /// Cached IR for `(preset, sample_rate)`, without synthesizing
    pub fn get(&self, preset: ReverbPreset, sample_rate: u32) -> Option<Arc<ImpulseResponse>> {
        self.entries.read().get(&(preset, sample_rate)).cloned()
    }

    /// Return the cached IR, synthesizing and inserting it on a miss
    pub fn get_or_synthesize(
        &self,
        preset: ReverbPreset,
        sample_rate: u32,
    ) -> Arc<ImpulseResponse> {
        if let Some(ir) = self.get(preset, sample_rate) {
            tracing::trace!(preset = %preset, sample_rate, "impulse cache hit");
            return ir;
        }

        let ir = Arc::new(ImpulseResponse::synthesize(preset, sample_rate));
        self.synthesized.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.write();
        Arc::clone(entries.entry((preset, sample_rate)).or_insert(ir))
    }

    pub fn contains(&self, preset: ReverbPreset, sample_rate: u32) -> bool {
        self.entries.read().contains_key(&(preset, sample_rate))
    }

    /// Number of cached IRs
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn synthesis_count(&self) -> usize {
        self.synthesized.load(Ordering::Relaxed)
    }
}
