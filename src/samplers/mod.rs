//! Sampler implementations.
//!
//! All three samplers persist a `4 x u32` state per pixel in a device
//! buffer so that suspended kernels are resumable; [`SamplerState`]
//! documents the uniform contract.
//!
//! [`SamplerState`]: crate::base::SamplerState

mod independent;
mod pmj02bn;
mod sobol;

pub use independent::IndependentSampler;
pub use pmj02bn::Pmj02bnSampler;
pub use sobol::PaddedSobolSampler;

pub(crate) use independent::create as create_independent_plugin;
pub(crate) use pmj02bn::create as create_pmj02bn_plugin;
pub(crate) use sobol::create as create_sobol_plugin;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::base::SamplerState;

/// The persisted per-pixel state buffer shared by the sampler
/// implementations.
pub(crate) struct StateBuffer {
    words: Vec<AtomicU32>,
}

impl StateBuffer {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    pub fn reset(&mut self, state_count: usize) {
        self.words = (0..state_count * 4).map(|_| AtomicU32::new(0)).collect();
    }

    pub fn save(&self, id: usize, state: &SamplerState) {
        for (i, &word) in state.data.iter().enumerate() {
            self.words[id * 4 + i].store(word, Ordering::Relaxed);
        }
    }

    pub fn load(&self, id: usize) -> SamplerState {
        let mut data = [0u32; 4];
        for (i, word) in data.iter_mut().enumerate() {
            *word = self.words[id * 4 + i].load(Ordering::Relaxed);
        }
        SamplerState { data }
    }
}
