use glam::{UVec2, Vec2};

use crate::base::SceneNode;
use crate::errors::Result;

/// The sampler scene node.
pub trait Sampler: SceneNode {
    fn build(&self) -> Result<Box<dyn SamplerInstance>>;
}

/// Per-pixel sampler state: a small integer vector encoding the sample
/// index, current dimension, and any internal scrambling state. States
/// persist between kernel dispatches in a device buffer sized to the
/// pixel count, so suspended kernels are resumable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerState {
    pub data: [u32; 4],
}

/// The per-pixel, per-sample, per-dimension sample generator.
///
/// All generated values lie in `[0, 1)`. `generate_pixel_2d` feeds the
/// pixel filter and may be specialized per sampler.
pub trait SamplerInstance: Send + Sync {
    /// One-time setup for a render of `state_count` persisted states.
    fn reset(&mut self, resolution: UVec2, state_count: usize, spp: u32);

    /// Enters `(pixel, sample_index)` and returns the fresh state.
    fn start(&self, pixel: UVec2, sample_index: u32) -> SamplerState;

    /// Persists a state into the device buffer.
    fn save_state(&self, id: usize, state: &SamplerState);

    /// Restores a state from the device buffer.
    fn load_state(&self, id: usize) -> SamplerState;

    fn generate_1d(&self, state: &mut SamplerState) -> f32;

    fn generate_2d(&self, state: &mut SamplerState) -> Vec2;

    fn generate_pixel_2d(&self, state: &mut SamplerState) -> Vec2 {
        self.generate_2d(state)
    }
}
