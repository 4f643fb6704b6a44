use std::sync::Arc;

use glam::{UVec2, Vec2};

use crate::base::{NodeRef, Sampler, SamplerInstance, SamplerState, SceneNode};
use crate::errors::Result;
use crate::samplers::StateBuffer;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::rng::{hash_words, mix_u32, permutation_element, ONE_MINUS_EPSILON};

/// Direction numbers of the two-dimensional Sobol basis. Dimension 0 is
/// the van der Corput sequence; dimension 1 follows the recurrence for
/// the primitive polynomial `x + 1`.
fn sobol_matrix(dimension: usize) -> [u32; 32] {
    let mut m = [0u32; 32];
    if dimension == 0 {
        for (k, v) in m.iter_mut().enumerate() {
            *v = 1u32 << (31 - k);
        }
    } else {
        m[0] = 1u32 << 31;
        for k in 1..32 {
            m[k] = m[k - 1] ^ (m[k - 1] >> 1);
        }
    }
    m
}

fn sobol_sample_u32(mut index: u32, matrix: &[u32; 32]) -> u32 {
    let mut v = 0u32;
    let mut k = 0;
    while index != 0 {
        if index & 1 != 0 {
            v ^= matrix[k];
        }
        index >>= 1;
        k += 1;
    }
    v
}

/// Hash-based Owen scrambling in base 2.
fn fast_owen_scramble(mut v: u32, seed: u32) -> u32 {
    v = v.reverse_bits();
    v ^= v.wrapping_mul(0x3d20_adea);
    v = v.wrapping_add(seed);
    v = v.wrapping_mul((seed >> 16) | 1);
    v ^= v.wrapping_mul(0x0552_6c56);
    v ^= v.wrapping_mul(0x53a2_2864);
    v.reverse_bits()
}

fn u32_to_unit_f32(v: u32) -> f32 {
    (v as f32 * (1.0 / 4_294_967_296.0)).min(ONE_MINUS_EPSILON)
}

/// The padded Sobol sampler: every dimension draws from the
/// two-dimensional Owen-scrambled Sobol basis, decorrelated across
/// dimensions by hashing the pixel and dimension into a permutation of
/// the sample index and a scramble seed.
pub struct PaddedSobolSampler {
    seed: u32,
}

impl PaddedSobolSampler {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for PaddedSobolSampler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SceneNode for PaddedSobolSampler {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Sampler
    }

    fn impl_type(&self) -> &'static str {
        "sobol"
    }
}

impl Sampler for PaddedSobolSampler {
    fn build(&self) -> Result<Box<dyn SamplerInstance>> {
        Ok(Box::new(PaddedSobolSamplerInstance {
            seed: self.seed,
            spp: 1,
            matrices: [sobol_matrix(0), sobol_matrix(1)],
            states: StateBuffer::new(),
        }))
    }
}

/// State layout: `[pixel_hash, sample_index, dimension, 0]`.
struct PaddedSobolSamplerInstance {
    seed: u32,
    spp: u32,
    matrices: [[u32; 32]; 2],
    states: StateBuffer,
}

impl PaddedSobolSamplerInstance {
    fn sample_dimension(&self, state: &SamplerState, dimension: u32) -> f32 {
        let pixel_hash = state.data[0];
        let sample_index = state.data[1];
        let hash = hash_words(&[pixel_hash, dimension, self.seed]);
        let index = permutation_element(sample_index % self.spp, self.spp, hash);
        let raw = sobol_sample_u32(index, &self.matrices[(dimension & 1) as usize]);
        u32_to_unit_f32(fast_owen_scramble(raw, mix_u32(hash)))
    }
}

impl SamplerInstance for PaddedSobolSamplerInstance {
    fn reset(&mut self, _resolution: UVec2, state_count: usize, spp: u32) {
        if !spp.is_power_of_two() {
            log::warn!(
                "Sobol sampler results are best with power-of-two samples per pixel \
                 ({spp} requested)."
            );
        }
        self.spp = spp.max(1);
        self.states.reset(state_count);
    }

    fn start(&self, pixel: UVec2, sample_index: u32) -> SamplerState {
        SamplerState {
            data: [
                hash_words(&[pixel.x, pixel.y]),
                sample_index,
                0,
                0,
            ],
        }
    }

    fn save_state(&self, id: usize, state: &SamplerState) {
        self.states.save(id, state);
    }

    fn load_state(&self, id: usize) -> SamplerState {
        self.states.load(id)
    }

    fn generate_1d(&self, state: &mut SamplerState) -> f32 {
        let dimension = state.data[2];
        state.data[2] += 1;
        self.sample_dimension(state, dimension)
    }

    fn generate_2d(&self, state: &mut SamplerState) -> Vec2 {
        let dimension = state.data[2];
        state.data[2] += 2;
        Vec2::new(
            self.sample_dimension(state, dimension),
            self.sample_dimension(state, dimension + 1),
        )
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let seed = node.u32_prop_or("seed", 0)?;
    Ok(NodeRef::Sampler(Arc::new(PaddedSobolSampler { seed })))
}
