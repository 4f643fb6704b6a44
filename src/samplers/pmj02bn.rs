use std::sync::Arc;

use glam::{UVec2, Vec2};

use crate::base::{NodeRef, Sampler, SamplerInstance, SamplerState, SceneNode};
use crate::errors::Result;
use crate::samplers::StateBuffer;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::rng::{hash_words, mix_u32, permutation_element, ONE_MINUS_EPSILON};

/// Number of precomputed point sets rotated through per dimension pair.
const SAMPLE_SETS: usize = 16;

/// The progressive multi-jittered (0,2) sampler with blue-noise
/// dithering.
///
/// Point sets with the (0,2) stratification property are generated on
/// the host at reset (as independently Owen-scrambled (0,2) sequences)
/// and stored in a device buffer; per-pixel decorrelation applies a
/// hashed toroidal shift, which trades neighboring-pixel error for
/// high-frequency noise the way the blue-noise table construction does.
pub struct Pmj02bnSampler {
    seed: u32,
}

impl Pmj02bnSampler {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for Pmj02bnSampler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SceneNode for Pmj02bnSampler {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Sampler
    }

    fn impl_type(&self) -> &'static str {
        "pmj02bn"
    }
}

impl Sampler for Pmj02bnSampler {
    fn build(&self) -> Result<Box<dyn SamplerInstance>> {
        Ok(Box::new(Pmj02bnSamplerInstance {
            seed: self.seed,
            spp: 1,
            sets: Vec::new(),
            states: StateBuffer::new(),
        }))
    }
}

fn sobol02_point(index: u32, scramble_x: u32, scramble_y: u32) -> Vec2 {
    let mut x = 0u32;
    let mut y = 0u32;
    let mut vx = 1u32 << 31;
    let mut vy = 1u32 << 31;
    let mut i = index;
    let mut k = 0u32;
    while i != 0 {
        if i & 1 != 0 {
            x ^= vx;
            y ^= vy;
        }
        i >>= 1;
        k += 1;
        vx = 1u32 << (31 - k.min(31));
        vy ^= vy >> 1;
    }
    let owen = |v: u32, seed: u32| {
        let mut v = v.reverse_bits();
        v ^= v.wrapping_mul(0x3d20_adea);
        v = v.wrapping_add(seed);
        v = v.wrapping_mul((seed >> 16) | 1);
        v ^= v.wrapping_mul(0x0552_6c56);
        v ^= v.wrapping_mul(0x53a2_2864);
        v.reverse_bits()
    };
    Vec2::new(
        (owen(x, scramble_x) as f32 * (1.0 / 4_294_967_296.0)).min(ONE_MINUS_EPSILON),
        (owen(y, scramble_y) as f32 * (1.0 / 4_294_967_296.0)).min(ONE_MINUS_EPSILON),
    )
}

/// State layout: `[pixel.x, pixel.y, sample_index, dimension]`.
struct Pmj02bnSamplerInstance {
    seed: u32,
    spp: u32,
    /// `SAMPLE_SETS` point sets of `spp` samples each.
    sets: Vec<Vec2>,
    states: StateBuffer,
}

impl Pmj02bnSamplerInstance {
    fn set_point(&self, set: usize, index: u32) -> Vec2 {
        self.sets[set * self.spp as usize + index as usize]
    }
}

impl SamplerInstance for Pmj02bnSamplerInstance {
    fn reset(&mut self, _resolution: UVec2, state_count: usize, spp: u32) {
        if !spp.is_power_of_two() {
            log::warn!(
                "PMJ02BN sampler results are best with power-of-two samples per pixel \
                 ({spp} requested)."
            );
        }
        self.spp = spp.max(1);
        self.sets = (0..SAMPLE_SETS)
            .flat_map(|set| {
                let sx = mix_u32(hash_words(&[set as u32, 0x9e37, self.seed]));
                let sy = mix_u32(hash_words(&[set as u32, 0x79b9, self.seed]));
                (0..self.spp).map(move |i| sobol02_point(i, sx, sy))
            })
            .collect();
        self.states.reset(state_count);
    }

    fn start(&self, pixel: UVec2, sample_index: u32) -> SamplerState {
        SamplerState {
            data: [pixel.x, pixel.y, sample_index, 0],
        }
    }

    fn save_state(&self, id: usize, state: &SamplerState) {
        self.states.save(id, state);
    }

    fn load_state(&self, id: usize) -> SamplerState {
        self.states.load(id)
    }

    fn generate_1d(&self, state: &mut SamplerState) -> f32 {
        let [px, py, sample_index, dimension] = state.data;
        state.data[3] += 1;
        let hash = hash_words(&[px, py, dimension, self.seed]);
        let index = permutation_element(sample_index % self.spp, self.spp, hash);
        let value = self.set_point((hash as usize >> 8) % SAMPLE_SETS, index).x;
        let shift = mix_u32(hash) as f32 * (1.0 / 4_294_967_296.0);
        (value + shift).fract().min(ONE_MINUS_EPSILON)
    }

    fn generate_2d(&self, state: &mut SamplerState) -> Vec2 {
        let [px, py, sample_index, dimension] = state.data;
        state.data[3] += 2;
        let hash = hash_words(&[px, py, dimension, self.seed]);
        let index = permutation_element(sample_index % self.spp, self.spp, hash);
        let point = self.set_point((hash as usize >> 8) % SAMPLE_SETS, index);
        // Blue-noise style dither: a per-pixel toroidal shift.
        let shift = Vec2::new(
            mix_u32(hash ^ 0x68bc_21eb) as f32 * (1.0 / 4_294_967_296.0),
            mix_u32(hash ^ 0x02e5_be93) as f32 * (1.0 / 4_294_967_296.0),
        );
        Vec2::new(
            (point.x + shift.x).fract().min(ONE_MINUS_EPSILON),
            (point.y + shift.y).fract().min(ONE_MINUS_EPSILON),
        )
    }

    fn generate_pixel_2d(&self, state: &mut SamplerState) -> Vec2 {
        // The filter dimension keeps the raw stratified point so pixel
        // positions stay well distributed within each pixel.
        let [px, py, sample_index, dimension] = state.data;
        state.data[3] += 2;
        let hash = hash_words(&[px, py, dimension, self.seed]);
        let index = permutation_element(sample_index % self.spp, self.spp, hash);
        self.set_point((hash as usize >> 8) % SAMPLE_SETS, index)
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let seed = node.u32_prop_or("seed", 0)?;
    Ok(NodeRef::Sampler(Arc::new(Pmj02bnSampler { seed })))
}
