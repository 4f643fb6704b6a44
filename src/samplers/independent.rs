use std::sync::Arc;

use glam::{UVec2, Vec2};

use crate::base::{NodeRef, Sampler, SamplerInstance, SamplerState, SceneNode};
use crate::errors::Result;
use crate::samplers::StateBuffer;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::rng::{tea, Pcg32};

/// The independent sampler: a PCG32 stream per pixel, seeded from the
/// pixel coordinates and the sample index.
pub struct IndependentSampler {
    seed: u32,
}

impl SceneNode for IndependentSampler {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Sampler
    }

    fn impl_type(&self) -> &'static str {
        "independent"
    }
}

impl Sampler for IndependentSampler {
    fn build(&self) -> Result<Box<dyn SamplerInstance>> {
        Ok(Box::new(IndependentSamplerInstance {
            seed: self.seed,
            states: StateBuffer::new(),
        }))
    }
}

impl Default for IndependentSampler {
    fn default() -> Self {
        Self { seed: 0 }
    }
}

/// State layout: `[pcg_state.lo, pcg_state.hi, pcg_inc.lo, pcg_inc.hi]`.
struct IndependentSamplerInstance {
    seed: u32,
    states: StateBuffer,
}

fn decode(state: &SamplerState) -> Pcg32 {
    let s = u64::from(state.data[0]) | (u64::from(state.data[1]) << 32);
    let inc = u64::from(state.data[2]) | (u64::from(state.data[3]) << 32);
    Pcg32::from_state(s, inc)
}

fn encode(rng: &Pcg32, state: &mut SamplerState) {
    let (s, inc) = rng.state();
    state.data = [s as u32, (s >> 32) as u32, inc as u32, (inc >> 32) as u32];
}

impl SamplerInstance for IndependentSamplerInstance {
    fn reset(&mut self, _resolution: UVec2, state_count: usize, _spp: u32) {
        self.states.reset(state_count);
    }

    fn start(&self, pixel: UVec2, sample_index: u32) -> SamplerState {
        let seq = tea::<5>(pixel.x, pixel.y ^ self.seed);
        let rng = Pcg32::new(u64::from(seq), u64::from(sample_index));
        let mut state = SamplerState::default();
        encode(&rng, &mut state);
        state
    }

    fn save_state(&self, id: usize, state: &SamplerState) {
        self.states.save(id, state);
    }

    fn load_state(&self, id: usize) -> SamplerState {
        self.states.load(id)
    }

    fn generate_1d(&self, state: &mut SamplerState) -> f32 {
        let mut rng = decode(state);
        let value = rng.next_f32();
        encode(&rng, state);
        value
    }

    fn generate_2d(&self, state: &mut SamplerState) -> Vec2 {
        let mut rng = decode(state);
        let value = Vec2::new(rng.next_f32(), rng.next_f32());
        encode(&rng, state);
        value
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let seed = node.u32_prop_or("seed", 0)?;
    Ok(NodeRef::Sampler(Arc::new(IndependentSampler { seed })))
}
