use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{Interaction, LightEval, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::spectrum::SampledWavelengths;

/// Selection tag marking the environment instead of an area light.
pub const SELECTION_ENVIRONMENT: u32 = u32::MAX;

/// The light sampler scene node.
pub trait LightSampler: SceneNode {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn LightSamplerInstance>>;
}

/// A light selection: either [`SELECTION_ENVIRONMENT`] or an area-light
/// tag, with the probability of having picked it.
#[derive(Debug, Clone, Copy)]
pub struct LightSelection {
    pub tag: u32,
    pub prob: f32,
}

/// A sampled direct-lighting candidate. `distance` is `f32::MAX` for
/// environment samples; PDFs include the selection probability.
#[derive(Debug, Clone)]
pub struct LightSamplerSample {
    pub eval: LightEval,
    pub wi: Vec3,
    pub distance: f32,
}

/// The unified light-plus-environment selection and sampling interface.
///
/// PDFs returned from sampling and from the symmetric hit/miss
/// evaluations are per solid angle and are scaled by the corresponding
/// selection probability, so the integrator applies them directly in
/// the MIS weights.
pub trait LightSamplerInstance: Send + Sync {
    /// Selects a light (or the environment) from a unit sample.
    fn select(&self, u: f32) -> LightSelection;

    /// Selects and samples direct lighting for the interaction.
    fn sample(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        u_select: f32,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightSamplerSample;

    /// Evaluates emission of a hit light instance, scaled by the area
    /// branch selection probability.
    fn evaluate_hit(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        p_from: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval;

    /// Evaluates environment radiance along an escaped ray, scaled by
    /// the environment selection probability.
    fn evaluate_miss(
        &self,
        pipeline: &Pipeline,
        wi: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval;
}
