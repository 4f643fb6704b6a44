use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{Interaction, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::spectrum::{SampledSpectrum, SampledWavelengths};

/// The light scene node, attached to shapes that emit.
pub trait Light: SceneNode {
    /// Builds the per-instance light for one emissive geometry instance.
    fn build(&self, pipeline: &mut Pipeline, instance_id: u32) -> Result<Arc<dyn LightInstance>>;
}

/// An emission evaluation: radiance and the solid-angle PDF of sampling
/// the evaluated point from the query origin.
#[derive(Debug, Clone)]
pub struct LightEval {
    pub l: SampledSpectrum,
    pub pdf: f32,
}

impl LightEval {
    #[must_use]
    pub fn zero(dimension: usize) -> Self {
        Self {
            l: SampledSpectrum::zero(dimension),
            pdf: 0.0,
        }
    }
}

/// One emissive geometry instance on the device.
pub trait LightInstance: Send + Sync {
    /// The geometry instance this light is bound to.
    fn instance_id(&self) -> u32;

    /// Evaluates emission toward `p_from` at a point on the light,
    /// returning the light's own solid-angle PDF (selection probability
    /// excluded).
    fn evaluate(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        p_from: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval;

    /// Samples a point on the light toward `p_from`, returning the
    /// evaluation at that point and the point itself.
    fn sample(
        &self,
        pipeline: &Pipeline,
        p_from: Vec3,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> (LightEval, Vec3);
}
