use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{LightEval, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::spectrum::SampledWavelengths;

/// The environment (infinite light) scene node.
pub trait Environment: SceneNode {
    /// True if the environment contributes nothing and can be skipped.
    fn is_black(&self) -> bool {
        false
    }

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn EnvironmentInstance>>;
}

/// A sampled environment direction with its evaluation.
#[derive(Debug, Clone)]
pub struct EnvironmentSample {
    pub eval: LightEval,
    pub wi: Vec3,
}

/// The device-facing environment.
pub trait EnvironmentInstance: Send + Sync {
    /// Radiance and directional PDF along a world-space direction.
    fn evaluate(
        &self,
        pipeline: &Pipeline,
        wi: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval;

    /// Samples a direction from the environment's own directional
    /// distribution.
    fn sample(
        &self,
        pipeline: &Pipeline,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> EnvironmentSample;
}
