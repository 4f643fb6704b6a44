use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{
    Environment, EnvironmentInstance, EnvironmentSample, LightEval, NodeRef, SceneNode,
};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledWavelengths;
use crate::util::sampling::{sample_uniform_sphere, uniform_sphere_pdf};

/// An environment emitting the same radiance in every direction.
pub struct ConstantEnvironment {
    emission: Vec3,
    scale: f32,
}

impl SceneNode for ConstantEnvironment {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Environment
    }

    fn impl_type(&self) -> &'static str {
        "constant"
    }
}

impl Environment for ConstantEnvironment {
    fn is_black(&self) -> bool {
        self.scale == 0.0 || self.emission == Vec3::ZERO
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn EnvironmentInstance>> {
        Ok(Arc::new(ConstantEnvironmentInstance {
            emission: self.emission * self.scale,
        }))
    }
}

struct ConstantEnvironmentInstance {
    emission: Vec3,
}

impl EnvironmentInstance for ConstantEnvironmentInstance {
    fn evaluate(
        &self,
        pipeline: &Pipeline,
        _wi: Vec3,
        swl: &SampledWavelengths,
        _time: f32,
    ) -> LightEval {
        LightEval {
            l: pipeline.spectrum().decode_illuminant(swl, self.emission),
            pdf: uniform_sphere_pdf(),
        }
    }

    fn sample(
        &self,
        pipeline: &Pipeline,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> EnvironmentSample {
        let wi = sample_uniform_sphere(u);
        EnvironmentSample {
            eval: self.evaluate(pipeline, wi, swl, time),
            wi,
        }
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let emission = node.vec3_prop_or_splat("emission", Vec3::ONE)?;
    let scale = node.f32_prop_or("scale", 1.0)?.max(0.0);
    Ok(NodeRef::Environment(Arc::new(ConstantEnvironment {
        emission,
        scale,
    })))
}
