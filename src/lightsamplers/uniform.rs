use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{
    Interaction, LightEval, LightSampler, LightSamplerInstance, LightSamplerSample,
    LightSelection, NodeRef, SceneNode, SELECTION_ENVIRONMENT,
};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledWavelengths;

/// Uniform selection over area lights with a tunable environment branch.
///
/// With both area lights and an environment present, the environment is
/// picked with `environment_weight` clamped to `[0.01, 0.99]`; with only
/// one kind present the weight degenerates to one or zero. Area lights
/// are selected uniformly within their branch.
pub struct UniformLightSampler {
    environment_weight: f32,
}

impl UniformLightSampler {
    #[must_use]
    pub fn new(environment_weight: f32) -> Self {
        Self {
            environment_weight: environment_weight.clamp(0.0, 1.0),
        }
    }
}

impl Default for UniformLightSampler {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl SceneNode for UniformLightSampler {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::LightSampler
    }

    fn impl_type(&self) -> &'static str {
        "uniform"
    }
}

impl LightSampler for UniformLightSampler {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn LightSamplerInstance>> {
        let light_count = pipeline.lights().len();
        let has_environment = pipeline.environment().is_some();
        let env_prob = match (has_environment, light_count) {
            (false, _) => 0.0,
            (true, 0) => 1.0,
            (true, _) => self.environment_weight.clamp(0.01, 0.99),
        };
        if !pipeline.has_lighting() {
            log::warn!("Scene has no lights and no environment.");
        }
        Ok(Arc::new(UniformLightSamplerInstance {
            env_prob,
            light_count: light_count as u32,
        }))
    }
}

struct UniformLightSamplerInstance {
    env_prob: f32,
    light_count: u32,
}

impl LightSamplerInstance for UniformLightSamplerInstance {
    fn select(&self, u: f32) -> LightSelection {
        let n = self.light_count as f32;
        if self.env_prob >= 1.0 || self.light_count == 0 {
            return LightSelection {
                tag: SELECTION_ENVIRONMENT,
                prob: if self.env_prob > 0.0 { 1.0 } else { 0.0 },
            };
        }
        if u < self.env_prob {
            return LightSelection {
                tag: SELECTION_ENVIRONMENT,
                prob: self.env_prob,
            };
        }
        let remapped = (u - self.env_prob) / (1.0 - self.env_prob);
        let tag = ((remapped * n) as u32).min(self.light_count - 1);
        LightSelection {
            tag,
            prob: (1.0 - self.env_prob) / n,
        }
    }

    fn sample(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        u_select: f32,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightSamplerSample {
        let selection = self.select(u_select);
        if selection.prob <= 0.0 {
            return LightSamplerSample {
                eval: LightEval::zero(swl.dimension()),
                wi: Vec3::Z,
                distance: f32::MAX,
            };
        }
        if selection.tag == SELECTION_ENVIRONMENT {
            let environment = pipeline
                .environment()
                .expect("environment selection implies an environment");
            let mut sample = environment.sample(pipeline, u, swl, time);
            sample.eval.pdf *= selection.prob;
            return LightSamplerSample {
                eval: sample.eval,
                wi: sample.wi,
                distance: f32::MAX,
            };
        }
        let light = pipeline.lights().get(selection.tag);
        let (mut eval, p_light) = light.sample(pipeline, it.p(), u, swl, time);
        eval.pdf *= selection.prob;
        let delta = p_light - it.p();
        let distance = delta.length();
        LightSamplerSample {
            eval,
            wi: delta / distance.max(1e-20),
            distance,
        }
    }

    fn evaluate_hit(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        p_from: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval {
        if self.light_count == 0 {
            return LightEval::zero(swl.dimension());
        }
        let tag = it.handle.light_tag();
        let mut eval = pipeline
            .lights()
            .dispatch(tag, |light| light.evaluate(pipeline, it, p_from, swl, time));
        eval.pdf *= (1.0 - self.env_prob) / self.light_count as f32;
        eval
    }

    fn evaluate_miss(
        &self,
        pipeline: &Pipeline,
        wi: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval {
        let Some(environment) = pipeline.environment() else {
            return LightEval::zero(swl.dimension());
        };
        if self.env_prob <= 0.0 {
            return LightEval::zero(swl.dimension());
        }
        let mut eval = environment.evaluate(pipeline, wi, swl, time);
        eval.pdf *= self.env_prob;
        eval
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let environment_weight = node.f32_prop_or("environment_weight", 0.5)?.clamp(0.0, 1.0);
    Ok(NodeRef::LightSampler(Arc::new(UniformLightSampler {
        environment_weight,
    })))
}
