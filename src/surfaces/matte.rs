use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{
    Interaction, LobeEvent, NodeRef, SceneNode, Surface, SurfaceClosure, SurfaceEval,
    SurfaceInstance, SurfaceSample, TextureInstance,
};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::{SampledSpectrum, SampledWavelengths};
use crate::util::sampling::{cosine_hemisphere_pdf, sample_cosine_hemisphere};
use crate::util::Frame;

/// A two-sided Lambertian surface with an optional stochastic alpha
/// cut-out driven by an opacity texture.
pub struct MatteSurface {
    kd: Arc<dyn crate::base::Texture>,
    opacity: Option<Arc<dyn crate::base::Texture>>,
}

impl SceneNode for MatteSurface {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Surface
    }

    fn impl_type(&self) -> &'static str {
        "matte"
    }
}

impl Surface for MatteSurface {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SurfaceInstance>> {
        Ok(Arc::new(MatteSurfaceInstance {
            kd: self.kd.build(pipeline)?,
            opacity: match &self.opacity {
                Some(o) => Some(o.build(pipeline)?),
                None => None,
            },
        }))
    }
}

struct MatteSurfaceInstance {
    kd: Arc<dyn TextureInstance>,
    opacity: Option<Arc<dyn TextureInstance>>,
}

impl SurfaceInstance for MatteSurfaceInstance {
    fn closure<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> Box<dyn SurfaceClosure + 'a> {
        let albedo = self
            .kd
            .evaluate_albedo_spectrum(pipeline, it, swl, time)
            .value;
        let alpha = self
            .opacity
            .as_ref()
            .map(|o| o.evaluate(pipeline, it, time).x.clamp(0.0, 1.0));
        Box::new(MatteClosure {
            albedo,
            frame: it.shading,
            alpha,
        })
    }
}

struct MatteClosure {
    albedo: SampledSpectrum,
    frame: Frame,
    alpha: Option<f32>,
}

impl SurfaceClosure for MatteClosure {
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> SurfaceEval {
        let cos_o = self.frame.cos_theta(wo);
        let cos_i = self.frame.cos_theta(wi);
        if cos_o * cos_i <= 0.0 {
            return SurfaceEval {
                f: SampledSpectrum::zero(self.albedo.dimension()),
                pdf: 0.0,
            };
        }
        SurfaceEval {
            f: &self.albedo * (1.0 / PI),
            pdf: cosine_hemisphere_pdf(cos_i.abs()),
        }
    }

    fn sample(&self, wo: Vec3, _u_lobe: f32, u: Vec2) -> SurfaceSample {
        let cos_o = self.frame.cos_theta(wo);
        let mut local = sample_cosine_hemisphere(u);
        if cos_o < 0.0 {
            local.z = -local.z;
        }
        let wi = self.frame.to_world(local);
        SurfaceSample {
            wi,
            eval: SurfaceEval {
                f: &self.albedo * (1.0 / PI),
                pdf: cosine_hemisphere_pdf(local.z.abs()),
            },
            event: LobeEvent::Reflect,
        }
    }

    fn opacity(&self) -> Option<f32> {
        self.alpha
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let kd = scene.load_texture(node.node_prop("kd")?)?;
    let opacity = match node.node_prop_or_none("opacity")? {
        Some(n) => Some(scene.load_texture(n)?),
        None => None,
    };
    Ok(NodeRef::Surface(Arc::new(MatteSurface { kd, opacity })))
}
