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
use crate::util::Frame;

/// A perfect specular reflector with a tint.
pub struct MirrorSurface {
    tint: Arc<dyn crate::base::Texture>,
}

impl SceneNode for MirrorSurface {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Surface
    }

    fn impl_type(&self) -> &'static str {
        "mirror"
    }
}

impl Surface for MirrorSurface {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SurfaceInstance>> {
        Ok(Arc::new(MirrorSurfaceInstance {
            tint: self.tint.build(pipeline)?,
        }))
    }
}

struct MirrorSurfaceInstance {
    tint: Arc<dyn TextureInstance>,
}

impl SurfaceInstance for MirrorSurfaceInstance {
    fn closure<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> Box<dyn SurfaceClosure + 'a> {
        Box::new(MirrorClosure {
            tint: self
                .tint
                .evaluate_albedo_spectrum(pipeline, it, swl, time)
                .value,
            frame: it.shading,
        })
    }
}

struct MirrorClosure {
    tint: SampledSpectrum,
    frame: Frame,
}

impl SurfaceClosure for MirrorClosure {
    fn evaluate(&self, _wo: Vec3, _wi: Vec3) -> SurfaceEval {
        // Delta lobe: light sampling never hits it.
        SurfaceEval {
            f: SampledSpectrum::zero(self.tint.dimension()),
            pdf: 0.0,
        }
    }

    fn sample(&self, wo: Vec3, _u_lobe: f32, _u: Vec2) -> SurfaceSample {
        let n = self.frame.normal();
        let cos_o = self.frame.cos_theta(wo);
        if cos_o == 0.0 {
            return SurfaceSample {
                wi: n,
                eval: SurfaceEval {
                    f: SampledSpectrum::zero(self.tint.dimension()),
                    pdf: 0.0,
                },
                event: LobeEvent::Null,
            };
        }
        let wi = 2.0 * cos_o * n - wo;
        let cos_i = self.frame.cos_theta(wi).abs().max(1e-6);
        SurfaceSample {
            wi,
            eval: SurfaceEval {
                f: &self.tint * (1.0 / cos_i),
                pdf: f32::INFINITY,
            },
            event: LobeEvent::Reflect,
        }
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let tint = scene.load_texture(node.node_prop("tint")?)?;
    Ok(NodeRef::Surface(Arc::new(MirrorSurface { tint })))
}
