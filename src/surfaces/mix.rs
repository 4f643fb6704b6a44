use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{
    Interaction, NodeRef, SceneNode, Surface, SurfaceClosure, SurfaceEval, SurfaceInstance,
    SurfaceSample, TextureInstance,
};
use crate::errors::{PrismError, Result};
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledWavelengths;

/// A convex blend of two child surfaces by a ratio texture.
///
/// Sampling draws a lobe from the ratio, rescales the lobe selector for
/// the chosen child, and combines the evaluations; the children's own
/// PDF normalizations are never altered.
pub struct MixSurface {
    a: Arc<dyn Surface>,
    b: Arc<dyn Surface>,
    ratio: Option<Arc<dyn crate::base::Texture>>,
}

impl SceneNode for MixSurface {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Surface
    }

    fn impl_type(&self) -> &'static str {
        "mix"
    }
}

impl Surface for MixSurface {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SurfaceInstance>> {
        Ok(Arc::new(MixSurfaceInstance {
            a: self.a.build(pipeline)?,
            b: self.b.build(pipeline)?,
            ratio: match &self.ratio {
                Some(r) => Some(r.build(pipeline)?),
                None => None,
            },
        }))
    }
}

struct MixSurfaceInstance {
    a: Arc<dyn SurfaceInstance>,
    b: Arc<dyn SurfaceInstance>,
    ratio: Option<Arc<dyn TextureInstance>>,
}

impl SurfaceInstance for MixSurfaceInstance {
    fn closure<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> Box<dyn SurfaceClosure + 'a> {
        let ratio = self
            .ratio
            .as_ref()
            .map_or(0.5, |r| r.evaluate(pipeline, it, time).x.clamp(0.0, 1.0));
        Box::new(MixClosure {
            a: self.a.closure(pipeline, it, swl, time),
            b: self.b.closure(pipeline, it, swl, time),
            ratio,
        })
    }
}

struct MixClosure<'a> {
    a: Box<dyn SurfaceClosure + 'a>,
    b: Box<dyn SurfaceClosure + 'a>,
    ratio: f32,
}

impl MixClosure<'_> {
    fn mix(&self, eval_a: &SurfaceEval, eval_b: &SurfaceEval) -> SurfaceEval {
        let t = self.ratio;
        SurfaceEval {
            f: &(&eval_a.f * t) + &(&eval_b.f * (1.0 - t)),
            pdf: eval_a.pdf * t + eval_b.pdf * (1.0 - t),
        }
    }
}

impl SurfaceClosure for MixClosure<'_> {
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> SurfaceEval {
        let eval_a = self.a.evaluate(wo, wi);
        let eval_b = self.b.evaluate(wo, wi);
        self.mix(&eval_a, &eval_b)
    }

    fn sample(&self, wo: Vec3, u_lobe: f32, u: Vec2) -> SurfaceSample {
        if u_lobe < self.ratio {
            let sample_a = self.a.sample(wo, u_lobe / self.ratio, u);
            let eval_b = self.b.evaluate(wo, sample_a.wi);
            SurfaceSample {
                wi: sample_a.wi,
                eval: self.mix(&sample_a.eval, &eval_b),
                event: sample_a.event,
            }
        } else {
            let remapped = (u_lobe - self.ratio) / (1.0 - self.ratio);
            let sample_b = self.b.sample(wo, remapped, u);
            let eval_a = self.a.evaluate(wo, sample_b.wi);
            SurfaceSample {
                wi: sample_b.wi,
                eval: self.mix(&eval_a, &sample_b.eval),
                event: sample_b.event,
            }
        }
    }

    fn opacity(&self) -> Option<f32> {
        match (self.a.opacity(), self.b.opacity()) {
            (None, None) => None,
            (alpha_a, alpha_b) => {
                let t = self.ratio;
                Some(alpha_a.unwrap_or(1.0) * t + alpha_b.unwrap_or(1.0) * (1.0 - t))
            }
        }
    }

    fn is_dispersive(&self) -> bool {
        self.a.is_dispersive() || self.b.is_dispersive()
    }

    fn eta(&self) -> Option<f32> {
        self.a.eta().or_else(|| self.b.eta())
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let a = scene.load_surface(node.node_prop("a")?)?;
    let b = scene.load_surface(node.node_prop("b")?)?;
    let ratio = match node.node_prop_or_none("ratio")? {
        Some(n) => Some(scene.load_texture(n)?),
        None => None,
    };
    if Arc::ptr_eq(&a, &b) {
        return Err(PrismError::schema(
            "mix surface children must be distinct",
            node.location(),
        ));
    }
    Ok(NodeRef::Surface(Arc::new(MixSurface { a, b, ratio })))
}
