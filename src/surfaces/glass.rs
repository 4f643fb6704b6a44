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

/// A smooth dielectric with optional Cauchy dispersion.
///
/// The index of refraction follows `eta(lambda) = A + B / lambda^2`
/// (lambda in micrometers); `B != 0` makes the transmission lobe
/// dispersive, and sampling it terminates the secondary wavelengths.
pub struct GlassSurface {
    kr: Arc<dyn crate::base::Texture>,
    kt: Arc<dyn crate::base::Texture>,
    eta: f32,
    dispersion: f32,
}

impl SceneNode for GlassSurface {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Surface
    }

    fn impl_type(&self) -> &'static str {
        "glass"
    }
}

impl Surface for GlassSurface {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SurfaceInstance>> {
        // Anchor the Cauchy A coefficient so `eta` holds at the sodium
        // D line (589.3 nm).
        let d_line_um = 0.5893f32;
        let a = self.eta - self.dispersion / (d_line_um * d_line_um);
        Ok(Arc::new(GlassSurfaceInstance {
            kr: self.kr.build(pipeline)?,
            kt: self.kt.build(pipeline)?,
            cauchy_a: a,
            cauchy_b: self.dispersion,
        }))
    }
}

struct GlassSurfaceInstance {
    kr: Arc<dyn TextureInstance>,
    kt: Arc<dyn TextureInstance>,
    cauchy_a: f32,
    cauchy_b: f32,
}

impl SurfaceInstance for GlassSurfaceInstance {
    fn closure<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> Box<dyn SurfaceClosure + 'a> {
        // Dispersion uses the primary (hero) wavelength only; sampling
        // the transmission lobe collapses the rest of the bundle.
        let lambda_um = swl.lambda(0) * 1e-3;
        let eta = if lambda_um > 0.0 {
            self.cauchy_a + self.cauchy_b / (lambda_um * lambda_um)
        } else {
            self.cauchy_a
        };
        let eta = eta.max(1.0 + 1e-4);
        Box::new(GlassClosure {
            kr: self
                .kr
                .evaluate_albedo_spectrum(pipeline, it, swl, time)
                .value,
            kt: self
                .kt
                .evaluate_albedo_spectrum(pipeline, it, swl, time)
                .value,
            frame: it.shading,
            eta,
            // Relative index across the crossing the query ray makes.
            eta_rel: if it.back_facing { 1.0 / eta } else { eta },
            dispersive: self.cauchy_b != 0.0,
        })
    }
}

struct GlassClosure {
    kr: SampledSpectrum,
    kt: SampledSpectrum,
    frame: Frame,
    eta: f32,
    eta_rel: f32,
    dispersive: bool,
}

/// Fresnel reflectance of a smooth dielectric boundary.
fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let cos_i = cos_i.clamp(-1.0, 1.0);
    let (cos_i, eta) = if cos_i < 0.0 {
        (-cos_i, 1.0 / eta)
    } else {
        (cos_i, eta)
    };
    let sin2_t = (1.0 - cos_i * cos_i) / (eta * eta);
    if sin2_t >= 1.0 {
        return 1.0; // total internal reflection
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let r_parallel = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    let r_perpendicular = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
    0.5 * (r_parallel * r_parallel + r_perpendicular * r_perpendicular)
}

fn refract(wi: Vec3, n: Vec3, eta_rel: f32) -> Option<Vec3> {
    let cos_i = n.dot(wi);
    let sin2_t = (1.0 - cos_i * cos_i) / (eta_rel * eta_rel);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-wi / eta_rel + (cos_i / eta_rel - cos_t) * n)
}

impl SurfaceClosure for GlassClosure {
    fn evaluate(&self, _wo: Vec3, _wi: Vec3) -> SurfaceEval {
        SurfaceEval {
            f: SampledSpectrum::zero(self.kr.dimension()),
            pdf: 0.0,
        }
    }

    fn sample(&self, wo: Vec3, u_lobe: f32, _u: Vec2) -> SurfaceSample {
        let cos_o = self.frame.cos_theta(wo);
        let zero = || SurfaceSample {
            wi: self.frame.normal(),
            eval: SurfaceEval {
                f: SampledSpectrum::zero(self.kr.dimension()),
                pdf: 0.0,
            },
            event: LobeEvent::Null,
        };
        if cos_o == 0.0 {
            return zero();
        }
        // Face-forwarded normal for the incident side.
        let n = if cos_o > 0.0 {
            self.frame.normal()
        } else {
            -self.frame.normal()
        };
        let eta_rel = if cos_o > 0.0 { self.eta } else { 1.0 / self.eta };
        let reflectance = fresnel_dielectric(cos_o, self.eta);

        if u_lobe < reflectance {
            let wi = 2.0 * n.dot(wo) * n - wo;
            let cos_i = self.frame.cos_theta(wi).abs().max(1e-6);
            SurfaceSample {
                wi,
                eval: SurfaceEval {
                    f: &self.kr * (1.0 / cos_i),
                    pdf: f32::INFINITY,
                },
                event: LobeEvent::Reflect,
            }
        } else {
            let Some(wi) = refract(wo, n, eta_rel) else {
                return zero();
            };
            let cos_i = self.frame.cos_theta(wi).abs().max(1e-6);
            // Radiance rescaling across the boundary is handled by the
            // integrator through `eta`.
            SurfaceSample {
                wi,
                eval: SurfaceEval {
                    f: &self.kt * (1.0 / cos_i),
                    pdf: f32::INFINITY,
                },
                event: LobeEvent::Transmit,
            }
        }
    }

    fn is_dispersive(&self) -> bool {
        self.dispersive
    }

    fn eta(&self) -> Option<f32> {
        Some(self.eta_rel)
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let kr = scene.load_texture(node.node_prop("kr")?)?;
    let kt = scene.load_texture(node.node_prop("kt")?)?;
    let eta = node.f32_prop_or("eta", 1.5)?.max(1.0 + 1e-4);
    let dispersion = node.f32_prop_or("dispersion", 0.0)?.max(0.0);
    Ok(NodeRef::Surface(Arc::new(GlassSurface {
        kr,
        kt,
        eta,
        dispersion,
    })))
}
