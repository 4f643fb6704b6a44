use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Mat3, Vec2, Vec3};

use crate::base::{
    Environment, EnvironmentInstance, EnvironmentSample, Interaction, LightEval, NodeRef,
    SceneNode, TextureInstance, Transform,
};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledWavelengths;
use crate::util::sampling::{
    create_alias_table, sample_alias_table, sample_uniform_sphere, uniform_sphere_pdf, AliasEntry,
};

/// Importance-map resolution for non-constant emission textures.
const SAMPLE_MAP_WIDTH: usize = 1024;
const SAMPLE_MAP_HEIGHT: usize = 512;

/// A lat-long environment map.
///
/// Non-constant emission builds a low-resolution scalar importance map
/// at pipeline build (luminance times the sin-theta area weight), turned
/// into a marginal-plus-conditional pair of alias tables. Optional MIS
/// compensation subtracts the map mean so the distribution concentrates
/// on what BSDF sampling handles poorly.
pub struct SphericalEnvironment {
    emission: Arc<dyn crate::base::Texture>,
    scale: f32,
    compensate_mis: bool,
    transform: Option<Arc<dyn Transform>>,
}

impl SceneNode for SphericalEnvironment {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Environment
    }

    fn impl_type(&self) -> &'static str {
        "spherical"
    }
}

fn uv_to_direction(uv: Vec2) -> (f32, Vec3) {
    let phi = 2.0 * PI * (1.0 - uv.x);
    let theta = PI * uv.y;
    let y = theta.cos();
    let sin_theta = theta.sin();
    (
        theta,
        Vec3::new(phi.sin() * sin_theta, y, phi.cos() * sin_theta).normalize(),
    )
}

fn direction_to_uv(w: Vec3) -> (f32, Vec2) {
    let theta = w.y.clamp(-1.0, 1.0).acos();
    let phi = w.x.atan2(w.z);
    let u = (1.0 - 0.5 * phi / PI).fract();
    let v = theta / PI;
    (theta, Vec2::new(u, v))
}

impl Environment for SphericalEnvironment {
    fn is_black(&self) -> bool {
        self.scale == 0.0 || self.emission.is_black()
    }

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn EnvironmentInstance>> {
        let texture = self.emission.build(pipeline)?;

        let map = if self.emission.is_constant() {
            None
        } else {
            let (w, h) = (SAMPLE_MAP_WIDTH, SAMPLE_MAP_HEIGHT);
            let swl = pipeline.spectrum().sample(0.5);
            let mut weights = vec![0.0f32; w * h];
            for y in 0..h {
                let sin_theta = (PI * (y as f32 + 0.5) / h as f32).sin();
                for x in 0..w {
                    let uv = Vec2::new(
                        (x as f32 + 0.5) / w as f32,
                        (y as f32 + 0.5) / h as f32,
                    );
                    let it = Interaction::at_uv(uv);
                    let strength = texture
                        .evaluate_illuminant_spectrum(pipeline, &it, &swl, 0.0)
                        .strength;
                    weights[y * w + x] = strength.max(0.0) * sin_theta;
                }
            }
            if self.compensate_mis {
                let mean = weights.iter().sum::<f32>() / weights.len() as f32;
                let compensated: Vec<f32> =
                    weights.iter().map(|&v| (v - mean).max(0.0)).collect();
                if compensated.iter().any(|&v| v > 0.0) {
                    weights = compensated;
                }
            }

            // Marginal alias table over row sums, then one conditional
            // table per row, concatenated into a single buffer.
            let row_sums: Vec<f32> = weights.chunks(w).map(|row| row.iter().sum()).collect();
            let (marginal, _) = create_alias_table(&row_sums);
            let mut alias: Vec<AliasEntry> = marginal;
            alias.reserve(w * h);
            for row in weights.chunks(w) {
                let (conditional, _) = create_alias_table(row);
                alias.extend(conditional);
            }

            let total: f64 = weights.iter().map(|&v| f64::from(v)).sum();
            let pdf: Vec<f32> = weights
                .iter()
                .map(|&v| {
                    if total > 0.0 {
                        (f64::from(v) / total * (w * h) as f64) as f32
                    } else {
                        0.0
                    }
                })
                .collect();

            let alias_id = pipeline.arena_allocate(&alias)?;
            let pdf_id = pipeline.arena_allocate(&pdf)?;
            Some((alias_id, pdf_id))
        };

        Ok(Arc::new(SphericalEnvironmentInstance {
            texture,
            scale: self.scale,
            transform: self.transform.clone(),
            map,
        }))
    }
}

struct SphericalEnvironmentInstance {
    texture: Arc<dyn TextureInstance>,
    scale: f32,
    transform: Option<Arc<dyn Transform>>,
    /// `(alias_id, pdf_id)` for importance-sampled emission.
    map: Option<(u32, u32)>,
}

impl SphericalEnvironmentInstance {
    fn env_to_world(&self, time: f32) -> Mat3 {
        self.transform
            .as_ref()
            .map_or(Mat3::IDENTITY, |t| Mat3::from_mat4(t.matrix(time)))
    }

    fn radiance(
        &self,
        pipeline: &Pipeline,
        uv: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> crate::spectrum::SampledSpectrum {
        let it = Interaction::at_uv(uv);
        let decode = self
            .texture
            .evaluate_illuminant_spectrum(pipeline, &it, swl, time);
        &decode.value * self.scale
    }

    fn directional_pdf(pdf_uv: f32, theta: f32) -> f32 {
        let sin_theta = theta.sin();
        if sin_theta <= 0.0 {
            0.0
        } else {
            pdf_uv / (2.0 * PI * PI * sin_theta)
        }
    }
}

impl EnvironmentInstance for SphericalEnvironmentInstance {
    fn evaluate(
        &self,
        pipeline: &Pipeline,
        wi: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval {
        let world_to_env = self.env_to_world(time).inverse();
        let local = (world_to_env * wi).normalize_or(Vec3::Y);
        let (theta, uv) = direction_to_uv(local);
        let l = self.radiance(pipeline, uv, swl, time);
        let pdf = match self.map {
            None => uniform_sphere_pdf(),
            Some((_, pdf_id)) => {
                let pdf_map: &[f32] = pipeline.bindless().buffer(pdf_id);
                let x = ((uv.x * SAMPLE_MAP_WIDTH as f32) as usize).min(SAMPLE_MAP_WIDTH - 1);
                let y = ((uv.y * SAMPLE_MAP_HEIGHT as f32) as usize).min(SAMPLE_MAP_HEIGHT - 1);
                Self::directional_pdf(pdf_map[y * SAMPLE_MAP_WIDTH + x], theta)
            }
        };
        LightEval { l, pdf }
    }

    fn sample(
        &self,
        pipeline: &Pipeline,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> EnvironmentSample {
        let env_to_world = self.env_to_world(time);
        match self.map {
            None => {
                let local = sample_uniform_sphere(u);
                let (_, uv) = direction_to_uv(local);
                EnvironmentSample {
                    eval: LightEval {
                        l: self.radiance(pipeline, uv, swl, time),
                        pdf: uniform_sphere_pdf(),
                    },
                    wi: (env_to_world * local).normalize(),
                }
            }
            Some((alias_id, pdf_id)) => {
                let alias: &[AliasEntry] = pipeline.bindless().buffer(alias_id);
                let (w, h) = (SAMPLE_MAP_WIDTH, SAMPLE_MAP_HEIGHT);
                let (iy, uy) = sample_alias_table(&alias[..h], u.y);
                let row = &alias[h + iy * w..h + (iy + 1) * w];
                let (ix, ux) = sample_alias_table(row, u.x);
                let uv = Vec2::new(
                    (ix as f32 + ux) / w as f32,
                    (iy as f32 + uy) / h as f32,
                );
                let (theta, local) = uv_to_direction(uv);
                let pdf_map: &[f32] = pipeline.bindless().buffer(pdf_id);
                let pdf_uv = pdf_map[iy * w + ix];
                EnvironmentSample {
                    eval: LightEval {
                        l: self.radiance(pipeline, uv, swl, time),
                        pdf: Self::directional_pdf(pdf_uv, theta),
                    },
                    wi: (env_to_world * local).normalize(),
                }
            }
        }
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let emission = scene.load_texture(node.node_prop("emission")?)?;
    let scale = node.f32_prop_or("scale", 1.0)?.max(0.0);
    let compensate_mis = node.bool_prop_or("compensate_mis", true)?;
    let transform = match node.node_prop_or_none("transform")? {
        Some(n) => Some(scene.load_transform(n)?),
        None => None,
    };
    Ok(NodeRef::Environment(Arc::new(SphericalEnvironment {
        emission,
        scale,
        compensate_mis,
        transform,
    })))
}
