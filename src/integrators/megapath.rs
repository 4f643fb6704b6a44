use std::sync::Arc;
use std::time::Instant;

use glam::{UVec2, Vec2};

use crate::base::{
    Integrator, IntegratorInstance, LightSampler, LobeEvent, NodeRef, Sampler, SceneNode,
};
use crate::compute::dispatch_2d;
use crate::errors::{PrismError, Result};
use crate::lightsamplers::UniformLightSampler;
use crate::pipeline::{CameraItem, Pipeline};
use crate::samplers::IndependentSampler;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledSpectrum;
use crate::util::sampling::balance_heuristic;

/// The megakernel path tracer: the whole bounce loop in one kernel,
/// dispatched progressively one sample per pixel per frame.
pub struct MegakernelPathTracer {
    max_depth: u32,
    rr_depth: u32,
    rr_threshold: f32,
    sampler: Arc<dyn Sampler>,
    light_sampler: Arc<dyn LightSampler>,
}

impl SceneNode for MegakernelPathTracer {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Integrator
    }

    fn impl_type(&self) -> &'static str {
        "megapath"
    }
}

impl Integrator for MegakernelPathTracer {
    fn sampler(&self) -> &Arc<dyn Sampler> {
        &self.sampler
    }

    fn light_sampler(&self) -> &Arc<dyn LightSampler> {
        &self.light_sampler
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn crate::base::IntegratorInstance>> {
        Ok(Arc::new(MegakernelPathTracerInstance {
            max_depth: self.max_depth,
            rr_depth: self.rr_depth,
            rr_threshold: self.rr_threshold,
        }))
    }
}

struct MegakernelPathTracerInstance {
    max_depth: u32,
    rr_depth: u32,
    rr_threshold: f32,
}

/// Bound on loop iterations including alpha cut-out continuations,
/// which do not count as bounces.
const MAX_CONTINUATIONS: u32 = 4096;

/// Continues a ray past an alpha cut-out hit without respawning it, so
/// downstream intersections are bit-identical to a ray that never saw
/// the surface.
fn continuation_ray(ray: &crate::compute::Ray, t: f32) -> crate::compute::Ray {
    crate::compute::Ray::segment(
        ray.origin,
        ray.direction,
        t * (1.0 + 1e-4) + 1e-6,
        ray.t_max,
    )
}

impl IntegratorInstance for MegakernelPathTracerInstance {
    fn render(&self, pipeline: &mut Pipeline) -> Result<()> {
        if pipeline.light_sampler().is_none() || !pipeline.has_lighting() {
            return Err(PrismError::schema_unlocated(
                "path tracing cannot render scenes without lights",
            ));
        }
        for camera_index in 0..pipeline.camera_count() {
            self.render_one_camera(pipeline, camera_index)?;
        }
        Ok(())
    }
}

impl MegakernelPathTracerInstance {
    fn render_one_camera(&self, pipeline: &mut Pipeline, camera_index: usize) -> Result<()> {
        let (resolution, spp, time_span, file) = {
            let item = pipeline.camera(camera_index);
            (item.resolution, item.spp, item.time_span, item.file.clone())
        };
        log::info!(
            "Rendering to '{}' of resolution {}x{} at {spp}spp.",
            file.display(),
            resolution.x,
            resolution.y
        );

        let pixel_count = (resolution.x * resolution.y) as usize;
        pipeline
            .sampler_mut()
            .reset(resolution, pixel_count, spp);
        pipeline.camera(camera_index).film.clear();

        let start = Instant::now();
        for frame in 0..spp {
            let t = (f64::from(frame) + 0.5) / f64::from(spp);
            let time = time_span.0 + (time_span.1 - time_span.0) * t as f32;
            pipeline.update_geometry(time);

            let frozen: &Pipeline = pipeline;
            let item = frozen.camera(camera_index);
            dispatch_2d(resolution, |pixel| {
                self.render_pixel(frozen, item, pixel, frame, time, 1.0);
            });
        }
        log::info!(
            "Rendering finished in {} ms.",
            start.elapsed().as_millis()
        );

        pipeline.camera(camera_index).film.save(&file)
    }

    /// One progressive sample for one pixel: camera ray, intersection,
    /// MIS direct lighting, BSDF continuation, and Russian roulette.
    fn render_pixel(
        &self,
        pipeline: &Pipeline,
        item: &CameraItem,
        pixel: UVec2,
        frame: u32,
        time: f32,
        shutter_weight: f32,
    ) {
        let sampler = pipeline.sampler();
        let spectrum = pipeline.spectrum();
        let light_sampler = pipeline
            .light_sampler()
            .expect("checked before the dispatch");
        let state_id = (pixel.y * item.resolution.x + pixel.x) as usize;
        let mut state = sampler.start(pixel, frame);

        // Camera ray through the filtered sub-pixel position.
        let u_filter = sampler.generate_pixel_2d(&mut state);
        let (offset, filter_weight) = match &item.filter {
            Some(filter) => {
                let s = filter.sample(u_filter);
                (s.offset, s.weight)
            }
            None => (u_filter - Vec2::splat(0.5), 1.0),
        };
        let pixel_center = Vec2::new(pixel.x as f32 + 0.5, pixel.y as f32 + 0.5) + offset;
        let (mut ray, camera_weight) =
            item.camera
                .generate_ray(sampler, &mut state, pixel_center, time);

        let u_wavelength = if spectrum.is_fixed() {
            0.5
        } else {
            sampler.generate_1d(&mut state)
        };
        let mut swl = spectrum.sample(u_wavelength);
        let dimension = spectrum.dimension();

        let mut beta = SampledSpectrum::splat(dimension, camera_weight * filter_weight);
        let mut radiance = SampledSpectrum::zero(dimension);
        let mut pdf_bsdf = f32::INFINITY; // disables MIS on the first hit
        let mut eta_scale = 1.0f32;
        let mut depth = 0u32;
        let mut iterations = 0u32;

        while depth < self.max_depth && iterations < MAX_CONTINUATIONS {
            iterations += 1;

            let Some(it) = pipeline.intersect(&ray) else {
                // Escaped: the environment is the only remaining source.
                if pipeline.environment().is_some() {
                    let eval = light_sampler.evaluate_miss(pipeline, ray.direction, &swl, time);
                    if eval.pdf > 0.0 {
                        let weight = balance_heuristic(pdf_bsdf, eval.pdf);
                        radiance += &(&(&beta * &eval.l) * weight);
                    }
                }
                break;
            };

            if it.handle.has_light() {
                let eval = light_sampler.evaluate_hit(pipeline, &it, ray.origin, &swl, time);
                if eval.pdf > 0.0 {
                    let weight = balance_heuristic(pdf_bsdf, eval.pdf);
                    radiance += &(&(&beta * &eval.l) * weight);
                }
            }

            if !it.handle.has_surface() {
                break;
            }
            let surface = pipeline.surfaces().get(it.handle.surface_tag());
            let closure = surface.closure(pipeline, &it, &swl, time);

            // Stochastic alpha cut-out. A statically opaque or fully
            // transparent surface consumes no sample, and continuations
            // keep the original ray with `t_min` advanced past the hit,
            // so a zero-opacity mesh is bit-identical to an absent one
            // under a fixed seed. Continuations keep the previous BSDF
            // PDF and do not count as bounces.
            let mut u_lobe = None;
            if let Some(alpha) = closure.opacity() {
                if alpha <= 0.0 {
                    ray = continuation_ray(&ray, it.ray_t);
                    continue;
                }
                if alpha < 1.0 {
                    let u = sampler.generate_1d(&mut state);
                    if u >= alpha {
                        ray = continuation_ray(&ray, it.ray_t);
                        continue;
                    }
                    u_lobe = Some(u / alpha);
                }
            }

            // Next-event estimation through the light sampler.
            let wo = -ray.direction;
            let u_select = sampler.generate_1d(&mut state);
            let u_light = sampler.generate_2d(&mut state);
            let light_sample =
                light_sampler.sample(pipeline, &it, u_select, u_light, &swl, time);
            if light_sample.eval.pdf > 0.0 && !light_sample.eval.l.is_zero() {
                let shadow_ray = it.spawn_shadow_ray(light_sample.wi, light_sample.distance);
                if !pipeline.intersect_any(&shadow_ray) {
                    let eval = closure.evaluate(wo, light_sample.wi);
                    if eval.pdf > 0.0 {
                        let weight = balance_heuristic(light_sample.eval.pdf, eval.pdf);
                        let cos_i = it.shading.cos_theta(light_sample.wi).abs();
                        let contribution = &(&eval.f * &light_sample.eval.l)
                            * (weight * cos_i / light_sample.eval.pdf);
                        radiance += &(&beta * &contribution);
                    }
                }
            }

            // BSDF continuation.
            let u_lobe = u_lobe.unwrap_or_else(|| sampler.generate_1d(&mut state));
            let u_bsdf = sampler.generate_2d(&mut state);
            let sample = closure.sample(wo, u_lobe, u_bsdf);
            if sample.eval.pdf <= 0.0 || sample.eval.pdf.is_nan() {
                break;
            }
            if sample.event == LobeEvent::Transmit {
                if closure.is_dispersive() {
                    swl.terminate_secondary();
                }
                if let Some(eta) = closure.eta() {
                    eta_scale *= eta * eta;
                }
            }
            let cos_i = it.shading.cos_theta(sample.wi).abs();
            let denom = if sample.eval.pdf.is_infinite() {
                1.0
            } else {
                sample.eval.pdf
            };
            beta *= &(&sample.eval.f * (cos_i / denom));
            pdf_bsdf = sample.eval.pdf;
            ray = it.spawn_ray(sample.wi);
            if beta.is_zero() || beta.has_nan() {
                break;
            }
            depth += 1;

            // Russian roulette.
            if depth >= self.rr_depth {
                let q = spectrum
                    .cie_y(&swl, &(&beta * eta_scale))
                    .max(0.05)
                    .min(self.rr_threshold);
                if sampler.generate_1d(&mut state) >= q {
                    break;
                }
                beta *= 1.0 / q;
            }
        }

        let rgb = spectrum.srgb(&swl, &radiance);
        item.film.accumulate(pixel, rgb, shutter_weight);
        sampler.save_state(state_id, &state);
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let max_depth = node.u32_prop_or("depth", 10)?.max(1);
    let rr_depth = node.u32_prop_or("rr_depth", 2)?.max(1);
    let rr_threshold = node.f32_prop_or("rr_threshold", 0.95)?.clamp(0.05, 1.0);
    let sampler = match node.node_prop_or_none("sampler")? {
        Some(n) => scene.load_sampler(n)?,
        None => Arc::new(IndependentSampler::default()) as Arc<dyn Sampler>,
    };
    let light_sampler = match node.node_prop_or_none("light_sampler")? {
        Some(n) => scene.load_light_sampler(n)?,
        None => Arc::new(UniformLightSampler::default()) as Arc<dyn LightSampler>,
    };
    Ok(NodeRef::Integrator(Arc::new(MegakernelPathTracer {
        max_depth,
        rr_depth,
        rr_threshold,
        sampler,
        light_sampler,
    })))
}
