use std::path::Path;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::base::{
    Camera, CameraBase, CameraInstance, Film, Filter, NodeRef, SamplerInstance, SamplerState,
    SceneNode, Transform,
};
use crate::compute::Ray;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::sampling::sample_uniform_disk_concentric;

/// A thin-lens camera with depth of field. Degenerates to a pinhole when
/// the aperture is zero (and then draws no lens samples).
pub struct ThinLensCamera {
    base: CameraBase,
    fov: f32,
    aperture: f32,
    focus_distance: f32,
}

impl SceneNode for ThinLensCamera {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Camera
    }

    fn impl_type(&self) -> &'static str {
        "thinlens"
    }
}

impl Camera for ThinLensCamera {
    fn film(&self) -> &Arc<dyn Film> {
        &self.base.film
    }

    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.base.filter.as_ref()
    }

    fn transform(&self) -> Option<&Arc<dyn Transform>> {
        self.base.transform.as_ref()
    }

    fn spp(&self) -> u32 {
        self.base.spp
    }

    fn file(&self) -> &Path {
        &self.base.file
    }

    fn time_span(&self) -> (f32, f32) {
        self.base.time_span
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn CameraInstance>> {
        let resolution = self.base.film.resolution();
        Ok(Arc::new(ThinLensCameraInstance {
            resolution: Vec2::new(resolution.x as f32, resolution.y as f32),
            tan_half_fov: (self.fov.to_radians() * 0.5).tan(),
            aperture: self.aperture,
            focus_distance: self.focus_distance,
            transform: self.base.transform.clone(),
        }))
    }
}

struct ThinLensCameraInstance {
    resolution: Vec2,
    tan_half_fov: f32,
    aperture: f32,
    focus_distance: f32,
    transform: Option<Arc<dyn Transform>>,
}

impl CameraInstance for ThinLensCameraInstance {
    fn generate_ray(
        &self,
        sampler: &dyn SamplerInstance,
        state: &mut SamplerState,
        pixel: Vec2,
        time: f32,
    ) -> (Ray, f32) {
        let aspect = self.resolution.x / self.resolution.y;
        let ndc = Vec2::new(
            2.0 * pixel.x / self.resolution.x - 1.0,
            1.0 - 2.0 * pixel.y / self.resolution.y,
        );
        let direction = Vec3::new(
            ndc.x * self.tan_half_fov * aspect,
            ndc.y * self.tan_half_fov,
            -1.0,
        );

        let (origin, direction) = if self.aperture > 0.0 {
            let lens = sample_uniform_disk_concentric(sampler.generate_2d(state)) * self.aperture;
            // `direction.z` is -1, so the plane of focus sits at
            // `direction * focus_distance`.
            let focus = direction * self.focus_distance;
            let origin = Vec3::new(lens.x, lens.y, 0.0);
            (origin, (focus - origin).normalize())
        } else {
            (Vec3::ZERO, direction.normalize())
        };

        let matrix = self
            .transform
            .as_ref()
            .map_or(Mat4::IDENTITY, |t| t.matrix(time));
        let ray = Ray::new(
            matrix.transform_point3(origin),
            matrix.transform_vector3(direction).normalize(),
        );
        (ray, 1.0)
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let base = CameraBase::load(scene, node)?;
    let fov = node.f32_prop_or("fov", 35.0)?.clamp(1e-3, 179.0);
    let aperture = node.f32_prop_or("aperture", 0.0)?.max(0.0);
    let focus_distance = node.f32_prop_or("focus_distance", 1.0)?.max(1e-3);
    Ok(NodeRef::Camera(Arc::new(ThinLensCamera {
        base,
        fov,
        aperture,
        focus_distance,
    })))
}
