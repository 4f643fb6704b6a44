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

/// An ideal pinhole camera looking down `-Z` in camera space.
pub struct PinholeCamera {
    base: CameraBase,
    fov: f32,
}

impl SceneNode for PinholeCamera {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Camera
    }

    fn impl_type(&self) -> &'static str {
        "pinhole"
    }
}

impl Camera for PinholeCamera {
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
        Ok(Arc::new(PinholeCameraInstance {
            resolution: Vec2::new(resolution.x as f32, resolution.y as f32),
            tan_half_fov: (self.fov.to_radians() * 0.5).tan(),
            transform: self.base.transform.clone(),
        }))
    }
}

struct PinholeCameraInstance {
    resolution: Vec2,
    tan_half_fov: f32,
    transform: Option<Arc<dyn Transform>>,
}

impl CameraInstance for PinholeCameraInstance {
    fn generate_ray(
        &self,
        _sampler: &dyn SamplerInstance,
        _state: &mut SamplerState,
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
        )
        .normalize();
        let matrix = self
            .transform
            .as_ref()
            .map_or(Mat4::IDENTITY, |t| t.matrix(time));
        let ray = Ray::new(
            matrix.transform_point3(Vec3::ZERO),
            matrix.transform_vector3(direction).normalize(),
        );
        (ray, 1.0)
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let base = CameraBase::load(scene, node)?;
    let fov = node.f32_prop_or("fov", 35.0)?.clamp(1e-3, 179.0);
    Ok(NodeRef::Camera(Arc::new(PinholeCamera { base, fov })))
}
