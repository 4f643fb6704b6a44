use glam::{Vec2, Vec3};

use crate::compute::Ray;
use crate::pipeline::InstanceHandle;
use crate::util::Frame;

/// A surface interaction at a ray hit or a sampled light point.
///
/// `pg`/`ng` are the geometric position and normal; `ps` is the shading
/// position (offset by the shadow-terminator treatment when the shape
/// requests it) and `shading` the interpolated shading frame. The
/// geometric normal is never flipped; closures handle sidedness through
/// the shading frame.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub instance_id: u32,
    pub triangle_id: u32,
    pub handle: InstanceHandle,
    /// Geometric position (world space).
    pub pg: Vec3,
    /// Geometric normal (world space, unit).
    pub ng: Vec3,
    /// Shading position used as the shadow-ray origin.
    pub ps: Vec3,
    pub uv: Vec2,
    pub shading: Frame,
    /// World-space area of the hit triangle.
    pub prim_area: f32,
    /// Ray parameter of the hit; zero for sampled light points.
    pub ray_t: f32,
    /// True when the geometric normal faces away from the query origin.
    pub back_facing: bool,
}

const ORIGIN_EPSILON: f32 = 1e-4;
const SHADOW_T_EPSILON: f32 = 1e-3;

impl Interaction {
    /// A detached interaction carrying only texture coordinates, for
    /// evaluating textures outside any surface (environment lookups).
    #[must_use]
    pub fn at_uv(uv: Vec2) -> Self {
        Self {
            instance_id: u32::MAX,
            triangle_id: u32::MAX,
            handle: InstanceHandle::default(),
            pg: Vec3::ZERO,
            ng: Vec3::Z,
            ps: Vec3::ZERO,
            uv,
            shading: Frame::from_normal(Vec3::Z),
            prim_area: 0.0,
            ray_t: 0.0,
            back_facing: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn p(&self) -> Vec3 {
        self.pg
    }

    /// Ray origin nudged off the surface toward the hemisphere of `w`,
    /// scaled by the shape's intersection offset factor.
    #[must_use]
    pub fn robust_origin(&self, w: Vec3) -> Vec3 {
        let n = if self.ng.dot(w) >= 0.0 {
            self.ng
        } else {
            -self.ng
        };
        let scale = self.pg.abs().max_element().max(1.0);
        self.pg + n * (ORIGIN_EPSILON * scale * self.handle.intersection_offset())
    }

    /// Spawns a continuation ray in direction `w`.
    #[must_use]
    pub fn spawn_ray(&self, w: Vec3) -> Ray {
        Ray::new(self.robust_origin(w), w)
    }

    /// Spawns a shadow ray along `wi`. Starts at the shading position
    /// and stops just short of `distance` (pass `f32::MAX` for
    /// environment samples).
    #[must_use]
    pub fn spawn_shadow_ray(&self, wi: Vec3, distance: f32) -> Ray {
        let origin = self.robust_origin(wi) + (self.ps - self.pg);
        let t_max = if distance == f32::MAX {
            f32::MAX
        } else {
            distance * (1.0 - SHADOW_T_EPSILON)
        };
        Ray::segment(origin, wi, 0.0, t_max)
    }
}
