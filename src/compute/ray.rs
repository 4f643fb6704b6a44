use glam::{Vec2, Vec3};

/// A ray segment with a parametric validity interval.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub t_min: f32,
    pub direction: Vec3,
    pub t_max: f32,
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            t_min: 0.0,
            direction,
            t_max: f32::MAX,
        }
    }

    #[must_use]
    pub fn segment(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32) -> Self {
        Self {
            origin,
            t_min,
            direction,
            t_max,
        }
    }

    #[inline]
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A closest-hit query result.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Index of the hit instance in the acceleration structure.
    pub instance_id: u32,
    /// Index of the hit triangle within the instance's mesh.
    pub triangle_id: u32,
    /// Barycentric coordinates of the hit (weights of vertices 1 and 2).
    pub bary: Vec2,
    /// Ray parameter of the hit.
    pub t: f32,
}
