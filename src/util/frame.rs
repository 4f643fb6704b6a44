use glam::Vec3;

/// An orthonormal shading frame.
///
/// Maps between world space and a local space where `+Z` is the frame
/// normal. Built either from a normal alone (Duff et al. branchless basis)
/// or from a normal plus a tangent hint.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    s: Vec3,
    t: Vec3,
    n: Vec3,
}

impl Frame {
    /// Builds a frame around `n` with an arbitrary tangent basis.
    #[must_use]
    pub fn from_normal(n: Vec3) -> Self {
        let sign = 1.0f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        Self {
            s: Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
            t: Vec3::new(b, sign + n.y * n.y * a, -n.y),
            n,
        }
    }

    /// Builds a frame around `n` using `tangent` as the primary axis hint.
    /// The tangent is re-orthogonalized against the normal.
    #[must_use]
    pub fn from_normal_tangent(n: Vec3, tangent: Vec3) -> Self {
        let s = (tangent - n * n.dot(tangent)).try_normalize();
        match s {
            Some(s) => Self {
                s,
                t: n.cross(s),
                n,
            },
            None => Self::from_normal(n),
        }
    }

    /// Transforms a world-space direction into the local frame.
    #[inline]
    #[must_use]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    /// Transforms a local-space direction into world space.
    #[inline]
    #[must_use]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// The frame normal (local `+Z`).
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.n
    }

    /// Cosine of the angle between `v` (world space) and the frame normal.
    #[inline]
    #[must_use]
    pub fn cos_theta(&self, v: Vec3) -> f32 {
        self.n.dot(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_is_orthonormal() {
        for n in [
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::new(0.3, -0.5, 0.8).normalize(),
            Vec3::new(-0.9, 0.1, -0.2).normalize(),
        ] {
            let f = Frame::from_normal(n);
            assert_relative_eq!(f.s.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(f.t.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(f.s.dot(f.t), 0.0, epsilon = 1e-5);
            assert_relative_eq!(f.s.dot(f.n), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn frame_round_trips_directions() {
        let f = Frame::from_normal(Vec3::new(0.1, 0.7, -0.3).normalize());
        let v = Vec3::new(0.4, -0.2, 0.6).normalize();
        let back = f.to_world(f.to_local(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, v.z, epsilon = 1e-5);
    }
}
