use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::base::{NodeRef, SceneNode, Transform};
use crate::errors::{PrismError, Result};
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A keyframed transform interpolating between child transforms.
///
/// Keyframe matrices are decomposed into scale, rotation, and
/// translation; rotations interpolate by slerp, the rest linearly.
/// Outside the keyed range the end keys clamp.
pub struct LerpTransform {
    time_points: Vec<f32>,
    keys: Vec<Arc<dyn Transform>>,
}

impl SceneNode for LerpTransform {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Transform
    }

    fn impl_type(&self) -> &'static str {
        "lerp"
    }
}

fn decompose(m: Mat4) -> (Vec3, Quat, Vec3) {
    m.to_scale_rotation_translation()
}

impl Transform for LerpTransform {
    fn is_static(&self) -> bool {
        self.keys.len() <= 1
    }

    fn matrix(&self, time: f32) -> Mat4 {
        if self.keys.len() == 1 {
            return self.keys[0].matrix(time);
        }
        let segment = self
            .time_points
            .partition_point(|&t| t <= time)
            .clamp(1, self.time_points.len() - 1);
        let (t0, t1) = (self.time_points[segment - 1], self.time_points[segment]);
        let alpha = if t1 > t0 {
            ((time - t0) / (t1 - t0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (s0, r0, p0) = decompose(self.keys[segment - 1].matrix(time));
        let (s1, r1, p1) = decompose(self.keys[segment].matrix(time));
        Mat4::from_scale_rotation_translation(
            s0.lerp(s1, alpha),
            r0.slerp(r1, alpha),
            p0.lerp(p1, alpha),
        )
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let time_points: Vec<f32> = node
        .number_list("time_points")?
        .iter()
        .map(|&t| t as f32)
        .collect();
    let keys = node
        .node_list("transforms")?
        .into_iter()
        .map(|n| scene.load_transform(n))
        .collect::<Result<Vec<_>>>()?;
    if keys.is_empty() || keys.len() != time_points.len() {
        return Err(PrismError::schema(
            format!(
                "lerp transform has {} time point(s) for {} transform(s)",
                time_points.len(),
                keys.len()
            ),
            node.location(),
        ));
    }
    if !time_points.windows(2).all(|w| w[0] <= w[1]) {
        return Err(PrismError::schema(
            "lerp transform time points must be sorted",
            node.location(),
        ));
    }
    Ok(NodeRef::Transform(Arc::new(LerpTransform {
        time_points,
        keys,
    })))
}
