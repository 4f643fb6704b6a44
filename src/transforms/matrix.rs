use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::base::{NodeRef, SceneNode, Transform};
use crate::errors::{PrismError, Result};
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A static transform, given either as a row-major 4x4 matrix (`m`) or
/// composed from `translate`, `rotate` (axis plus degrees), and `scale`
/// properties applied in TRS order.
pub struct MatrixTransform {
    matrix: Mat4,
}

impl MatrixTransform {
    #[must_use]
    pub fn new(matrix: Mat4) -> Self {
        Self { matrix }
    }
}

impl SceneNode for MatrixTransform {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Transform
    }

    fn impl_type(&self) -> &'static str {
        "matrix"
    }
}

impl Transform for MatrixTransform {
    fn is_static(&self) -> bool {
        true
    }

    fn is_identity(&self) -> bool {
        self.matrix == Mat4::IDENTITY
    }

    fn matrix(&self, _time: f32) -> Mat4 {
        self.matrix
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let matrix = if node.lookup("m").is_some() {
        let values = node.number_list("m")?;
        if values.len() != 16 {
            return Err(PrismError::schema(
                format!("transform 'm' expects 16 numbers, got {}", values.len()),
                node.location(),
            ));
        }
        let mut cols = [0.0f32; 16];
        // Scene files are row-major; glam stores column-major.
        for row in 0..4 {
            for col in 0..4 {
                cols[col * 4 + row] = values[row * 4 + col] as f32;
            }
        }
        Mat4::from_cols_array(&cols)
    } else {
        let translate = node.vec3_prop_or("translate", Vec3::ZERO)?;
        let scale = node.vec3_prop_or_splat("scale", Vec3::ONE)?;
        let rotation = match node.lookup("rotate") {
            Some(_) => {
                let r = node.vec4_prop("rotate")?;
                let axis = Vec3::new(r.x, r.y, r.z).normalize_or(Vec3::Y);
                Quat::from_axis_angle(axis, r.w.to_radians())
            }
            None => Quat::IDENTITY,
        };
        Mat4::from_scale_rotation_translation(scale, rotation, translate)
    };
    Ok(NodeRef::Transform(Arc::new(MatrixTransform::new(matrix))))
}
