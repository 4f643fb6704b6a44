use std::sync::Arc;

use crate::base::{Light, SceneNode, Surface, Transform};
use crate::compute::{Triangle, Vertex};
use crate::errors::Result;
use crate::pipeline::InstanceFlags;
use crate::scene::Scene;
use crate::sdl::NodeView;

/// Borrowed view of a mesh shape's geometry.
#[derive(Clone, Copy)]
pub struct MeshView<'a> {
    pub vertices: &'a [Vertex],
    pub triangles: &'a [Triangle],
}

/// The shape scene node.
///
/// Mesh shapes expose their geometry through [`mesh`](Self::mesh);
/// non-mesh shapes are recursive and expand at pipeline build into
/// transformed mesh instances, inheriting surface, light, and medium
/// assignments from their ancestors unless overridden.
pub trait Shape: SceneNode {
    fn surface(&self) -> Option<&Arc<dyn Surface>>;

    fn light(&self) -> Option<&Arc<dyn Light>>;

    fn transform(&self) -> Option<&Arc<dyn Transform>>;

    fn is_mesh(&self) -> bool {
        false
    }

    /// The mesh geometry; `None` unless [`is_mesh`](Self::is_mesh).
    fn mesh(&self) -> Option<MeshView<'_>> {
        None
    }

    /// Child shapes; empty for meshes.
    fn children(&self) -> &[Arc<dyn Shape>] {
        &[]
    }

    /// Which optional vertex attributes the mesh carries.
    fn vertex_properties(&self) -> InstanceFlags {
        InstanceFlags::empty()
    }

    /// Strength of the shadow-terminator smoothing, in `[0, 1]`.
    fn shadow_terminator_factor(&self) -> f32;

    /// Scale on the self-intersection ray offset.
    fn intersection_offset_factor(&self) -> f32;
}

/// Properties shared by every shape implementation.
pub struct ShapeBase {
    pub surface: Option<Arc<dyn Surface>>,
    pub light: Option<Arc<dyn Light>>,
    pub transform: Option<Arc<dyn Transform>>,
    pub shadow_terminator: f32,
    pub intersection_offset: f32,
}

impl ShapeBase {
    pub fn load(scene: &Scene, node: NodeView<'_>) -> Result<Self> {
        let surface = match node.node_prop_or_none("surface")? {
            Some(n) => Some(scene.load_surface(n)?),
            None => None,
        };
        let light = match node.node_prop_or_none("light")? {
            Some(n) => Some(scene.load_light(n)?),
            None => None,
        };
        let transform = match node.node_prop_or_none("transform")? {
            Some(n) => Some(scene.load_transform(n)?),
            None => None,
        };
        let shadow_terminator = node.f32_prop_or("shadow_terminator", 0.0)?.clamp(0.0, 1.0);
        let intersection_offset = node.f32_prop_or("intersection_offset", 1.0)?.max(0.0);
        Ok(Self {
            surface,
            light,
            transform,
            shadow_terminator,
            intersection_offset,
        })
    }
}
