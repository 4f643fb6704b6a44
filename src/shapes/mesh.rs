use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{Light, MeshView, NodeRef, SceneNode, Shape, ShapeBase, Surface, Transform};
use crate::compute::{Triangle, Vertex};
use crate::errors::{PrismError, Result};
use crate::pipeline::InstanceFlags;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A triangle mesh defined inline in the scene description through
/// `positions`, `indices`, and optional `normals` and `uvs` properties.
pub struct MeshShape {
    base: ShapeBase,
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    vertex_flags: InstanceFlags,
}

impl SceneNode for MeshShape {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Shape
    }

    fn impl_type(&self) -> &'static str {
        "mesh"
    }
}

impl Shape for MeshShape {
    fn surface(&self) -> Option<&Arc<dyn Surface>> {
        self.base.surface.as_ref()
    }

    fn light(&self) -> Option<&Arc<dyn Light>> {
        self.base.light.as_ref()
    }

    fn transform(&self) -> Option<&Arc<dyn Transform>> {
        self.base.transform.as_ref()
    }

    fn is_mesh(&self) -> bool {
        true
    }

    fn mesh(&self) -> Option<MeshView<'_>> {
        Some(MeshView {
            vertices: &self.vertices,
            triangles: &self.triangles,
        })
    }

    fn vertex_properties(&self) -> InstanceFlags {
        self.vertex_flags
    }

    fn shadow_terminator_factor(&self) -> f32 {
        self.base.shadow_terminator
    }

    fn intersection_offset_factor(&self) -> f32 {
        self.base.intersection_offset
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let base = ShapeBase::load(scene, node)?;

    let positions = node.number_list("positions")?;
    if positions.is_empty() || positions.len() % 3 != 0 {
        return Err(PrismError::schema(
            format!(
                "mesh 'positions' must hold 3 numbers per vertex, got {}",
                positions.len()
            ),
            node.location(),
        ));
    }
    let vertex_count = positions.len() / 3;

    let indices = node.number_list("indices")?;
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err(PrismError::schema(
            format!(
                "mesh 'indices' must hold 3 indices per triangle, got {}",
                indices.len()
            ),
            node.location(),
        ));
    }

    let normals = match node.lookup("normals") {
        Some(_) => {
            let n = node.number_list("normals")?;
            if n.len() != positions.len() {
                return Err(PrismError::schema(
                    "mesh 'normals' must match 'positions' in length",
                    node.location(),
                ));
            }
            Some(n)
        }
        None => None,
    };
    let uvs = match node.lookup("uvs") {
        Some(_) => {
            let uv = node.number_list("uvs")?;
            if uv.len() != vertex_count * 2 {
                return Err(PrismError::schema(
                    "mesh 'uvs' must hold 2 numbers per vertex",
                    node.location(),
                ));
            }
            Some(uv)
        }
        None => None,
    };

    let triangles: Vec<Triangle> = indices
        .chunks_exact(3)
        .map(|t| Triangle::new(t[0] as u32, t[1] as u32, t[2] as u32))
        .collect();
    for t in &triangles {
        if t.i0 as usize >= vertex_count
            || t.i1 as usize >= vertex_count
            || t.i2 as usize >= vertex_count
        {
            return Err(PrismError::schema(
                "mesh index out of range",
                node.location(),
            ));
        }
    }

    // Faceted normals as a fallback when the mesh does not provide any.
    let mut face_normals = vec![Vec3::Z; vertex_count];
    if normals.is_none() {
        for t in &triangles {
            let p = |i: u32| {
                Vec3::new(
                    positions[i as usize * 3] as f32,
                    positions[i as usize * 3 + 1] as f32,
                    positions[i as usize * 3 + 2] as f32,
                )
            };
            let n = (p(t.i1) - p(t.i0)).cross(p(t.i2) - p(t.i0));
            for i in [t.i0, t.i1, t.i2] {
                face_normals[i as usize] += n;
            }
        }
        for n in &mut face_normals {
            *n = n.normalize_or(Vec3::Z);
        }
    }

    let vertices: Vec<Vertex> = (0..vertex_count)
        .map(|i| {
            let position = Vec3::new(
                positions[i * 3] as f32,
                positions[i * 3 + 1] as f32,
                positions[i * 3 + 2] as f32,
            );
            let normal = match &normals {
                Some(n) => Vec3::new(
                    n[i * 3] as f32,
                    n[i * 3 + 1] as f32,
                    n[i * 3 + 2] as f32,
                )
                .normalize_or(Vec3::Z),
                None => face_normals[i],
            };
            let uv = match &uvs {
                Some(uv) => Vec2::new(uv[i * 2] as f32, uv[i * 2 + 1] as f32),
                None => Vec2::ZERO,
            };
            Vertex::new(position, normal, uv)
        })
        .collect();

    let mut vertex_flags = InstanceFlags::empty();
    if normals.is_some() {
        vertex_flags |= InstanceFlags::HAS_VERTEX_NORMAL;
    }
    if uvs.is_some() {
        vertex_flags |= InstanceFlags::HAS_VERTEX_UV;
    }

    Ok(NodeRef::Shape(Arc::new(MeshShape {
        base,
        vertices,
        triangles,
        vertex_flags,
    })))
}
