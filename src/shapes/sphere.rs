use std::f32::consts::PI;
use std::sync::{Arc, OnceLock};

use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::base::{Light, MeshView, NodeRef, SceneNode, Shape, ShapeBase, Surface, Transform};
use crate::compute::{Triangle, Vertex};
use crate::errors::Result;
use crate::pipeline::InstanceFlags;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

const MAX_SUBDIVISION_LEVEL: u32 = 8;

// Icosahedron base geometry.
const BASE_VERTICES: [Vec3; 12] = [
    Vec3::new(0.0, -0.525731, 0.850651),
    Vec3::new(0.850651, 0.0, 0.525731),
    Vec3::new(0.850651, 0.0, -0.525731),
    Vec3::new(-0.850651, 0.0, -0.525731),
    Vec3::new(-0.850651, 0.0, 0.525731),
    Vec3::new(-0.525731, 0.850651, 0.0),
    Vec3::new(0.525731, 0.850651, 0.0),
    Vec3::new(0.525731, -0.850651, 0.0),
    Vec3::new(-0.525731, -0.850651, 0.0),
    Vec3::new(0.0, -0.525731, -0.850651),
    Vec3::new(0.0, 0.525731, -0.850651),
    Vec3::new(0.0, 0.525731, 0.850651),
];

const BASE_TRIANGLES: [[u32; 3]; 20] = [
    [1, 2, 6],
    [1, 7, 2],
    [3, 4, 5],
    [4, 3, 8],
    [6, 5, 11],
    [5, 6, 10],
    [9, 10, 2],
    [10, 9, 3],
    [7, 8, 9],
    [8, 7, 0],
    [11, 0, 1],
    [0, 11, 4],
    [6, 2, 10],
    [1, 6, 11],
    [3, 5, 10],
    [5, 4, 11],
    [2, 7, 9],
    [7, 1, 0],
    [3, 9, 8],
    [4, 8, 0],
];

struct SphereGeometry {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

fn direction_to_uv(w: Vec3) -> Vec2 {
    let theta = w.y.clamp(-1.0, 1.0).acos();
    let phi = w.x.atan2(w.z);
    Vec2::new((0.5 / PI * phi).fract(), (theta / PI).fract())
}

/// Midpoint subdivision of the unit icosphere: level `n` yields exactly
/// `20 * 4^n` triangles on a closed manifold.
fn build_sphere(subdivision: u32) -> SphereGeometry {
    let mut positions: Vec<Vec3> = BASE_VERTICES.iter().map(|v| v.normalize()).collect();
    let mut triangles: Vec<[u32; 3]> = BASE_TRIANGLES.to_vec();

    for _ in 0..subdivision {
        let mut midpoint_cache: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        let mut next = Vec::with_capacity(triangles.len() * 4);
        for t in &triangles {
            let mut midpoint = |a: u32, b: u32| -> u32 {
                let key = (a.min(b), a.max(b));
                *midpoint_cache.entry(key).or_insert_with(|| {
                    let p = (positions[a as usize] + positions[b as usize]).normalize();
                    positions.push(p);
                    positions.len() as u32 - 1
                })
            };
            let (a, b, c) = (t[0], t[1], t[2]);
            let ab = midpoint(a, b);
            let bc = midpoint(b, c);
            let ca = midpoint(c, a);
            next.push([a, ab, ca]);
            next.push([ab, b, bc]);
            next.push([ca, bc, c]);
            next.push([ab, bc, ca]);
        }
        triangles = next;
    }

    let vertices = positions
        .iter()
        .map(|&p| Vertex::new(p, p, direction_to_uv(p)))
        .collect();
    let triangles = triangles
        .into_iter()
        .map(|t| Triangle::new(t[0], t[1], t[2]))
        .collect();
    SphereGeometry {
        vertices,
        triangles,
    }
}

/// Subdivided geometries are shared process-wide across sphere nodes.
fn cached_sphere(subdivision: u32) -> Arc<SphereGeometry> {
    static CACHE: OnceLock<Mutex<FxHashMap<u32, Arc<SphereGeometry>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(FxHashMap::default()));
    let mut cache = cache.lock();
    cache
        .entry(subdivision)
        .or_insert_with(|| Arc::new(build_sphere(subdivision)))
        .clone()
}

/// A unit sphere tessellated from a subdivided icosahedron.
pub struct SphereShape {
    base: ShapeBase,
    geometry: Arc<SphereGeometry>,
}

impl SceneNode for SphereShape {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Shape
    }

    fn impl_type(&self) -> &'static str {
        "sphere"
    }
}

impl Shape for SphereShape {
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
            vertices: &self.geometry.vertices,
            triangles: &self.geometry.triangles,
        })
    }

    fn vertex_properties(&self) -> InstanceFlags {
        InstanceFlags::HAS_VERTEX_NORMAL | InstanceFlags::HAS_VERTEX_UV
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
    let subdivision = node
        .u32_prop_or("subdivision", 0)?
        .min(MAX_SUBDIVISION_LEVEL);
    Ok(NodeRef::Shape(Arc::new(SphereShape {
        base,
        geometry: cached_sphere(subdivision),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdivision_level_three_has_1280_triangles() {
        let geometry = build_sphere(3);
        assert_eq!(geometry.triangles.len(), 20 * 4usize.pow(3));
    }

    #[test]
    fn sphere_is_a_closed_manifold() {
        let geometry = build_sphere(2);
        let mut edge_counts: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        for t in &geometry.triangles {
            for (a, b) in [(t.i0, t.i1), (t.i1, t.i2), (t.i2, t.i0)] {
                *edge_counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        assert!(edge_counts.values().all(|&c| c == 2));
    }

    #[test]
    fn sphere_vertices_are_unit_length() {
        let geometry = build_sphere(1);
        for v in &geometry.vertices {
            assert!((v.position().length() - 1.0).abs() < 1e-5);
        }
    }
}
