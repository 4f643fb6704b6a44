use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::compute::ray::{Hit, Ray};

/// One mesh vertex: position, shading normal, and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    #[must_use]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    #[inline]
    #[must_use]
    pub fn uv(&self) -> Vec2 {
        Vec2::from_array(self.uv)
    }
}

/// An indexed triangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Triangle {
    pub i0: u32,
    pub i1: u32,
    pub i2: u32,
}

impl Triangle {
    #[must_use]
    pub fn new(i0: u32, i1: u32, i2: u32) -> Self {
        Self { i0, i1, i2 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    fn union(&mut self, other: Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    fn transformed(&self, m: Mat4) -> Aabb {
        let mut out = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.extend(m.transform_point3(corner));
        }
        out
    }

    /// Slab test; returns true if the ray interval overlaps the box.
    fn hit(&self, origin: Vec3, inv_dir: Vec3, t_min: f32, t_max: f32) -> bool {
        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let lo = t0.min(t1);
        let hi = t0.max(t1);
        let near = lo.max_element().max(t_min);
        let far = hi.min_element().min(t_max);
        near <= far
    }
}

/// Flat BVH node. Internal nodes have `count == 0`, a left child at the
/// next index, and a right child at `first`; leaves cover
/// `order[first..first + count]`.
#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    first: u32,
    count: u32,
}

const LEAF_SIZE: u32 = 4;
const STACK_DEPTH: usize = 64;

/// Builds a median-split BVH over the given bounds. Returns the node
/// array (preorder, so every child index is greater than its parent's)
/// and the primitive ordering.
fn build_bvh(bounds: &[Aabb]) -> (Vec<BvhNode>, Vec<u32>) {
    let mut order: Vec<u32> = (0..bounds.len() as u32).collect();
    let mut nodes = Vec::with_capacity(bounds.len() * 2);
    if !bounds.is_empty() {
        build_recursive(bounds, &mut order, 0, &mut nodes);
    }
    (nodes, order)
}

fn node_bounds(bounds: &[Aabb], items: &[u32]) -> Aabb {
    let mut b = Aabb::EMPTY;
    for &i in items {
        b.union(bounds[i as usize]);
    }
    b
}

fn build_recursive(bounds: &[Aabb], order: &mut [u32], first: u32, nodes: &mut Vec<BvhNode>) -> u32 {
    let node_index = nodes.len() as u32;
    let node_aabb = node_bounds(bounds, order);
    if order.len() as u32 <= LEAF_SIZE {
        nodes.push(BvhNode {
            bounds: node_aabb,
            first,
            count: order.len() as u32,
        });
        return node_index;
    }

    let mut centroid_aabb = Aabb::EMPTY;
    for &i in order.iter() {
        centroid_aabb.extend(bounds[i as usize].centroid());
    }
    let extent = centroid_aabb.max - centroid_aabb.min;
    let axis: usize = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    if extent[axis] <= 0.0 {
        // Degenerate spread; fall back to a (possibly large) leaf.
        nodes.push(BvhNode {
            bounds: node_aabb,
            first,
            count: order.len() as u32,
        });
        return node_index;
    }

    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        let ca = bounds[a as usize].centroid()[axis];
        let cb = bounds[b as usize].centroid()[axis];
        ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
    });

    nodes.push(BvhNode {
        bounds: node_aabb,
        first: 0, // patched below with the right child index
        count: 0,
    });
    let (left, right) = order.split_at_mut(mid);
    build_recursive(bounds, left, first, nodes);
    let right_index = build_recursive(bounds, right, first + mid as u32, nodes);
    nodes[node_index as usize].first = right_index;
    node_index
}

/// Möller-Trumbore intersection; the ray direction need not be
/// normalized, so `t` is preserved across instance transforms.
fn intersect_triangle(ray: &Ray, p0: Vec3, p1: Vec3, p2: Vec3) -> Option<(f32, Vec2)> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let pv = ray.direction.cross(e2);
    let det = e1.dot(pv);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tv = ray.origin - p0;
    let u = tv.dot(pv) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qv = tv.cross(e1);
    let v = ray.direction.dot(qv) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qv) * inv_det;
    if t < ray.t_min || t > ray.t_max {
        return None;
    }
    Some((t, Vec2::new(u, v)))
}

/// A bottom-level acceleration structure over one triangle mesh,
/// built once at pipeline build time.
pub struct Blas {
    positions: Vec<Vec3>,
    triangles: Vec<Triangle>,
    nodes: Vec<BvhNode>,
    order: Vec<u32>,
}

impl Blas {
    /// Builds the BVH for a mesh.
    #[must_use]
    pub fn build(vertices: &[Vertex], triangles: &[Triangle]) -> Self {
        let positions: Vec<Vec3> = vertices.iter().map(Vertex::position).collect();
        let bounds: Vec<Aabb> = triangles
            .iter()
            .map(|t| {
                let mut b = Aabb::EMPTY;
                b.extend(positions[t.i0 as usize]);
                b.extend(positions[t.i1 as usize]);
                b.extend(positions[t.i2 as usize]);
                b
            })
            .collect();
        let (nodes, order) = build_bvh(&bounds);
        Self {
            positions,
            triangles: triangles.to_vec(),
            nodes,
            order,
        }
    }

    fn root_bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.bounds)
    }

    fn intersect(&self, ray: &mut Ray, any: bool) -> Option<(u32, Vec2, f32)> {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = ray.direction.recip();
        let mut stack = [0u32; STACK_DEPTH];
        let mut sp = 0usize;
        let mut node = 0u32;
        let mut best: Option<(u32, Vec2, f32)> = None;
        loop {
            let n = &self.nodes[node as usize];
            if n.bounds.hit(ray.origin, inv_dir, ray.t_min, ray.t_max) {
                if n.count > 0 {
                    for &prim in &self.order[n.first as usize..(n.first + n.count) as usize] {
                        let tri = self.triangles[prim as usize];
                        let p0 = self.positions[tri.i0 as usize];
                        let p1 = self.positions[tri.i1 as usize];
                        let p2 = self.positions[tri.i2 as usize];
                        if let Some((t, bary)) = intersect_triangle(ray, p0, p1, p2) {
                            ray.t_max = t;
                            best = Some((prim, bary, t));
                            if any {
                                return best;
                            }
                        }
                    }
                } else {
                    // Push the right child, descend into the left.
                    stack[sp] = n.first;
                    sp += 1;
                    node += 1;
                    continue;
                }
            }
            if sp == 0 {
                break;
            }
            sp -= 1;
            node = stack[sp];
        }
        best
    }
}

/// One placed mesh in the top-level structure.
#[derive(Debug, Clone, Copy)]
pub struct TlasInstance {
    pub blas: u32,
    pub object_to_world: Mat4,
    pub world_to_object: Mat4,
    pub visible: bool,
}

impl TlasInstance {
    #[must_use]
    pub fn new(blas: u32, object_to_world: Mat4) -> Self {
        Self {
            blas,
            object_to_world,
            world_to_object: object_to_world.inverse(),
            visible: true,
        }
    }
}

/// The two-level acceleration structure.
///
/// Bottom-level structures are built once per mesh; the top level is
/// built once over instance bounds and refit (never rebuilt) when
/// per-frame transform updates move instances.
pub struct Accel {
    blas: Vec<Blas>,
    instances: Vec<TlasInstance>,
    nodes: Vec<BvhNode>,
    order: Vec<u32>,
}

impl Accel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blas: Vec::new(),
            instances: Vec::new(),
            nodes: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Registers a mesh BVH and returns its index.
    pub fn add_blas(&mut self, blas: Blas) -> u32 {
        self.blas.push(blas);
        self.blas.len() as u32 - 1
    }

    #[must_use]
    pub fn instance(&self, id: u32) -> &TlasInstance {
        &self.instances[id as usize]
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Builds the top level over the given instances.
    pub fn build(&mut self, instances: Vec<TlasInstance>) {
        self.instances = instances;
        let bounds = self.world_bounds();
        let (nodes, order) = build_bvh(&bounds);
        self.nodes = nodes;
        self.order = order;
    }

    /// Rewrites one instance transform; takes effect at the next refit.
    pub fn set_transform(&mut self, instance: u32, object_to_world: Mat4) {
        let inst = &mut self.instances[instance as usize];
        inst.object_to_world = object_to_world;
        inst.world_to_object = object_to_world.inverse();
    }

    /// Refits node bounds to the current instance transforms without
    /// changing the tree topology.
    pub fn refit(&mut self) {
        let bounds = self.world_bounds();
        for i in (0..self.nodes.len()).rev() {
            let node = self.nodes[i];
            let refitted = if node.count > 0 {
                node_bounds(
                    &bounds,
                    &self.order[node.first as usize..(node.first + node.count) as usize],
                )
            } else {
                let mut b = self.nodes[i + 1].bounds;
                b.union(self.nodes[node.first as usize].bounds);
                b
            };
            self.nodes[i].bounds = refitted;
        }
    }

    fn world_bounds(&self) -> Vec<Aabb> {
        self.instances
            .iter()
            .map(|inst| {
                self.blas[inst.blas as usize]
                    .root_bounds()
                    .transformed(inst.object_to_world)
            })
            .collect()
    }

    /// Closest-hit query.
    #[must_use]
    pub fn trace_closest(&self, ray: &Ray) -> Option<Hit> {
        self.trace(ray, false)
    }

    /// Any-hit query (shadow rays).
    #[must_use]
    pub fn trace_any(&self, ray: &Ray) -> bool {
        self.trace(ray, true).is_some()
    }

    fn trace(&self, ray: &Ray, any: bool) -> Option<Hit> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut world_ray = *ray;
        let inv_dir = world_ray.direction.recip();
        let mut stack = [0u32; STACK_DEPTH];
        let mut sp = 0usize;
        let mut node = 0u32;
        let mut best: Option<Hit> = None;
        loop {
            let n = &self.nodes[node as usize];
            if n.bounds
                .hit(world_ray.origin, inv_dir, world_ray.t_min, world_ray.t_max)
            {
                if n.count > 0 {
                    for &index in &self.order[n.first as usize..(n.first + n.count) as usize] {
                        let inst = &self.instances[index as usize];
                        if !inst.visible {
                            continue;
                        }
                        let mut local = Ray {
                            origin: inst.world_to_object.transform_point3(world_ray.origin),
                            t_min: world_ray.t_min,
                            direction: inst.world_to_object.transform_vector3(world_ray.direction),
                            t_max: world_ray.t_max,
                        };
                        if let Some((prim, bary, t)) =
                            self.blas[inst.blas as usize].intersect(&mut local, any)
                        {
                            world_ray.t_max = t;
                            best = Some(Hit {
                                instance_id: index,
                                triangle_id: prim,
                                bary,
                                t,
                            });
                            if any {
                                return best;
                            }
                        }
                    }
                } else {
                    stack[sp] = n.first;
                    sp += 1;
                    node += 1;
                    continue;
                }
            }
            if sp == 0 {
                break;
            }
            sp -= 1;
            node = stack[sp];
        }
        best
    }
}

impl Default for Accel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> (Vec<Vertex>, Vec<Triangle>) {
        let vertices = vec![
            Vertex::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(1.0, -1.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        ];
        let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)];
        (vertices, triangles)
    }

    #[test]
    fn closest_hit_finds_the_quad() {
        let (vertices, triangles) = quad_mesh();
        let mut accel = Accel::new();
        let blas = accel.add_blas(Blas::build(&vertices, &triangles));
        accel.build(vec![TlasInstance::new(blas, Mat4::IDENTITY)]);

        let ray = Ray::new(Vec3::new(0.2, 0.3, -5.0), Vec3::Z);
        let hit = accel.trace_closest(&ray).expect("ray should hit the quad");
        assert!((hit.t - 5.0).abs() < 1e-4);
        assert_eq!(hit.instance_id, 0);
    }

    #[test]
    fn any_hit_respects_segment_bounds() {
        let (vertices, triangles) = quad_mesh();
        let mut accel = Accel::new();
        let blas = accel.add_blas(Blas::build(&vertices, &triangles));
        accel.build(vec![TlasInstance::new(blas, Mat4::IDENTITY)]);

        let blocked = Ray::segment(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0, 10.0);
        assert!(accel.trace_any(&blocked));
        let short = Ray::segment(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0, 4.0);
        assert!(!accel.trace_any(&short));
    }

    #[test]
    fn refit_follows_transform_updates() {
        let (vertices, triangles) = quad_mesh();
        let mut accel = Accel::new();
        let blas = accel.add_blas(Blas::build(&vertices, &triangles));
        accel.build(vec![TlasInstance::new(blas, Mat4::IDENTITY)]);

        accel.set_transform(0, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        accel.refit();

        let miss = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!(accel.trace_closest(&miss).is_none());
        let hit = Ray::new(Vec3::new(10.0, 0.0, -5.0), Vec3::Z);
        assert!(accel.trace_closest(&hit).is_some());
    }
}
