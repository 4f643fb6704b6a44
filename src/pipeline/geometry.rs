use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};
use half::f16;

use crate::base::{Interaction, Light, Shape, Surface, Transform};
use crate::compute::{Accel, BindlessArray, Blas, Hit, Ray, TlasInstance, Triangle, Vertex};
use crate::errors::{PrismError, Result};
use crate::util::Frame;

bitflags! {
    /// Per-instance property flags stored in the low bits of the
    /// geometry instance handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstanceFlags: u32 {
        const HAS_VERTEX_NORMAL = 1 << 0;
        const HAS_VERTEX_UV = 1 << 1;
        const HAS_SURFACE = 1 << 2;
        const HAS_LIGHT = 1 << 3;
        const HAS_MEDIUM = 1 << 4;
    }
}

/// The packed per-instance geometry record (4 x 32 bits).
///
/// Word 0: property flags in the low 10 bits, bindless buffer base in
/// the high 22. Word 1: light tag (bits 0-11), surface tag (12-23),
/// medium tag (24-31). Word 2: triangle count. Word 3: shadow-terminator
/// factor (f16, low half) and intersection-offset factor (f16, high
/// half).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InstanceHandle {
    words: [u32; 4],
}

impl InstanceHandle {
    /// Sub-buffer slots at the instance's bindless base.
    pub const VERTEX_SLOT: u32 = 0;
    pub const TRIANGLE_SLOT: u32 = 1;
    pub const ALIAS_SLOT: u32 = 2;
    pub const PDF_SLOT: u32 = 3;

    const FLAG_BITS: u32 = 10;
    const BASE_BITS: u32 = 22;
    const LIGHT_TAG_BITS: u32 = 12;
    const SURFACE_TAG_BITS: u32 = 12;
    const MEDIUM_TAG_BITS: u32 = 8;

    pub const MAX_SURFACE_TAGS: usize = 1 << Self::SURFACE_TAG_BITS;
    pub const MAX_LIGHT_TAGS: usize = 1 << Self::LIGHT_TAG_BITS;
    pub const MAX_MEDIUM_TAGS: usize = 1 << Self::MEDIUM_TAG_BITS;

    pub fn pack(
        buffer_base: u32,
        flags: InstanceFlags,
        surface_tag: u32,
        light_tag: u32,
        medium_tag: u32,
        triangle_count: u32,
        shadow_terminator: f32,
        intersection_offset: f32,
    ) -> Result<Self> {
        if buffer_base >= (1 << Self::BASE_BITS) {
            return Err(PrismError::ResourceExhausted(format!(
                "geometry buffer base {buffer_base} exceeds the handle range"
            )));
        }
        if surface_tag as usize >= Self::MAX_SURFACE_TAGS
            || light_tag as usize >= Self::MAX_LIGHT_TAGS
            || medium_tag as usize >= Self::MAX_MEDIUM_TAGS
        {
            return Err(PrismError::ResourceExhausted(format!(
                "instance tags ({surface_tag}, {light_tag}, {medium_tag}) exceed the handle range"
            )));
        }
        let word0 = flags.bits() | (buffer_base << Self::FLAG_BITS);
        let word1 = light_tag
            | (surface_tag << Self::LIGHT_TAG_BITS)
            | (medium_tag << (Self::LIGHT_TAG_BITS + Self::SURFACE_TAG_BITS));
        let word3 = u32::from(f16::from_f32(shadow_terminator).to_bits())
            | (u32::from(f16::from_f32(intersection_offset).to_bits()) << 16);
        Ok(Self {
            words: [word0, word1, triangle_count, word3],
        })
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> InstanceFlags {
        InstanceFlags::from_bits_truncate(self.words[0] & ((1 << Self::FLAG_BITS) - 1))
    }

    #[inline]
    #[must_use]
    pub fn buffer_base(&self) -> u32 {
        self.words[0] >> Self::FLAG_BITS
    }

    #[inline]
    #[must_use]
    pub fn light_tag(&self) -> u32 {
        self.words[1] & ((1 << Self::LIGHT_TAG_BITS) - 1)
    }

    #[inline]
    #[must_use]
    pub fn surface_tag(&self) -> u32 {
        (self.words[1] >> Self::LIGHT_TAG_BITS) & ((1 << Self::SURFACE_TAG_BITS) - 1)
    }

    #[inline]
    #[must_use]
    pub fn medium_tag(&self) -> u32 {
        self.words[1] >> (Self::LIGHT_TAG_BITS + Self::SURFACE_TAG_BITS)
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.words[2]
    }

    #[inline]
    #[must_use]
    pub fn shadow_terminator(&self) -> f32 {
        f16::from_bits((self.words[3] & 0xffff) as u16).to_f32()
    }

    #[inline]
    #[must_use]
    pub fn intersection_offset(&self) -> f32 {
        f16::from_bits((self.words[3] >> 16) as u16).to_f32()
    }

    #[inline]
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.flags().contains(InstanceFlags::HAS_SURFACE)
    }

    #[inline]
    #[must_use]
    pub fn has_light(&self) -> bool {
        self.flags().contains(InstanceFlags::HAS_LIGHT)
    }
}

/// Bindless locations of one uploaded mesh: vertex, triangle, alias, and
/// PDF sub-buffers at four contiguous slots starting at `buffer_base`.
#[derive(Debug, Clone, Copy)]
pub struct MeshRecord {
    pub buffer_base: u32,
    pub blas: u32,
    pub triangle_count: u32,
}

pub(crate) struct AnimatedInstance {
    pub instance: u32,
    pub chain: Vec<Arc<dyn Transform>>,
}

/// An instance gathered during shape traversal, before tags are
/// assigned and handles packed.
pub(crate) struct PendingInstance {
    pub mesh: MeshRecord,
    pub chain: Vec<Arc<dyn Transform>>,
    pub surface: Option<Arc<dyn Surface>>,
    pub light: Option<Arc<dyn Light>>,
    pub vertex_flags: InstanceFlags,
    pub shadow_terminator: f32,
    pub intersection_offset: f32,
}

pub(crate) fn chain_matrix(chain: &[Arc<dyn Transform>], time: f32) -> Mat4 {
    chain
        .iter()
        .fold(Mat4::IDENTITY, |m, t| m * t.matrix(time))
}

/// The device-side scene geometry: per-instance records, the transform
/// matrix table, and the two-level acceleration structure.
pub struct Geometry {
    pub(crate) instances: Vec<InstanceHandle>,
    pub(crate) mesh_records: Vec<MeshRecord>,
    pub(crate) instance_to_world: Vec<Mat4>,
    pub(crate) accel: Accel,
    pub(crate) animated: Vec<AnimatedInstance>,
    pub(crate) light_instances: Vec<u32>,
}

impl Geometry {
    #[must_use]
    pub fn instance(&self, id: u32) -> InstanceHandle {
        self.instances[id as usize]
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn mesh_record(&self, id: u32) -> MeshRecord {
        self.mesh_records[id as usize]
    }

    #[must_use]
    pub fn instance_to_world(&self, id: u32) -> Mat4 {
        self.instance_to_world[id as usize]
    }

    /// Geometry instance ids that carry lights, in light-tag order.
    #[must_use]
    pub fn light_instances(&self) -> &[u32] {
        &self.light_instances
    }

    /// Per-frame update: re-evaluates registered time-varying
    /// transforms, rewrites the matrix table wholesale, and refits the
    /// top-level structure.
    pub fn update(&mut self, time: f32) {
        if self.animated.is_empty() {
            return;
        }
        for animated in &self.animated {
            let matrix = chain_matrix(&animated.chain, time);
            self.instance_to_world[animated.instance as usize] = matrix;
            self.accel.set_transform(animated.instance, matrix);
        }
        self.accel.refit();
    }

    /// Closest-hit query resolved to a full interaction.
    #[must_use]
    pub fn intersect(&self, bindless: &BindlessArray, ray: &Ray) -> Option<Interaction> {
        let hit = self.accel.trace_closest(ray)?;
        Some(self.interaction(bindless, &hit, ray))
    }

    /// Any-hit query for shadow rays.
    #[must_use]
    pub fn intersect_any(&self, ray: &Ray) -> bool {
        self.accel.trace_any(ray)
    }

    fn interaction(&self, bindless: &BindlessArray, hit: &Hit, ray: &Ray) -> Interaction {
        let bary = Vec3::new(
            1.0 - hit.bary.x - hit.bary.y,
            hit.bary.x,
            hit.bary.y,
        );
        let mut it =
            self.shading_point(bindless, hit.instance_id, hit.triangle_id, bary, ray.origin);
        it.ray_t = hit.t;
        it
    }

    /// Computes the interaction at barycentric coordinates on a
    /// triangle. `query_point` is where the surface is observed from and
    /// orients the back-facing flag.
    #[must_use]
    pub fn shading_point(
        &self,
        bindless: &BindlessArray,
        instance_id: u32,
        triangle_id: u32,
        bary: Vec3,
        query_point: Vec3,
    ) -> Interaction {
        let handle = self.instances[instance_id as usize];
        let record = self.mesh_records[instance_id as usize];
        let vertices: &[Vertex] =
            bindless.buffer(record.buffer_base + InstanceHandle::VERTEX_SLOT);
        let triangles: &[Triangle] =
            bindless.buffer(record.buffer_base + InstanceHandle::TRIANGLE_SLOT);
        let tri = triangles[triangle_id as usize];
        let (v0, v1, v2) = (
            vertices[tri.i0 as usize],
            vertices[tri.i1 as usize],
            vertices[tri.i2 as usize],
        );

        let m = self.instance_to_world[instance_id as usize];
        let nm = Mat3::from_mat4(m).inverse().transpose();
        let p0 = m.transform_point3(v0.position());
        let p1 = m.transform_point3(v1.position());
        let p2 = m.transform_point3(v2.position());

        let pg = p0 * bary.x + p1 * bary.y + p2 * bary.z;
        let cross = (p1 - p0).cross(p2 - p0);
        let prim_area = 0.5 * cross.length();
        let ng = cross.normalize_or(Vec3::Z);

        let flags = handle.flags();
        let (n0, n1, n2) = (
            (nm * v0.normal()).normalize_or(ng),
            (nm * v1.normal()).normalize_or(ng),
            (nm * v2.normal()).normalize_or(ng),
        );
        let ns = if flags.contains(InstanceFlags::HAS_VERTEX_NORMAL) {
            (n0 * bary.x + n1 * bary.y + n2 * bary.z).normalize_or(ng)
        } else {
            ng
        };
        let uv = if flags.contains(InstanceFlags::HAS_VERTEX_UV) {
            v0.uv() * bary.x + v1.uv() * bary.y + v2.uv() * bary.z
        } else {
            Vec2::new(bary.y, bary.z)
        };

        // Shadow-terminator treatment: pull the shading position onto
        // the tangent planes of the vertex normals.
        let terminator = handle.shadow_terminator();
        let ps = if terminator > 0.0 && flags.contains(InstanceFlags::HAS_VERTEX_NORMAL) {
            let offset0 = p0 + (pg - p0).reject_from_normalized(n0) - pg;
            let offset1 = p1 + (pg - p1).reject_from_normalized(n1) - pg;
            let offset2 = p2 + (pg - p2).reject_from_normalized(n2) - pg;
            pg + terminator * (offset0 * bary.x + offset1 * bary.y + offset2 * bary.z)
        } else {
            pg
        };

        Interaction {
            instance_id,
            triangle_id,
            handle,
            pg,
            ng,
            ps,
            uv,
            shading: Frame::from_normal(ns),
            prim_area,
            ray_t: 0.0,
            back_facing: ng.dot(query_point - pg) < 0.0,
        }
    }
}

/// Accumulates mesh uploads and instance records during the shape
/// traversal of pipeline build.
pub(crate) struct GeometryBuilder {
    pub accel: Accel,
    pub pending: Vec<PendingInstance>,
    mesh_cache: rustc_hash::FxHashMap<usize, MeshRecord>,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self {
            accel: Accel::new(),
            pending: Vec::new(),
            mesh_cache: rustc_hash::FxHashMap::default(),
        }
    }

    /// Walks a shape subtree, expanding groups into transformed mesh
    /// instances. Surface and light assignments are inherited unless
    /// overridden by a descendant.
    pub fn process(
        &mut self,
        bindless: &mut BindlessArray,
        arena: &mut crate::pipeline::BufferArena,
        shape: &Arc<dyn Shape>,
        inherited_surface: Option<&Arc<dyn Surface>>,
        inherited_light: Option<&Arc<dyn Light>>,
        chain: &[Arc<dyn Transform>],
    ) -> Result<()> {
        let surface = shape.surface().or(inherited_surface).cloned();
        let light = shape.light().or(inherited_light).cloned();
        let mut chain = chain.to_vec();
        if let Some(transform) = shape.transform() {
            chain.push(transform.clone());
        }

        if shape.is_mesh() {
            let mesh = shape.mesh().ok_or_else(|| {
                PrismError::schema_unlocated("mesh shape returned no geometry")
            })?;
            if mesh.vertices.is_empty() || mesh.triangles.is_empty() {
                return Err(PrismError::schema_unlocated("found mesh without vertices"));
            }
            let key = Arc::as_ptr(shape).cast::<()>() as usize;
            let record = match self.mesh_cache.get(&key) {
                Some(record) => *record,
                None => {
                    let record = self.upload_mesh(bindless, arena, mesh)?;
                    self.mesh_cache.insert(key, record);
                    record
                }
            };
            self.pending.push(PendingInstance {
                mesh: record,
                chain,
                surface,
                light,
                vertex_flags: shape.vertex_properties(),
                shadow_terminator: shape.shadow_terminator_factor(),
                intersection_offset: shape.intersection_offset_factor(),
            });
            return Ok(());
        }

        for child in shape.children() {
            self.process(
                bindless,
                arena,
                child,
                surface.as_ref(),
                light.as_ref(),
                &chain,
            )?;
        }
        Ok(())
    }

    /// Uploads a mesh's four sub-buffers at contiguous bindless slots
    /// and builds its bottom-level structure.
    fn upload_mesh(
        &mut self,
        bindless: &mut BindlessArray,
        arena: &mut crate::pipeline::BufferArena,
        mesh: crate::base::MeshView<'_>,
    ) -> Result<MeshRecord> {
        // Alias table and PDF over object-space triangle areas, for
        // uniform area sampling of emissive instances.
        let areas: Vec<f32> = mesh
            .triangles
            .iter()
            .map(|t| {
                let p0 = mesh.vertices[t.i0 as usize].position();
                let p1 = mesh.vertices[t.i1 as usize].position();
                let p2 = mesh.vertices[t.i2 as usize].position();
                0.5 * (p1 - p0).cross(p2 - p0).length()
            })
            .collect();
        let (alias, pdf) = crate::util::sampling::create_alias_table(&areas);

        let base = arena.allocate(bindless, mesh.vertices)?;
        let triangle_id = arena.allocate(bindless, mesh.triangles)?;
        let alias_id = arena.allocate(bindless, &alias)?;
        let pdf_id = arena.allocate(bindless, &pdf)?;
        debug_assert_eq!(triangle_id, base + InstanceHandle::TRIANGLE_SLOT);
        debug_assert_eq!(alias_id, base + InstanceHandle::ALIAS_SLOT);
        debug_assert_eq!(pdf_id, base + InstanceHandle::PDF_SLOT);

        let blas = self.accel.add_blas(Blas::build(mesh.vertices, mesh.triangles));
        Ok(MeshRecord {
            buffer_base: base,
            blas,
            triangle_count: mesh.triangles.len() as u32,
        })
    }

    /// Creates the geometry core (handles still unpacked) with all
    /// transforms evaluated at `time`, and builds the top level.
    pub fn into_geometry(self, time: f32) -> (Geometry, Vec<PendingInstance>) {
        let mut instance_to_world = Vec::with_capacity(self.pending.len());
        let mut animated = Vec::new();
        let mut tlas = Vec::with_capacity(self.pending.len());
        for (i, pending) in self.pending.iter().enumerate() {
            let matrix = chain_matrix(&pending.chain, time);
            instance_to_world.push(matrix);
            tlas.push(TlasInstance::new(pending.mesh.blas, matrix));
            if pending.chain.iter().any(|t| !t.is_static()) {
                animated.push(AnimatedInstance {
                    instance: i as u32,
                    chain: pending.chain.clone(),
                });
            }
        }
        let mut accel = self.accel;
        accel.build(tlas);
        let mesh_records = self.pending.iter().map(|p| p.mesh).collect();
        (
            Geometry {
                instances: Vec::new(),
                mesh_records,
                instance_to_world,
                accel,
                animated,
                light_instances: Vec::new(),
            },
            self.pending,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_packing_round_trips() {
        let flags = InstanceFlags::HAS_VERTEX_NORMAL
            | InstanceFlags::HAS_SURFACE
            | InstanceFlags::HAS_LIGHT;
        let handle =
            InstanceHandle::pack(12345, flags, 2049, 100, 7, 999_999, 0.25, 1.0).unwrap();
        assert_eq!(handle.buffer_base(), 12345);
        assert_eq!(handle.flags(), flags);
        assert_eq!(handle.surface_tag(), 2049);
        assert_eq!(handle.light_tag(), 100);
        assert_eq!(handle.medium_tag(), 7);
        assert_eq!(handle.triangle_count(), 999_999);
        assert!((handle.shadow_terminator() - 0.25).abs() < 1e-3);
        assert!((handle.intersection_offset() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn handle_packing_rejects_overflow() {
        assert!(InstanceHandle::pack(
            1 << 22,
            InstanceFlags::empty(),
            0,
            0,
            0,
            1,
            0.0,
            1.0
        )
        .is_err());
        assert!(
            InstanceHandle::pack(0, InstanceFlags::empty(), 4096, 0, 0, 1, 0.0, 1.0).is_err()
        );
        assert!(
            InstanceHandle::pack(0, InstanceFlags::empty(), 0, 0, 256, 1, 0.0, 1.0).is_err()
        );
    }
}
