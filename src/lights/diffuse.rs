use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{
    Interaction, Light, LightEval, LightInstance, NodeRef, SceneNode, TextureInstance,
};
use crate::compute::{Triangle, Vertex};
use crate::errors::Result;
use crate::pipeline::{InstanceHandle, Pipeline};
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::SampledWavelengths;
use crate::util::sampling::{sample_alias_table, sample_uniform_triangle, AliasEntry};

/// A diffuse area emitter over the triangles of its instance.
///
/// Surface points are sampled uniformly by area through the per-mesh
/// alias table; the reported PDF is per solid angle as seen from the
/// query point.
pub struct DiffuseLight {
    emission: Arc<dyn crate::base::Texture>,
    scale: f32,
    two_sided: bool,
}

impl SceneNode for DiffuseLight {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Light
    }

    fn impl_type(&self) -> &'static str {
        "diffuse"
    }
}

impl Light for DiffuseLight {
    fn build(&self, pipeline: &mut Pipeline, instance_id: u32) -> Result<Arc<dyn LightInstance>> {
        let emission = self.emission.build(pipeline)?;
        // Total emissive area in world space, with the instance
        // transform applied at the pipeline's reference time.
        let record = pipeline.geometry().mesh_record(instance_id);
        let matrix = pipeline.geometry().instance_to_world(instance_id);
        let vertices: &[Vertex] = pipeline
            .bindless()
            .buffer(record.buffer_base + InstanceHandle::VERTEX_SLOT);
        let triangles: &[Triangle] = pipeline
            .bindless()
            .buffer(record.buffer_base + InstanceHandle::TRIANGLE_SLOT);
        let area: f64 = triangles
            .iter()
            .map(|t| {
                let p0 = matrix.transform_point3(vertices[t.i0 as usize].position());
                let p1 = matrix.transform_point3(vertices[t.i1 as usize].position());
                let p2 = matrix.transform_point3(vertices[t.i2 as usize].position());
                f64::from(0.5 * (p1 - p0).cross(p2 - p0).length())
            })
            .sum();
        Ok(Arc::new(DiffuseLightInstance {
            instance_id,
            emission,
            scale: self.scale,
            two_sided: self.two_sided,
            inv_area: if area > 0.0 { (1.0 / area) as f32 } else { 0.0 },
        }))
    }
}

struct DiffuseLightInstance {
    instance_id: u32,
    emission: Arc<dyn TextureInstance>,
    scale: f32,
    two_sided: bool,
    inv_area: f32,
}

impl LightInstance for DiffuseLightInstance {
    fn instance_id(&self) -> u32 {
        self.instance_id
    }

    fn evaluate(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        p_from: Vec3,
        swl: &SampledWavelengths,
        time: f32,
    ) -> LightEval {
        let to_query = p_from - it.pg;
        let front = it.ng.dot(to_query) > 0.0;
        if !front && !self.two_sided {
            return LightEval::zero(swl.dimension());
        }
        let distance_squared = to_query.length_squared();
        let cos_light = it.ng.dot(to_query.normalize_or(it.ng)).abs();
        if distance_squared <= 0.0 || cos_light <= 1e-6 || self.inv_area <= 0.0 {
            return LightEval::zero(swl.dimension());
        }
        let decode = self
            .emission
            .evaluate_illuminant_spectrum(pipeline, it, swl, time);
        LightEval {
            l: &decode.value * self.scale,
            pdf: distance_squared * self.inv_area / cos_light,
        }
    }

    fn sample(
        &self,
        pipeline: &Pipeline,
        p_from: Vec3,
        u: Vec2,
        swl: &SampledWavelengths,
        time: f32,
    ) -> (LightEval, Vec3) {
        let geometry = pipeline.geometry();
        let record = geometry.mesh_record(self.instance_id);
        let alias: &[AliasEntry] = pipeline
            .bindless()
            .buffer(record.buffer_base + InstanceHandle::ALIAS_SLOT);
        let (triangle, ux) = sample_alias_table(alias, u.x);
        let bary = sample_uniform_triangle(Vec2::new(ux, u.y));
        let it = geometry.shading_point(
            pipeline.bindless(),
            self.instance_id,
            triangle as u32,
            bary,
            p_from,
        );
        let eval = self.evaluate(pipeline, &it, p_from, swl, time);
        (eval, it.pg)
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let emission = scene.load_texture(node.node_prop("emission")?)?;
    let scale = node.f32_prop_or("scale", 1.0)?.max(0.0);
    let two_sided = node.bool_prop_or("two_sided", false)?;
    Ok(NodeRef::Light(Arc::new(DiffuseLight {
        emission,
        scale,
        two_sided,
    })))
}
