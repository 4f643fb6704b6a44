//! Render pipeline assembly.
//!
//! Translates the typed scene into device resources: the bindless table,
//! arena-packed geometry buffers, bottom/top-level acceleration
//! structures, per-instance packed records, polymorphic surface/light
//! dispatch tables, and the compiled integrator. After
//! [`Pipeline::create`] returns, every resource is frozen; the only
//! mutable state between frames is the transform matrix table (rewritten
//! wholesale by the host, followed by a refit) and the sampler state
//! buffer.

mod arena;
mod geometry;
mod polymorphic;

use std::path::PathBuf;
use std::sync::Arc;

use glam::UVec2;
use rustc_hash::FxHashMap;

use crate::base::{
    CameraInstance, EnvironmentInstance, FilmInstance, FilterInstance, Interaction,
    IntegratorInstance, LightInstance, LightSamplerInstance, SamplerInstance, SurfaceInstance,
};
use crate::compute::{BindlessArray, Ray};
use crate::errors::{PrismError, Result};
use crate::scene::Scene;
use crate::spectrum::SpectrumInstance;

pub use arena::{BufferArena, ARENA_ALLOCATION_THRESHOLD, ARENA_BLOCK_SIZE};
pub use geometry::{Geometry, InstanceFlags, InstanceHandle, MeshRecord};
pub use polymorphic::Polymorphic;

pub(crate) use geometry::GeometryBuilder;

/// One camera of the render with its film and filter instances.
pub struct CameraItem {
    pub camera: Arc<dyn CameraInstance>,
    pub film: Arc<dyn FilmInstance>,
    pub filter: Option<Arc<dyn FilterInstance>>,
    pub spp: u32,
    pub file: PathBuf,
    pub time_span: (f32, f32),
    pub resolution: UVec2,
}

/// The assembled render pipeline.
pub struct Pipeline {
    bindless: BindlessArray,
    arena: BufferArena,
    named_ids: FxHashMap<String, u32>,
    spectrum: Option<Arc<dyn SpectrumInstance>>,
    cameras: Vec<CameraItem>,
    geometry: Option<Geometry>,
    surfaces: Polymorphic<dyn SurfaceInstance>,
    lights: Polymorphic<dyn LightInstance>,
    environment: Option<Arc<dyn EnvironmentInstance>>,
    light_sampler: Option<Arc<dyn LightSamplerInstance>>,
    sampler: Option<Box<dyn SamplerInstance>>,
    integrator: Option<Arc<dyn IntegratorInstance>>,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            bindless: BindlessArray::new(),
            arena: BufferArena::new(),
            named_ids: FxHashMap::default(),
            spectrum: None,
            cameras: Vec::new(),
            geometry: None,
            surfaces: Polymorphic::new("surface", InstanceHandle::MAX_SURFACE_TAGS),
            lights: Polymorphic::new("light", InstanceHandle::MAX_LIGHT_TAGS),
            environment: None,
            light_sampler: None,
            sampler: None,
            integrator: None,
        }
    }

    /// Builds the full pipeline from a typed scene. The scene (and the
    /// description graph it came from) can be dropped afterwards; the
    /// pipeline holds everything the render needs.
    pub fn create(scene: &Scene) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new();

        let spectrum = scene.spectrum().build(&mut pipeline)?;
        pipeline.spectrum = Some(spectrum);

        // Cameras, films, and filters.
        let mut mean_time = 0.0f64;
        for camera in scene.cameras() {
            let instance = camera.build(&mut pipeline)?;
            let film = camera.film().build(&mut pipeline)?;
            let filter = match camera.filter() {
                Some(f) => Some(f.build(&mut pipeline)?),
                None => None,
            };
            let span = camera.time_span();
            mean_time += f64::from(span.0 + span.1) * 0.5;
            pipeline.cameras.push(CameraItem {
                camera: instance,
                film,
                filter,
                spp: camera.spp(),
                file: camera.file().to_path_buf(),
                time_span: span,
                resolution: camera.film().resolution(),
            });
        }
        if pipeline.cameras.is_empty() {
            return Err(PrismError::schema_unlocated(
                "scene defines no cameras to render",
            ));
        }
        let mean_time = (mean_time / pipeline.cameras.len() as f64) as f32;

        // Geometry: walk shapes, upload meshes, gather instances.
        let mut builder = GeometryBuilder::new();
        for shape in scene.shapes() {
            builder.process(
                &mut pipeline.bindless,
                &mut pipeline.arena,
                shape,
                None,
                None,
                &[],
            )?;
        }
        let (geometry, pending) = builder.into_geometry(mean_time);
        log::info!("Built geometry with {} instance(s).", pending.len());
        pipeline.geometry = Some(geometry);

        // Surface and light dispatch tables, then the packed handles.
        let mut handles = Vec::with_capacity(pending.len());
        let mut light_instances = Vec::new();
        for (i, item) in pending.iter().enumerate() {
            let mut flags = item.vertex_flags;
            let mut surface_tag = 0;
            if let Some(surface) = &item.surface {
                let key = Arc::as_ptr(surface).cast::<()>() as usize;
                surface_tag = match pipeline.surfaces.tag_for(key) {
                    Some(tag) => tag,
                    None => {
                        let instance = surface.build(&mut pipeline)?;
                        pipeline.surfaces.insert(key, instance)?
                    }
                };
                flags |= InstanceFlags::HAS_SURFACE;
            }
            let mut light_tag = 0;
            if let Some(light) = &item.light {
                let instance = light.build(&mut pipeline, i as u32)?;
                light_tag = pipeline.lights.push(instance)?;
                light_instances.push(i as u32);
                flags |= InstanceFlags::HAS_LIGHT;
            }
            handles.push(InstanceHandle::pack(
                item.mesh.buffer_base,
                flags,
                surface_tag,
                light_tag,
                0,
                item.mesh.triangle_count,
                item.shadow_terminator,
                item.intersection_offset,
            )?);
        }
        {
            let geometry = pipeline.geometry.as_mut().expect("geometry was just built");
            geometry.instances = handles;
            geometry.light_instances = light_instances;
        }

        // Environment, light sampler, sampler, integrator.
        if let Some(environment) = scene.environment() {
            if environment.is_black() {
                log::warn!("Scene environment is black; skipping it.");
            } else {
                pipeline.environment = Some(environment.build(&mut pipeline)?);
            }
        }
        let integrator = scene.integrator();
        pipeline.light_sampler = Some(integrator.light_sampler().build(&mut pipeline)?);
        pipeline.sampler = Some(integrator.sampler().build()?);
        pipeline.integrator = Some(integrator.build(&mut pipeline)?);

        log::info!(
            "Pipeline ready: {} bindless slot(s), {} surface tag(s), {} light tag(s).",
            pipeline.bindless.len(),
            pipeline.surfaces.len(),
            pipeline.lights.len()
        );
        Ok(pipeline)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    #[must_use]
    pub fn bindless(&self) -> &BindlessArray {
        &self.bindless
    }

    pub fn bindless_mut(&mut self) -> &mut BindlessArray {
        &mut self.bindless
    }

    /// Uploads a small typed buffer through the arena, returning its
    /// bindless id.
    pub fn arena_allocate<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<u32> {
        self.arena.allocate(&mut self.bindless, data)
    }

    /// Memoizes a named shared resource so it is created exactly once
    /// per pipeline (shared kernels, conversion tables).
    pub fn named_id(
        &mut self,
        name: &str,
        create: impl FnOnce(&mut Self) -> Result<u32>,
    ) -> Result<u32> {
        if let Some(&id) = self.named_ids.get(name) {
            return Ok(id);
        }
        let id = create(self)?;
        self.named_ids.insert(name.to_string(), id);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Scene components
    // ------------------------------------------------------------------

    #[must_use]
    pub fn spectrum(&self) -> &dyn SpectrumInstance {
        self.spectrum
            .as_deref()
            .expect("pipeline spectrum is built first")
    }

    #[must_use]
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    #[must_use]
    pub fn camera(&self, index: usize) -> &CameraItem {
        &self.cameras[index]
    }

    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        self.geometry.as_ref().expect("pipeline geometry is built")
    }

    #[must_use]
    pub fn surfaces(&self) -> &Polymorphic<dyn SurfaceInstance> {
        &self.surfaces
    }

    #[must_use]
    pub fn lights(&self) -> &Polymorphic<dyn LightInstance> {
        &self.lights
    }

    #[must_use]
    pub fn environment(&self) -> Option<&Arc<dyn EnvironmentInstance>> {
        self.environment.as_ref()
    }

    #[must_use]
    pub fn light_sampler(&self) -> Option<&Arc<dyn LightSamplerInstance>> {
        self.light_sampler.as_ref()
    }

    #[must_use]
    pub fn sampler(&self) -> &dyn SamplerInstance {
        self.sampler.as_deref().expect("pipeline sampler is built")
    }

    pub fn sampler_mut(&mut self) -> &mut dyn SamplerInstance {
        self.sampler
            .as_deref_mut()
            .expect("pipeline sampler is built")
    }

    /// True if anything in the scene emits light.
    #[must_use]
    pub fn has_lighting(&self) -> bool {
        !self.lights.is_empty() || self.environment.is_some()
    }

    // ------------------------------------------------------------------
    // Per-frame operations
    // ------------------------------------------------------------------

    /// Rewrites time-varying transforms and refits the acceleration
    /// structure for the given shutter time.
    pub fn update_geometry(&mut self, time: f32) {
        if let Some(geometry) = self.geometry.as_mut() {
            geometry.update(time);
        }
    }

    /// Closest-hit query resolved to a full interaction.
    #[must_use]
    pub fn intersect(&self, ray: &Ray) -> Option<Interaction> {
        self.geometry().intersect(&self.bindless, ray)
    }

    /// Any-hit (shadow) query.
    #[must_use]
    pub fn intersect_any(&self, ray: &Ray) -> bool {
        self.geometry().intersect_any(ray)
    }

    /// Runs the integrator over every camera and saves the films.
    pub fn render(&mut self) -> Result<()> {
        let integrator = self
            .integrator
            .clone()
            .expect("pipeline integrator is built");
        integrator.render(self)
    }
}
