use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::base::{
    Camera, Environment, Film, Filter, Integrator, Light, LightSampler, NodeRef, Sampler, Shape,
    Surface, Texture, Transform,
};
use crate::errors::{PrismError, Result};
use crate::scene::plugin::resolve_plugin;
use crate::sdl::{NodeView, SceneGraph, SceneNodeTag};
use crate::spectrum::{Spectrum, SrgbSpectrum};

/// The typed scene, instantiated from a frozen description graph.
///
/// Global nodes are uniquely keyed by identifier: duplicate loads that
/// agree on `(tag, impl)` return the same instance, disagreement is a
/// schema error. Internal nodes are owned by the scene and never
/// shared. Node instantiation is thread-safe; the maps are guarded by a
/// mutex and construction is idempotent per identifier.
pub struct Scene {
    globals: Mutex<FxHashMap<String, NodeRef>>,
    internals: Mutex<Vec<NodeRef>>,
    config: Option<SceneConfig>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene").finish_non_exhaustive()
    }
}

struct SceneConfig {
    integrator: Arc<dyn Integrator>,
    cameras: Vec<Arc<dyn Camera>>,
    shapes: Vec<Arc<dyn Shape>>,
    environment: Option<Arc<dyn Environment>>,
    spectrum: Arc<dyn Spectrum>,
}

macro_rules! typed_loader {
    ($name:ident, $tag:expr, $variant:ident, $trait:ident) => {
        pub fn $name(&self, node: NodeView<'_>) -> Result<Arc<dyn $trait>> {
            match self.load_node($tag, node)? {
                NodeRef::$variant(n) => Ok(n),
                other => Err(PrismError::schema(
                    format!(
                        "node '{}' resolved to tag '{}', expected '{}'",
                        node.identifier(),
                        other.tag(),
                        $tag
                    ),
                    node.location(),
                )),
            }
        }
    };
}

impl Scene {
    /// Instantiates the typed scene from a frozen description graph.
    /// The graph can be dropped afterwards.
    pub fn create(graph: &SceneGraph) -> Result<Scene> {
        let mut scene = Scene {
            globals: Mutex::new(FxHashMap::default()),
            internals: Mutex::new(Vec::new()),
            config: None,
        };

        let root = graph.root();
        let integrator = scene.load_integrator(root.node_prop("integrator")?)?;
        let cameras = root
            .node_list("cameras")?
            .into_iter()
            .map(|n| scene.load_camera(n))
            .collect::<Result<Vec<_>>>()?;
        let shapes = root
            .node_list_or_empty("shapes")?
            .into_iter()
            .map(|n| scene.load_shape(n))
            .collect::<Result<Vec<_>>>()?;
        let environment = match root.node_prop_or_none("environment")? {
            Some(n) => Some(scene.load_environment(n)?),
            None => None,
        };
        let spectrum = match root.node_prop_or_none("spectrum")? {
            Some(n) => scene.load_spectrum(n)?,
            None => Arc::new(SrgbSpectrum) as Arc<dyn Spectrum>,
        };

        scene.config = Some(SceneConfig {
            integrator,
            cameras,
            shapes,
            environment,
            spectrum,
        });
        Ok(scene)
    }

    fn config(&self) -> &SceneConfig {
        self.config.as_ref().expect("scene is fully constructed")
    }

    #[must_use]
    pub fn integrator(&self) -> &Arc<dyn Integrator> {
        &self.config().integrator
    }

    #[must_use]
    pub fn cameras(&self) -> &[Arc<dyn Camera>] {
        &self.config().cameras
    }

    #[must_use]
    pub fn shapes(&self) -> &[Arc<dyn Shape>] {
        &self.config().shapes
    }

    #[must_use]
    pub fn environment(&self) -> Option<&Arc<dyn Environment>> {
        self.config().environment.as_ref()
    }

    #[must_use]
    pub fn spectrum(&self) -> &Arc<dyn Spectrum> {
        &self.config().spectrum
    }

    /// Loads a node through the plug-in registry.
    ///
    /// Internal nodes adopt the expected tag of the property they
    /// appear in; global nodes must have been declared with it.
    pub fn load_node(&self, expected: SceneNodeTag, node: NodeView<'_>) -> Result<NodeRef> {
        let desc = node.desc();
        if !desc.is_defined() {
            return Err(PrismError::schema(
                format!(
                    "undefined scene description node '{}'",
                    desc.identifier()
                ),
                node.location(),
            ));
        }

        if desc.is_internal() {
            let creator = resolve_plugin(expected, desc.impl_type())?;
            let created = creator(self, node)?;
            if created.tag() != expected {
                return Err(PrismError::Plugin(format!(
                    "plug-in '{}' constructed a '{}' node, expected '{}'",
                    desc.impl_type(),
                    created.tag(),
                    expected
                )));
            }
            self.internals.lock().push(created.clone());
            return Ok(created);
        }

        let tag = desc.tag().expect("global nodes are tagged at freeze");
        if tag != expected {
            return Err(PrismError::schema(
                format!(
                    "invalid tag '{tag}' of scene description node '{}' (expected '{expected}')",
                    desc.identifier()
                ),
                node.location(),
            ));
        }

        if let Some(existing) = self.globals.lock().get(desc.identifier()) {
            if existing.tag() != tag
                || !existing.impl_type().eq_ignore_ascii_case(desc.impl_type())
            {
                return Err(PrismError::schema(
                    format!(
                        "scene node '{}' (type = {}::{}) is already in the graph \
                         (type = {}::{})",
                        desc.identifier(),
                        tag,
                        desc.impl_type(),
                        existing.tag(),
                        existing.impl_type()
                    ),
                    node.location(),
                ));
            }
            return Ok(existing.clone());
        }

        let creator = resolve_plugin(tag, desc.impl_type())?;
        let created = creator(self, node)?;
        if created.tag() != tag {
            return Err(PrismError::Plugin(format!(
                "plug-in '{}' constructed a '{}' node, expected '{}'",
                desc.impl_type(),
                created.tag(),
                tag
            )));
        }
        // A concurrent load may have won the race; keep the first.
        Ok(self
            .globals
            .lock()
            .entry(desc.identifier().to_string())
            .or_insert(created)
            .clone())
    }

    typed_loader!(load_camera, SceneNodeTag::Camera, Camera, Camera);
    typed_loader!(load_film, SceneNodeTag::Film, Film, Film);
    typed_loader!(load_filter, SceneNodeTag::Filter, Filter, Filter);
    typed_loader!(load_sampler, SceneNodeTag::Sampler, Sampler, Sampler);
    typed_loader!(
        load_integrator,
        SceneNodeTag::Integrator,
        Integrator,
        Integrator
    );
    typed_loader!(load_shape, SceneNodeTag::Shape, Shape, Shape);
    typed_loader!(load_surface, SceneNodeTag::Surface, Surface, Surface);
    typed_loader!(load_light, SceneNodeTag::Light, Light, Light);
    typed_loader!(
        load_light_sampler,
        SceneNodeTag::LightSampler,
        LightSampler,
        LightSampler
    );
    typed_loader!(
        load_transform,
        SceneNodeTag::Transform,
        Transform,
        Transform
    );
    typed_loader!(load_texture, SceneNodeTag::Texture, Texture, Texture);
    typed_loader!(
        load_environment,
        SceneNodeTag::Environment,
        Environment,
        Environment
    );
    typed_loader!(load_spectrum, SceneNodeTag::Spectrum, Spectrum, Spectrum);
}
