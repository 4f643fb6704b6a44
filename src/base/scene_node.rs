use std::sync::Arc;

use crate::base::{
    Camera, Environment, Film, Filter, Integrator, Light, LightSampler, Sampler, Shape, Surface,
    Texture, Transform,
};
use crate::sdl::SceneNodeTag;
use crate::spectrum::Spectrum;

/// Common behavior of every typed scene node.
pub trait SceneNode: Send + Sync {
    /// The node's category; fixed for the life of the node.
    fn tag(&self) -> SceneNodeTag;

    /// The implementation name the plug-in loader resolved.
    fn impl_type(&self) -> &'static str;
}

/// A typed reference to a constructed scene node.
///
/// Plug-in constructors return this tagged form so callers can demand
/// the category they expect; a mismatch is a schema error at load time.
#[derive(Clone)]
pub enum NodeRef {
    Camera(Arc<dyn Camera>),
    Film(Arc<dyn Film>),
    Filter(Arc<dyn Filter>),
    Sampler(Arc<dyn Sampler>),
    Integrator(Arc<dyn Integrator>),
    Shape(Arc<dyn Shape>),
    Surface(Arc<dyn Surface>),
    Light(Arc<dyn Light>),
    LightSampler(Arc<dyn LightSampler>),
    Transform(Arc<dyn Transform>),
    Texture(Arc<dyn Texture>),
    Environment(Arc<dyn Environment>),
    Spectrum(Arc<dyn Spectrum>),
}

impl NodeRef {
    #[must_use]
    pub fn as_scene_node(&self) -> &dyn SceneNode {
        match self {
            NodeRef::Camera(n) => n.as_ref(),
            NodeRef::Film(n) => n.as_ref(),
            NodeRef::Filter(n) => n.as_ref(),
            NodeRef::Sampler(n) => n.as_ref(),
            NodeRef::Integrator(n) => n.as_ref(),
            NodeRef::Shape(n) => n.as_ref(),
            NodeRef::Surface(n) => n.as_ref(),
            NodeRef::Light(n) => n.as_ref(),
            NodeRef::LightSampler(n) => n.as_ref(),
            NodeRef::Transform(n) => n.as_ref(),
            NodeRef::Texture(n) => n.as_ref(),
            NodeRef::Environment(n) => n.as_ref(),
            NodeRef::Spectrum(n) => n.as_ref(),
        }
    }

    #[must_use]
    pub fn tag(&self) -> SceneNodeTag {
        self.as_scene_node().tag()
    }

    #[must_use]
    pub fn impl_type(&self) -> &'static str {
        self.as_scene_node().impl_type()
    }
}
