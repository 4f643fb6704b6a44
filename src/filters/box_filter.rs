use std::sync::Arc;

use glam::Vec2;

use crate::base::{Filter, FilterInstance, FilterSample, NodeRef, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A box reconstruction filter.
pub struct BoxFilter {
    radius: f32,
}

impl BoxFilter {
    #[must_use]
    pub fn new(radius: f32) -> Self {
        Self {
            radius: radius.max(1e-3),
        }
    }
}

impl SceneNode for BoxFilter {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Filter
    }

    fn impl_type(&self) -> &'static str {
        "box"
    }
}

impl Filter for BoxFilter {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn FilterInstance>> {
        Ok(Arc::new(BoxFilterInstance {
            radius: self.radius,
        }))
    }
}

struct BoxFilterInstance {
    radius: f32,
}

impl FilterInstance for BoxFilterInstance {
    fn sample(&self, u: Vec2) -> FilterSample {
        FilterSample {
            offset: (u * 2.0 - Vec2::ONE) * self.radius,
            weight: 1.0,
        }
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let radius = node.f32_prop_or("radius", 0.5)?;
    Ok(NodeRef::Filter(Arc::new(BoxFilter::new(radius))))
}
