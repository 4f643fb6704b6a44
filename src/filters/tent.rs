use std::sync::Arc;

use glam::Vec2;

use crate::base::{Filter, FilterInstance, FilterSample, NodeRef, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A triangle (tent) reconstruction filter, importance-sampled exactly,
/// so sample weights stay at one.
pub struct TentFilter {
    radius: f32,
}

impl SceneNode for TentFilter {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Filter
    }

    fn impl_type(&self) -> &'static str {
        "tent"
    }
}

impl Filter for TentFilter {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn FilterInstance>> {
        Ok(Arc::new(TentFilterInstance {
            radius: self.radius,
        }))
    }
}

struct TentFilterInstance {
    radius: f32,
}

fn sample_tent(u: f32, radius: f32) -> f32 {
    if u < 0.5 {
        radius * ((2.0 * u).sqrt() - 1.0)
    } else {
        radius * (1.0 - (2.0 - 2.0 * u).sqrt())
    }
}

impl FilterInstance for TentFilterInstance {
    fn sample(&self, u: Vec2) -> FilterSample {
        FilterSample {
            offset: Vec2::new(sample_tent(u.x, self.radius), sample_tent(u.y, self.radius)),
            weight: 1.0,
        }
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let radius = node.f32_prop_or("radius", 1.0)?.max(1e-3);
    Ok(NodeRef::Filter(Arc::new(TentFilter { radius })))
}
