use std::sync::Arc;

use crate::base::{Light, NodeRef, SceneNode, Shape, ShapeBase, Surface, Transform};
use crate::errors::Result;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A recursive shape grouping child shapes under a common transform,
/// surface, and light. Children inherit the group's assignments unless
/// they carry their own.
pub struct GroupShape {
    base: ShapeBase,
    children: Vec<Arc<dyn Shape>>,
}

impl SceneNode for GroupShape {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Shape
    }

    fn impl_type(&self) -> &'static str {
        "group"
    }
}

impl Shape for GroupShape {
    fn surface(&self) -> Option<&Arc<dyn Surface>> {
        self.base.surface.as_ref()
    }

    fn light(&self) -> Option<&Arc<dyn Light>> {
        self.base.light.as_ref()
    }

    fn transform(&self) -> Option<&Arc<dyn Transform>> {
        self.base.transform.as_ref()
    }

    fn children(&self) -> &[Arc<dyn Shape>] {
        &self.children
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
    let children = node
        .node_list("shapes")?
        .into_iter()
        .map(|child| scene.load_shape(child))
        .collect::<Result<Vec<_>>>()?;
    Ok(NodeRef::Shape(Arc::new(GroupShape { base, children })))
}
