use std::sync::Arc;

use glam::Vec4;

use crate::base::{Interaction, NodeRef, SceneNode, Texture, TextureInstance};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A UV-space checkerboard alternating between two child textures.
pub struct CheckerTexture {
    on: Arc<dyn Texture>,
    off: Arc<dyn Texture>,
    scale: f32,
}

impl SceneNode for CheckerTexture {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Texture
    }

    fn impl_type(&self) -> &'static str {
        "checker"
    }
}

impl Texture for CheckerTexture {
    fn is_black(&self) -> bool {
        self.on.is_black() && self.off.is_black()
    }

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn TextureInstance>> {
        Ok(Arc::new(CheckerTextureInstance {
            on: self.on.build(pipeline)?,
            off: self.off.build(pipeline)?,
            scale: self.scale,
        }))
    }
}

struct CheckerTextureInstance {
    on: Arc<dyn TextureInstance>,
    off: Arc<dyn TextureInstance>,
    scale: f32,
}

impl TextureInstance for CheckerTextureInstance {
    fn evaluate(&self, pipeline: &Pipeline, it: &Interaction, time: f32) -> Vec4 {
        let uv = it.uv * self.scale;
        let parity = (uv.x.floor() + uv.y.floor()) as i64 & 1;
        if parity == 0 {
            self.on.evaluate(pipeline, it, time)
        } else {
            self.off.evaluate(pipeline, it, time)
        }
    }
}

pub(crate) fn create(scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let on = scene.load_texture(node.node_prop("on")?)?;
    let off = scene.load_texture(node.node_prop("off")?)?;
    let scale = node.f32_prop_or("scale", 1.0)?.max(1e-6);
    Ok(NodeRef::Texture(Arc::new(CheckerTexture {
        on,
        off,
        scale,
    })))
}
