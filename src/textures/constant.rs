use std::sync::Arc;

use glam::Vec4;

use crate::base::{Interaction, NodeRef, SceneNode, Texture, TextureInstance};
use crate::errors::{PrismError, Result};
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A texture evaluating to one constant value everywhere.
pub struct ConstantTexture {
    value: Vec4,
}

impl ConstantTexture {
    #[must_use]
    pub fn new(value: Vec4) -> Self {
        Self { value }
    }
}

impl SceneNode for ConstantTexture {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Texture
    }

    fn impl_type(&self) -> &'static str {
        "constant"
    }
}

impl Texture for ConstantTexture {
    fn is_constant(&self) -> bool {
        true
    }

    fn is_black(&self) -> bool {
        self.value.truncate() == glam::Vec3::ZERO
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn TextureInstance>> {
        Ok(Arc::new(ConstantTextureInstance { value: self.value }))
    }
}

struct ConstantTextureInstance {
    value: Vec4,
}

impl TextureInstance for ConstantTextureInstance {
    fn evaluate(&self, _pipeline: &Pipeline, _it: &Interaction, _time: f32) -> Vec4 {
        self.value
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let numbers = node.number_list("v")?;
    let value = match numbers.len() {
        1 => Vec4::new(numbers[0] as f32, numbers[0] as f32, numbers[0] as f32, 1.0),
        2 => Vec4::new(numbers[0] as f32, numbers[1] as f32, 0.0, 1.0),
        3 => Vec4::new(
            numbers[0] as f32,
            numbers[1] as f32,
            numbers[2] as f32,
            1.0,
        ),
        4 => Vec4::new(
            numbers[0] as f32,
            numbers[1] as f32,
            numbers[2] as f32,
            numbers[3] as f32,
        ),
        n => {
            return Err(PrismError::schema(
                format!("constant texture expects 1-4 channels, got {n}"),
                node.location(),
            ));
        }
    };
    Ok(NodeRef::Texture(Arc::new(ConstantTexture::new(value))))
}
