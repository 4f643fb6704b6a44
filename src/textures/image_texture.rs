use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec4};

use crate::base::{Interaction, NodeRef, SceneNode, Texture, TextureInstance};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::colorspace::srgb_to_linear;

/// A bilinearly sampled image texture.
///
/// Load failures are not fatal: the texture degrades to a mid-gray
/// placeholder with a warning, so a missing asset never aborts a render.
pub struct ImageTexture {
    path: PathBuf,
    scale: f32,
    uv_scale: Vec2,
}

impl SceneNode for ImageTexture {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Texture
    }

    fn impl_type(&self) -> &'static str {
        "image"
    }
}

const PLACEHOLDER_VALUE: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);

fn load_texels(path: &std::path::Path) -> Result<crate::compute::Tex2d> {
    let image = image::open(path)?;
    let ldr = !matches!(
        image,
        image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_)
    );
    let rgba = image.to_rgba32f();
    let (w, h) = rgba.dimensions();
    let texels = rgba
        .pixels()
        .map(|p| {
            let decode = |v: f32| if ldr { srgb_to_linear(v) } else { v };
            Vec4::new(decode(p.0[0]), decode(p.0[1]), decode(p.0[2]), p.0[3])
        })
        .collect();
    Ok(crate::compute::Tex2d::new(w, h, texels))
}

impl Texture for ImageTexture {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn TextureInstance>> {
        let texture_id = match load_texels(&self.path) {
            Ok(texels) => Some(pipeline.bindless_mut().register_tex2d(texels)?),
            Err(e) => {
                log::warn!(
                    "Failed to load image texture '{}' ({e}); using a placeholder.",
                    self.path.display()
                );
                None
            }
        };
        Ok(Arc::new(ImageTextureInstance {
            texture_id,
            scale: self.scale,
            uv_scale: self.uv_scale,
        }))
    }
}

struct ImageTextureInstance {
    texture_id: Option<u32>,
    scale: f32,
    uv_scale: Vec2,
}

impl TextureInstance for ImageTextureInstance {
    fn evaluate(&self, pipeline: &Pipeline, it: &Interaction, _time: f32) -> Vec4 {
        match self.texture_id {
            Some(id) => {
                let sampled = pipeline.bindless().tex2d(id).sample(it.uv * self.uv_scale);
                Vec4::new(
                    sampled.x * self.scale,
                    sampled.y * self.scale,
                    sampled.z * self.scale,
                    sampled.w,
                )
            }
            None => PLACEHOLDER_VALUE,
        }
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let path = PathBuf::from(node.string_prop("file")?);
    let scale = node.f32_prop_or("scale", 1.0)?.max(0.0);
    let uv_scale = match node.lookup("uv_scale") {
        Some(_) => node.vec2_prop("uv_scale")?,
        None => Vec2::ONE,
    };
    Ok(NodeRef::Texture(Arc::new(ImageTexture {
        path,
        scale,
        uv_scale,
    })))
}
