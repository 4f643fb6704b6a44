//! Texture implementations.

mod checker;
mod constant;
mod image_texture;

pub use checker::CheckerTexture;
pub use constant::ConstantTexture;
pub use image_texture::ImageTexture;

pub(crate) use checker::create as create_checker_plugin;
pub(crate) use constant::create as create_constant_plugin;
pub(crate) use image_texture::create as create_image_plugin;
