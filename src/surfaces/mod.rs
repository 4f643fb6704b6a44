//! Surface (material) implementations.

mod glass;
mod matte;
mod mirror;
mod mix;

pub use glass::GlassSurface;
pub use matte::MatteSurface;
pub use mirror::MirrorSurface;
pub use mix::MixSurface;

pub(crate) use glass::create as create_glass_plugin;
pub(crate) use matte::create as create_matte_plugin;
pub(crate) use mirror::create as create_mirror_plugin;
pub(crate) use mix::create as create_mix_plugin;
