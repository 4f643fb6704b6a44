//! Light sampler implementations.

mod uniform;

pub use uniform::UniformLightSampler;

pub(crate) use uniform::create as create_uniform_plugin;
