//! Light implementations.

mod diffuse;

pub use diffuse::DiffuseLight;

pub(crate) use diffuse::create as create_diffuse_plugin;
