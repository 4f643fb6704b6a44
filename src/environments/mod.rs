//! Environment implementations.

mod constant;
mod spherical;

pub use constant::ConstantEnvironment;
pub use spherical::SphericalEnvironment;

pub(crate) use constant::create as create_constant_plugin;
pub(crate) use spherical::create as create_spherical_plugin;
