//! Camera implementations.

mod pinhole;
mod thinlens;

pub use pinhole::PinholeCamera;
pub use thinlens::ThinLensCamera;

pub(crate) use pinhole::create as create_pinhole_plugin;
pub(crate) use thinlens::create as create_thinlens_plugin;
