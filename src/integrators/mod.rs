//! Integrator implementations.

mod megapath;

pub use megapath::MegakernelPathTracer;

pub(crate) use megapath::create as create_megapath_plugin;
