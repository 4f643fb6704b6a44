//! The typed scene: plug-in resolution and node instantiation.

mod plugin;
#[allow(clippy::module_inception)]
mod scene;

pub use plugin::{plugin_name, resolve_plugin, NodeCreator};
pub use scene::Scene;
