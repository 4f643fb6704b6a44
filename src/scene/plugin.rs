//! The plug-in registry.
//!
//! A `(tag, impl)` pair resolves to a constructor through the
//! process-wide module table, keyed by `lower("prism-<tag>-<impl>")`.
//! The table is initialized lazily under a lock and each module is
//! registered at most once; resolution failures surface as plug-in
//! errors with the offending module name.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::base::NodeRef;
use crate::errors::{PrismError, Result};
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};

/// A plug-in entry point: constructs a typed node from its description.
pub type NodeCreator = fn(&Scene, NodeView<'_>) -> Result<NodeRef>;

/// The module name a `(tag, impl)` pair resolves through.
#[must_use]
pub fn plugin_name(tag: SceneNodeTag, impl_type: &str) -> String {
    format!("prism-{}-{}", tag.description(), impl_type).to_lowercase()
}

fn registry() -> &'static FxHashMap<&'static str, NodeCreator> {
    static REGISTRY: OnceLock<FxHashMap<&'static str, NodeCreator>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let modules: &[(&'static str, NodeCreator)] = &[
            // Cameras
            ("prism-camera-pinhole", crate::cameras::create_pinhole_plugin),
            ("prism-camera-thinlens", crate::cameras::create_thinlens_plugin),
            // Films
            ("prism-film-rgb", crate::films::create_rgb_plugin),
            // Filters
            ("prism-filter-box", crate::filters::create_box_plugin),
            ("prism-filter-tent", crate::filters::create_tent_plugin),
            // Samplers
            (
                "prism-sampler-independent",
                crate::samplers::create_independent_plugin,
            ),
            ("prism-sampler-sobol", crate::samplers::create_sobol_plugin),
            ("prism-sampler-pmj02bn", crate::samplers::create_pmj02bn_plugin),
            // Integrators
            (
                "prism-integrator-megapath",
                crate::integrators::create_megapath_plugin,
            ),
            // Light samplers
            (
                "prism-lightsampler-uniform",
                crate::lightsamplers::create_uniform_plugin,
            ),
            // Shapes
            ("prism-shape-mesh", crate::shapes::create_mesh_plugin),
            ("prism-shape-sphere", crate::shapes::create_sphere_plugin),
            ("prism-shape-group", crate::shapes::create_group_plugin),
            // Surfaces
            ("prism-surface-matte", crate::surfaces::create_matte_plugin),
            ("prism-surface-mirror", crate::surfaces::create_mirror_plugin),
            ("prism-surface-glass", crate::surfaces::create_glass_plugin),
            ("prism-surface-mix", crate::surfaces::create_mix_plugin),
            // Lights
            ("prism-light-diffuse", crate::lights::create_diffuse_plugin),
            // Environments
            (
                "prism-environment-constant",
                crate::environments::create_constant_plugin,
            ),
            (
                "prism-environment-spherical",
                crate::environments::create_spherical_plugin,
            ),
            // Textures
            ("prism-texture-constant", crate::textures::create_constant_plugin),
            ("prism-texture-checker", crate::textures::create_checker_plugin),
            ("prism-texture-image", crate::textures::create_image_plugin),
            // Transforms
            ("prism-transform-matrix", crate::transforms::create_matrix_plugin),
            ("prism-transform-lerp", crate::transforms::create_lerp_plugin),
            // Spectra
            ("prism-spectrum-srgb", crate::spectrum::create_srgb_plugin),
            ("prism-spectrum-hero", crate::spectrum::create_hero_plugin),
            ("prism-spectrum-uniform", crate::spectrum::create_uniform_plugin),
        ];
        modules.iter().copied().collect()
    })
}

/// Resolves a `(tag, impl)` pair to its constructor.
pub fn resolve_plugin(tag: SceneNodeTag, impl_type: &str) -> Result<NodeCreator> {
    let name = plugin_name(tag, impl_type);
    registry().get(name.as_str()).copied().ok_or_else(|| {
        PrismError::Plugin(format!("scene plug-in module '{name}' was not found"))
    })
}
