#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

//! Prism — a physically-based, spectrally-aware path tracing core.
//!
//! Scenes are described in a declarative, typed, cross-referencing
//! object graph ([`sdl`]), resolved into plug-in-backed typed nodes
//! ([`scene`]), and assembled into a frozen render pipeline
//! ([`pipeline`]) of device resources: a bindless table, bottom/top
//! level acceleration structures, packed per-instance records, and
//! polymorphic material/light dispatch tables. The progressive
//! megakernel integrator ([`integrators`]) loops rays through
//! intersection, multiple-importance-sampled direct lighting, BSDF
//! continuation, and Russian roulette, accumulating into atomic films.

pub mod base;
pub mod cameras;
pub mod compute;
pub mod environments;
pub mod errors;
pub mod films;
pub mod filters;
pub mod integrators;
pub mod lights;
pub mod lightsamplers;
pub mod pipeline;
pub mod samplers;
pub mod scene;
pub mod sdl;
pub mod shapes;
pub mod spectrum;
pub mod surfaces;
pub mod textures;
pub mod transforms;
pub mod util;

pub use errors::{PrismError, Result};
pub use pipeline::Pipeline;
pub use scene::Scene;
pub use sdl::{MacroMap, SceneDesc, SceneGraph, SceneParser};
pub use spectrum::{SampledSpectrum, SampledWavelengths};

/// Parses a scene file, instantiates it, and assembles the pipeline.
pub fn load_pipeline(path: &std::path::Path, macros: &MacroMap) -> Result<Pipeline> {
    let graph = SceneParser::parse(path, macros)?;
    let scene = Scene::create(&graph)?;
    Pipeline::create(&scene)
}
