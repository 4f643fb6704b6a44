//! Abstract node contracts.
//!
//! Each scene node category is split the same way: a *node* trait for the
//! typed, immutable object the plug-in loader constructs from the
//! description graph, and an *instance* trait for the device-facing
//! object the pipeline builds from it. Instances own their device
//! resources (registered through the pipeline at build time) and are
//! never mutated after the pipeline is built.

mod camera;
mod environment;
mod film;
mod filter;
mod integrator;
mod interaction;
mod light;
mod light_sampler;
mod sampler;
mod scene_node;
mod shape;
mod surface;
mod texture;
mod transform;

pub use camera::{Camera, CameraBase, CameraInstance};
pub use environment::{Environment, EnvironmentInstance, EnvironmentSample};
pub use film::{Film, FilmInstance};
pub use filter::{Filter, FilterInstance, FilterSample};
pub use integrator::{Integrator, IntegratorInstance};
pub use interaction::Interaction;
pub use light::{Light, LightEval, LightInstance};
pub use light_sampler::{
    LightSampler, LightSamplerInstance, LightSamplerSample, LightSelection, SELECTION_ENVIRONMENT,
};
pub use sampler::{Sampler, SamplerInstance, SamplerState};
pub use scene_node::{NodeRef, SceneNode};
pub use shape::{MeshView, Shape, ShapeBase};
pub use surface::{LobeEvent, Surface, SurfaceClosure, SurfaceEval, SurfaceInstance, SurfaceSample};
pub use texture::{Texture, TextureInstance};
pub use transform::Transform;
