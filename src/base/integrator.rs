use std::sync::Arc;

use crate::base::{LightSampler, Sampler, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;

/// The integrator scene node. It owns the sampler and light sampler
/// selections for the render.
pub trait Integrator: SceneNode {
    fn sampler(&self) -> &Arc<dyn Sampler>;

    fn light_sampler(&self) -> &Arc<dyn LightSampler>;

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn IntegratorInstance>>;
}

/// A compiled integrator: renders every camera of the pipeline and
/// saves their films.
pub trait IntegratorInstance: Send + Sync {
    fn render(&self, pipeline: &mut Pipeline) -> Result<()>;
}
