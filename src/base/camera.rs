use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec2;

use crate::base::{Film, Filter, SamplerInstance, SamplerState, SceneNode, Transform};
use crate::compute::Ray;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::NodeView;

/// The camera scene node.
pub trait Camera: SceneNode {
    fn film(&self) -> &Arc<dyn Film>;

    fn filter(&self) -> Option<&Arc<dyn Filter>>;

    fn transform(&self) -> Option<&Arc<dyn Transform>>;

    /// Samples per pixel requested for this camera.
    fn spp(&self) -> u32;

    /// Output image path.
    fn file(&self) -> &Path;

    /// Shutter open/close times.
    fn time_span(&self) -> (f32, f32);

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn CameraInstance>>;
}

/// The device-facing camera: primary ray generation.
pub trait CameraInstance: Send + Sync {
    /// Generates a camera ray through `pixel` (filter offset already
    /// applied) at `time`, drawing lens samples from the sampler if the
    /// camera model requires them. Returns the ray and its weight.
    fn generate_ray(
        &self,
        sampler: &dyn SamplerInstance,
        state: &mut SamplerState,
        pixel: Vec2,
        time: f32,
    ) -> (Ray, f32);
}

/// Properties shared by every camera implementation, loaded once from
/// the description node.
pub struct CameraBase {
    pub film: Arc<dyn Film>,
    pub filter: Option<Arc<dyn Filter>>,
    pub transform: Option<Arc<dyn Transform>>,
    pub spp: u32,
    pub file: PathBuf,
    pub time_span: (f32, f32),
}

impl CameraBase {
    pub fn load(scene: &Scene, node: NodeView<'_>) -> Result<Self> {
        let film = scene.load_film(node.node_prop("film")?)?;
        let filter = match node.node_prop_or_none("filter")? {
            Some(n) => Some(scene.load_filter(n)?),
            None => None,
        };
        let transform = match node.node_prop_or_none("transform")? {
            Some(n) => Some(scene.load_transform(n)?),
            None => None,
        };
        let spp = node.u32_prop_or("spp", 1024)?.max(1);
        let file = PathBuf::from(node.string_prop_or("file", "render.exr")?);
        let span = node.lookup("time_span").map_or(Ok::<(f32, f32), crate::errors::PrismError>((0.0, 0.0)), |_| {
            let v = node.vec2_prop("time_span")?;
            Ok((v.x, v.y))
        })?;
        Ok(Self {
            film,
            filter,
            transform,
            spp,
            file,
            time_span: span,
        })
    }
}
