use std::sync::Arc;

use glam::Vec2;

use crate::base::SceneNode;
use crate::errors::Result;
use crate::pipeline::Pipeline;

/// The pixel reconstruction filter node.
pub trait Filter: SceneNode {
    /// Filter radius in pixels.
    fn radius(&self) -> f32;

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn FilterInstance>>;
}

/// A filter importance sample: a subpixel offset and its weight
/// (unity for filters sampled exactly proportional to their kernel).
#[derive(Debug, Clone, Copy)]
pub struct FilterSample {
    pub offset: Vec2,
    pub weight: f32,
}

pub trait FilterInstance: Send + Sync {
    /// Importance-samples the filter kernel from a unit square sample.
    fn sample(&self, u: Vec2) -> FilterSample;
}
