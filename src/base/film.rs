use std::path::Path;
use std::sync::Arc;

use glam::{UVec2, Vec3, Vec4};

use crate::base::SceneNode;
use crate::errors::Result;
use crate::pipeline::Pipeline;

/// The film scene node: resolution, firefly clamp, and exposure.
pub trait Film: SceneNode {
    fn resolution(&self) -> UVec2;

    /// Firefly clamp threshold applied before accumulation.
    fn clamp(&self) -> f32;

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn FilmInstance>>;
}

/// The device-facing film: a passive output sink of atomically updated
/// `(sum.x, sum.y, sum.z, weight)` pixel slots. It never reads back into
/// the integrator.
pub trait FilmInstance: Send + Sync {
    fn resolution(&self) -> UVec2;

    /// Zeroes every pixel slot.
    fn clear(&self);

    /// Atomically adds a weighted sample. NaN radiance is dropped here;
    /// values are clamped by the firefly threshold relative to their
    /// luminance before the add.
    fn accumulate(&self, pixel: UVec2, rgb: Vec3, effective_spp: f32);

    /// Resolves pixels to `sum / weight` in row-major order.
    fn develop(&self) -> Vec<Vec4>;

    /// Writes the image; the format is inferred from the extension
    /// (`.exr` linear, LDR formats tone-mapped and gamma-encoded).
    fn save(&self, path: &Path) -> Result<()>;
}
