use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::base::{Interaction, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::spectrum::{SampledSpectrum, SampledWavelengths};

/// The surface (material) scene node.
pub trait Surface: SceneNode {
    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SurfaceInstance>>;
}

/// The device-facing surface: opens a closure at a shading point.
pub trait SurfaceInstance: Send + Sync {
    /// Evaluates material parameters (texture lookups) at the
    /// interaction and captures them in a closure; the closure performs
    /// no further lookups.
    fn closure<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> Box<dyn SurfaceClosure + 'a>;
}

/// Which lobe kind a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobeEvent {
    Reflect,
    Transmit,
    Null,
}

/// A BSDF evaluation.
///
/// Delta lobes report `pdf = +INFINITY` with `f` scaled so that
/// `f * |cos theta_i|` is the throughput multiplier; the balance
/// heuristic collapses accordingly.
#[derive(Debug, Clone)]
pub struct SurfaceEval {
    pub f: SampledSpectrum,
    pub pdf: f32,
}

/// A BSDF sample: the incident direction, its evaluation, and the lobe
/// event it came from.
#[derive(Debug, Clone)]
pub struct SurfaceSample {
    pub wi: Vec3,
    pub eval: SurfaceEval,
    pub event: LobeEvent,
}

/// A material closure at one shading point.
///
/// Directions are world-space; implementations convert through the
/// interaction's shading frame they captured at construction.
pub trait SurfaceClosure {
    /// Evaluates the BSDF and its sampling PDF for `(wo, wi)`.
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> SurfaceEval;

    /// Samples an incident direction. `u_lobe` selects between lobes,
    /// `u` warps within the selected lobe.
    fn sample(&self, wo: Vec3, u_lobe: f32, u: Vec2) -> SurfaceSample;

    /// Stochastic alpha cut-out opacity; `None` means fully opaque.
    fn opacity(&self) -> Option<f32> {
        None
    }

    /// True if sampling this closure separates wavelengths, triggering
    /// secondary termination of the wavelength bundle.
    fn is_dispersive(&self) -> bool {
        false
    }

    /// Relative index of refraction for transmissive closures.
    fn eta(&self) -> Option<f32> {
        None
    }
}
