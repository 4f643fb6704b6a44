//! The spectral model: sampled-wavelength bundles, per-wavelength
//! arithmetic, CIE projections, RGB decoding, and the spectrum plug-ins.
//!
//! Three variants are provided: `srgb` (fixed, three components tracked
//! directly in RGB), `hero` (four hero wavelengths importance-sampled
//! for the visible range), and `uniform` (four stratified wavelengths
//! uniform over the visible range).

pub mod cie;
mod hero;
mod rgb2spec;
mod sampled;
mod srgb;

use std::sync::Arc;

use glam::Vec3;

use crate::base::SceneNode;
use crate::errors::Result;
use crate::pipeline::Pipeline;

pub use hero::{HeroSpectrum, WavelengthSampling};
pub use rgb2spec::{RgbSigmoidPolynomial, RgbToSpectrumTable, RGB2SPEC_RESOLUTION};
pub use sampled::{
    SampledSpectrum, SampledWavelengths, VISIBLE_WAVELENGTH_MAX, VISIBLE_WAVELENGTH_MIN,
};
pub use srgb::SrgbSpectrum;

pub(crate) use hero::create_hero as create_hero_plugin;
pub(crate) use hero::create_uniform as create_uniform_plugin;
pub(crate) use srgb::create as create_srgb_plugin;

/// A decoded spectrum plus a scalar strength (CIE-Y or luminance) used
/// for MIS and alias-table weighting.
#[derive(Debug, Clone)]
pub struct SpectrumDecode {
    pub value: SampledSpectrum,
    pub strength: f32,
}

/// The spectrum scene node: selects the color model of the render.
pub trait Spectrum: SceneNode {
    /// Number of samples tracked per path.
    fn dimension(&self) -> usize;

    /// True for models with fixed wavelengths (RGB); the integrator skips
    /// drawing a wavelength sample for them.
    fn is_fixed(&self) -> bool;

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SpectrumInstance>>;
}

/// The device-facing spectrum interface used by textures, lights, and
/// the integrator.
pub trait SpectrumInstance: Send + Sync {
    fn dimension(&self) -> usize;

    fn is_fixed(&self) -> bool;

    /// Samples a wavelength bundle from a unit random number.
    fn sample(&self, u: f32) -> SampledWavelengths;

    /// Decodes a reflectance RGB; samples are clamped to `[0, 1]`.
    fn decode_albedo(&self, swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum;

    /// Decodes an unbounded positive (illuminant) RGB.
    fn decode_illuminant(&self, swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum;

    /// Projects a sampled spectrum onto CIE Y.
    fn cie_y(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> f32;

    /// Projects a sampled spectrum onto CIE XYZ.
    fn cie_xyz(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3;

    /// Projects a sampled spectrum onto linear sRGB.
    fn srgb(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3;
}
