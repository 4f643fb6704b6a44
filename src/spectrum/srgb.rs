use std::sync::Arc;

use glam::Vec3;

use crate::base::{NodeRef, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::{SampledSpectrum, SampledWavelengths, Spectrum, SpectrumInstance};
use crate::util::colorspace::{srgb_to_cie_xyz, srgb_to_cie_y};

/// Wavelengths at which the sRGB primaries peak; used as the nominal
/// bundle for the fixed RGB color model.
const RGB_PEAK_WAVELENGTHS: [f32; 3] = [602.785, 539.285, 445.772];

/// The fixed RGB color model: three samples carried straight through in
/// linear sRGB, no spectral decoding.
pub struct SrgbSpectrum;

impl SceneNode for SrgbSpectrum {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Spectrum
    }

    fn impl_type(&self) -> &'static str {
        "srgb"
    }
}

impl Spectrum for SrgbSpectrum {
    fn dimension(&self) -> usize {
        3
    }

    fn is_fixed(&self) -> bool {
        true
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn SpectrumInstance>> {
        Ok(Arc::new(SrgbSpectrumInstance))
    }
}

struct SrgbSpectrumInstance;

impl SrgbSpectrumInstance {
    fn to_rgb(sp: &SampledSpectrum) -> Vec3 {
        Vec3::new(sp[0], sp[1], sp[2])
    }
}

impl SpectrumInstance for SrgbSpectrumInstance {
    fn dimension(&self) -> usize {
        3
    }

    fn is_fixed(&self) -> bool {
        true
    }

    fn sample(&self, _u: f32) -> SampledWavelengths {
        SampledWavelengths::from_parts(RGB_PEAK_WAVELENGTHS.to_vec(), vec![1.0; 3])
    }

    fn decode_albedo(&self, _swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum {
        let rgb = rgb.clamp(Vec3::ZERO, Vec3::ONE);
        SampledSpectrum::from_fn(3, |i| rgb[i])
    }

    fn decode_illuminant(&self, _swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum {
        let rgb = rgb.max(Vec3::ZERO);
        SampledSpectrum::from_fn(3, |i| rgb[i])
    }

    fn cie_y(&self, _swl: &SampledWavelengths, sp: &SampledSpectrum) -> f32 {
        srgb_to_cie_y(Self::to_rgb(sp))
    }

    fn cie_xyz(&self, _swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3 {
        srgb_to_cie_xyz(Self::to_rgb(sp))
    }

    fn srgb(&self, _swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3 {
        Self::to_rgb(sp)
    }
}

pub(crate) fn create(_scene: &Scene, _node: NodeView<'_>) -> Result<NodeRef> {
    Ok(NodeRef::Spectrum(Arc::new(SrgbSpectrum)))
}
