use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::base::{Interaction, SceneNode};
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::spectrum::{SampledWavelengths, SpectrumDecode};
use crate::util::colorspace::srgb_to_cie_y;

/// The texture scene node.
pub trait Texture: SceneNode {
    /// True if the texture evaluates to one value everywhere.
    fn is_constant(&self) -> bool {
        false
    }

    /// True if the texture is identically zero.
    fn is_black(&self) -> bool {
        false
    }

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn TextureInstance>>;
}

/// The device-facing texture.
///
/// The spectral helpers decode the raw RGBA value through the
/// pipeline's spectrum; the returned strength (CIE Y of the RGB) feeds
/// MIS and alias-table weighting.
pub trait TextureInstance: Send + Sync {
    /// Raw RGBA value at the interaction.
    fn evaluate(&self, pipeline: &Pipeline, it: &Interaction, time: f32) -> Vec4;

    /// Decodes the value as a reflectance spectrum in `[0, 1]`.
    fn evaluate_albedo_spectrum(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> SpectrumDecode {
        let rgb = self.evaluate(pipeline, it, time).truncate();
        let clamped = rgb.clamp(Vec3::ZERO, Vec3::ONE);
        SpectrumDecode {
            value: pipeline.spectrum().decode_albedo(swl, clamped),
            strength: srgb_to_cie_y(clamped),
        }
    }

    /// Decodes the value as an unbounded positive illuminant spectrum.
    fn evaluate_illuminant_spectrum(
        &self,
        pipeline: &Pipeline,
        it: &Interaction,
        swl: &SampledWavelengths,
        time: f32,
    ) -> SpectrumDecode {
        let rgb = self.evaluate(pipeline, it, time).truncate().max(Vec3::ZERO);
        SpectrumDecode {
            value: pipeline.spectrum().decode_illuminant(swl, rgb),
            strength: srgb_to_cie_y(rgb),
        }
    }
}
