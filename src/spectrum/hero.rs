use std::sync::Arc;

use glam::{UVec3, Vec3, Vec4};

use crate::base::{NodeRef, SceneNode};
use crate::compute::Tex3d;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::spectrum::cie;
use crate::spectrum::{
    RgbToSpectrumTable, SampledSpectrum, SampledWavelengths, Spectrum, SpectrumInstance,
    RGB2SPEC_RESOLUTION, VISIBLE_WAVELENGTH_MAX, VISIBLE_WAVELENGTH_MIN,
};

/// Number of hero wavelengths carried per path.
const SAMPLE_COUNT: usize = 4;

/// Wavelength sampling strategy of the hero-wavelength color model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavelengthSampling {
    /// Importance sampling matched to the visible-range luminous
    /// efficiency; never produces wavelengths outside the visible range.
    Visible,
    /// Uniform over the visible range with stratified rotation.
    Uniform,
}

/// The hero-wavelength color model: four wavelengths sampled per camera
/// ray and carried through the bounce loop, decoded from RGB through the
/// sigmoid-polynomial coefficient table.
pub struct HeroSpectrum {
    sampling: WavelengthSampling,
}

impl HeroSpectrum {
    #[must_use]
    pub fn new(sampling: WavelengthSampling) -> Self {
        Self { sampling }
    }
}

impl SceneNode for HeroSpectrum {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Spectrum
    }

    fn impl_type(&self) -> &'static str {
        match self.sampling {
            WavelengthSampling::Visible => "hero",
            WavelengthSampling::Uniform => "uniform",
        }
    }
}

impl Spectrum for HeroSpectrum {
    fn dimension(&self) -> usize {
        SAMPLE_COUNT
    }

    fn is_fixed(&self) -> bool {
        false
    }

    fn build(&self, pipeline: &mut Pipeline) -> Result<Arc<dyn SpectrumInstance>> {
        let table = RgbToSpectrumTable::srgb();
        // The coefficient volumes are shared by every hero spectrum and
        // texture in the pipeline; the named-id cache uploads them once.
        let mut volume_ids = [0u32; 3];
        for (channel, id) in volume_ids.iter_mut().enumerate() {
            *id = pipeline.named_id(&format!("rgb2spec/coefficients/{channel}"), |p| {
                let res = RGB2SPEC_RESOLUTION as u32;
                let mut texels = Vec::with_capacity((res * res * res) as usize);
                for z in 0..res {
                    for y in 0..res {
                        for x in 0..res {
                            let c = table.coefficient_cell(channel, x, y, z);
                            texels.push(Vec4::new(c.x, c.y, c.z, 0.0));
                        }
                    }
                }
                p.bindless_mut()
                    .register_tex3d(Tex3d::new(UVec3::splat(res), texels))
            })?;
        }
        let volumes = volume_ids.map(|id| pipeline.bindless().tex3d_arc(id));
        Ok(Arc::new(HeroSpectrumInstance {
            sampling: self.sampling,
            table,
            volumes,
        }))
    }
}

struct HeroSpectrumInstance {
    sampling: WavelengthSampling,
    table: &'static RgbToSpectrumTable,
    volumes: [Arc<Tex3d>; 3],
}

fn sample_visible_wavelength(u: f32) -> f32 {
    538.0 - 138.888889 * (0.85691062 - 1.82750197 * u).atanh()
}

fn visible_wavelength_pdf(lambda: f32) -> f32 {
    if (VISIBLE_WAVELENGTH_MIN..=VISIBLE_WAVELENGTH_MAX).contains(&lambda) {
        let c = (0.0072 * (lambda - 538.0)).cosh();
        0.0039398042 / (c * c)
    } else {
        0.0
    }
}

impl HeroSpectrumInstance {
    fn decode(&self, rgb: Vec3) -> crate::spectrum::RgbSigmoidPolynomial {
        self.table.decode_albedo_with(rgb, &|channel, x, y, z| {
            self.volumes[channel].read(x, y, z).truncate()
        })
    }
}

impl SpectrumInstance for HeroSpectrumInstance {
    fn dimension(&self) -> usize {
        SAMPLE_COUNT
    }

    fn is_fixed(&self) -> bool {
        false
    }

    fn sample(&self, u: f32) -> SampledWavelengths {
        let mut swl = SampledWavelengths::new(SAMPLE_COUNT);
        match self.sampling {
            WavelengthSampling::Visible => {
                for i in 0..SAMPLE_COUNT {
                    let up = (u + i as f32 / SAMPLE_COUNT as f32).fract();
                    let lambda = sample_visible_wavelength(up);
                    swl.set_lambda(i, lambda);
                    swl.set_pdf(i, visible_wavelength_pdf(lambda));
                }
            }
            WavelengthSampling::Uniform => {
                let span = VISIBLE_WAVELENGTH_MAX - VISIBLE_WAVELENGTH_MIN;
                let delta = span / SAMPLE_COUNT as f32;
                let primary = VISIBLE_WAVELENGTH_MIN + u * span;
                for i in 0..SAMPLE_COUNT {
                    let mut lambda = primary + delta * i as f32;
                    if lambda > VISIBLE_WAVELENGTH_MAX {
                        lambda -= span;
                    }
                    swl.set_lambda(i, lambda);
                    swl.set_pdf(i, 1.0 / span);
                }
            }
        }
        swl
    }

    fn decode_albedo(&self, swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum {
        let poly = self.decode(rgb.clamp(Vec3::ZERO, Vec3::ONE));
        SampledSpectrum::from_fn(swl.dimension(), |i| poly.eval(swl.lambda(i)))
    }

    fn decode_illuminant(&self, swl: &SampledWavelengths, rgb: Vec3) -> SampledSpectrum {
        let (poly, scale) = self.table.decode_unbound(rgb);
        SampledSpectrum::from_fn(swl.dimension(), |i| {
            let lambda = swl.lambda(i);
            poly.eval(lambda) * scale * cie::illuminant_d65(lambda)
        })
    }

    fn cie_y(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> f32 {
        let mut sum = 0.0;
        for i in 0..swl.dimension() {
            let pdf = swl.pdf(i);
            if pdf > 0.0 {
                sum += cie::cie_y(swl.lambda(i)) * sp[i] / pdf;
            }
        }
        sum / (swl.dimension() as f32 * cie::cie_y_integral())
    }

    fn cie_xyz(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for i in 0..swl.dimension() {
            let pdf = swl.pdf(i);
            if pdf > 0.0 {
                let lambda = swl.lambda(i);
                let xyz = Vec3::new(cie::cie_x(lambda), cie::cie_y(lambda), cie::cie_z(lambda));
                sum += xyz * (sp[i] / pdf);
            }
        }
        sum / (swl.dimension() as f32 * cie::cie_y_integral())
    }

    fn srgb(&self, swl: &SampledWavelengths, sp: &SampledSpectrum) -> Vec3 {
        crate::util::colorspace::cie_xyz_to_srgb(self.cie_xyz(swl, sp))
    }
}

pub(crate) fn create_hero(_scene: &Scene, _node: NodeView<'_>) -> Result<NodeRef> {
    Ok(NodeRef::Spectrum(Arc::new(HeroSpectrum::new(
        WavelengthSampling::Visible,
    ))))
}

pub(crate) fn create_uniform(_scene: &Scene, _node: NodeView<'_>) -> Result<NodeRef> {
    Ok(NodeRef::Spectrum(Arc::new(HeroSpectrum::new(
        WavelengthSampling::Uniform,
    ))))
}
