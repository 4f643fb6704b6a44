use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::{UVec2, Vec3, Vec4};

use crate::base::{Film, FilmInstance, NodeRef, SceneNode};
use crate::compute::atomic_add_f32;
use crate::errors::{PrismError, Result};
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::sdl::{NodeView, SceneNodeTag};
use crate::util::colorspace::{aces_tone_map, linear_to_srgb, srgb_to_cie_y};

/// Tone-mapping hook applied when developing to LDR formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToneMapping {
    None,
    Aces,
}

/// An RGB film with atomic accumulation.
pub struct RgbFilm {
    resolution: UVec2,
    clamp: f32,
    exposure: Vec3,
    tone_mapping: ToneMapping,
}

impl SceneNode for RgbFilm {
    fn tag(&self) -> SceneNodeTag {
        SceneNodeTag::Film
    }

    fn impl_type(&self) -> &'static str {
        "rgb"
    }
}

impl Film for RgbFilm {
    fn resolution(&self) -> UVec2 {
        self.resolution
    }

    fn clamp(&self) -> f32 {
        self.clamp
    }

    fn build(&self, _pipeline: &mut Pipeline) -> Result<Arc<dyn FilmInstance>> {
        let pixel_count = (self.resolution.x * self.resolution.y) as usize;
        let scale = Vec3::new(
            2.0f32.powf(self.exposure.x),
            2.0f32.powf(self.exposure.y),
            2.0f32.powf(self.exposure.z),
        );
        Ok(Arc::new(RgbFilmInstance {
            resolution: self.resolution,
            clamp: self.clamp,
            scale,
            tone_mapping: self.tone_mapping,
            pixels: (0..pixel_count * 4).map(|_| AtomicU32::new(0)).collect(),
        }))
    }
}

/// Pixels are four atomically updated slots `(sum.x, sum.y, sum.z,
/// weight)`; reads resolve to `sum / weight` at save time.
struct RgbFilmInstance {
    resolution: UVec2,
    clamp: f32,
    scale: Vec3,
    tone_mapping: ToneMapping,
    pixels: Vec<AtomicU32>,
}

impl FilmInstance for RgbFilmInstance {
    fn resolution(&self) -> UVec2 {
        self.resolution
    }

    fn clear(&self) {
        for slot in &self.pixels {
            slot.store(0, Ordering::Relaxed);
        }
    }

    fn accumulate(&self, pixel: UVec2, rgb: Vec3, effective_spp: f32) {
        if rgb.is_nan() || !effective_spp.is_finite() {
            return;
        }
        let luminance = srgb_to_cie_y(rgb);
        let clamped = rgb * (self.clamp / luminance.max(self.clamp));
        let base = ((pixel.y * self.resolution.x + pixel.x) * 4) as usize;
        for i in 0..3 {
            atomic_add_f32(&self.pixels[base + i], clamped[i] * effective_spp);
        }
        atomic_add_f32(&self.pixels[base + 3], effective_spp);
    }

    fn develop(&self) -> Vec<Vec4> {
        let pixel_count = (self.resolution.x * self.resolution.y) as usize;
        (0..pixel_count)
            .map(|i| {
                let read = |j: usize| f32::from_bits(self.pixels[i * 4 + j].load(Ordering::Relaxed));
                let weight = read(3);
                if weight > 0.0 {
                    let rgb = Vec3::new(read(0), read(1), read(2)) / weight * self.scale;
                    rgb.extend(1.0)
                } else {
                    Vec4::new(0.0, 0.0, 0.0, 1.0)
                }
            })
            .collect()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let pixels = self.develop();
        let (w, h) = (self.resolution.x, self.resolution.y);
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        log::info!("Saving film ({w}x{h}) to '{}'.", path.display());
        match extension.as_str() {
            "exr" | "hdr" => {
                let mut image = image::Rgb32FImage::new(w, h);
                for (i, p) in pixels.iter().enumerate() {
                    let (x, y) = (i as u32 % w, i as u32 / w);
                    image.put_pixel(x, y, image::Rgb([p.x, p.y, p.z]));
                }
                image.save(path)?;
            }
            "png" | "jpg" | "jpeg" | "bmp" | "tga" => {
                let mut image = image::RgbImage::new(w, h);
                for (i, p) in pixels.iter().enumerate() {
                    let (x, y) = (i as u32 % w, i as u32 / w);
                    let encode = |v: f32| {
                        let mapped = match self.tone_mapping {
                            ToneMapping::None => v.clamp(0.0, 1.0),
                            ToneMapping::Aces => aces_tone_map(v),
                        };
                        (linear_to_srgb(mapped) * 255.0 + 0.5) as u8
                    };
                    image.put_pixel(x, y, image::Rgb([encode(p.x), encode(p.y), encode(p.z)]));
                }
                image.save(path)?;
            }
            _ => {
                return Err(PrismError::Image(format!(
                    "film extension '.{extension}' is not supported"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn create(_scene: &Scene, node: NodeView<'_>) -> Result<NodeRef> {
    let (w, h) = node.uvec2_prop_or("resolution", (1024, 1024))?;
    let clamp = node.f32_prop_or("clamp", 16384.0)?.max(1.0);
    let exposure = node.vec3_prop_or_splat("exposure", Vec3::ZERO)?;
    let tone_mapping = match node.string_prop_or("tone_mapping", "none")? {
        "none" => ToneMapping::None,
        "aces" => ToneMapping::Aces,
        other => {
            return Err(PrismError::schema(
                format!("unknown tone mapping operator '{other}'"),
                node.location(),
            ));
        }
    };
    Ok(NodeRef::Film(Arc::new(RgbFilm {
        resolution: UVec2::new(w.max(1), h.max(1)),
        clamp,
        exposure,
        tone_mapping,
    })))
}
