//! Spectral Model Tests
//!
//! Tests for:
//! - Wavelength sampling: visible range, stratification, PDFs
//! - Secondary termination semantics
//! - RGB round trip through the sigmoid-polynomial decoding
//! - Fixed RGB variant behavior

use glam::Vec3;
use prism::spectrum::{
    SampledSpectrum, VISIBLE_WAVELENGTH_MAX, VISIBLE_WAVELENGTH_MIN,
};
use prism::util::colorspace::srgb_to_cie_y;
use prism::{MacroMap, Pipeline, Scene, SceneParser};

fn build_pipeline(spectrum_impl: &str) -> Pipeline {
    let source = format!(
        r#"{{
            "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [4, 4]}}}},
            "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{"film": "@film", "spp": 1}}}},
            "render": {{
                "integrator": {{"impl": "megapath"}},
                "cameras": ["@camera"],
                "environment": {{"impl": "constant"}},
                "spectrum": {{"impl": "{spectrum_impl}"}}
            }}
        }}"#
    );
    let graph = SceneParser::parse_source(&source, &MacroMap::default()).unwrap();
    let scene = Scene::create(&graph).unwrap();
    Pipeline::create(&scene).unwrap()
}

// ============================================================================
// Wavelength Sampling
// ============================================================================

#[test]
fn hero_sampling_stays_in_the_visible_range() {
    let pipeline = build_pipeline("hero");
    let spectrum = pipeline.spectrum();
    assert_eq!(spectrum.dimension(), 4);
    assert!(!spectrum.is_fixed());
    for i in 0..1000 {
        let swl = spectrum.sample(i as f32 / 1000.0);
        for k in 0..swl.dimension() {
            let lambda = swl.lambda(k);
            assert!((VISIBLE_WAVELENGTH_MIN..=VISIBLE_WAVELENGTH_MAX).contains(&lambda));
            assert!(swl.pdf(k) > 0.0);
        }
    }
}

#[test]
fn uniform_sampling_rotates_and_wraps() {
    let pipeline = build_pipeline("uniform");
    let spectrum = pipeline.spectrum();
    let swl = spectrum.sample(0.9);
    let span = VISIBLE_WAVELENGTH_MAX - VISIBLE_WAVELENGTH_MIN;
    for k in 0..4 {
        let lambda = swl.lambda(k);
        assert!((VISIBLE_WAVELENGTH_MIN..=VISIBLE_WAVELENGTH_MAX).contains(&lambda));
        assert!((swl.pdf(k) - 1.0 / span).abs() < 1e-7);
    }
    // Quarter-span rotation, wrapped back into range.
    let primary = swl.lambda(0);
    let second = swl.lambda(1);
    let rotated = primary + span / 4.0;
    let expected = if rotated > VISIBLE_WAVELENGTH_MAX {
        rotated - span
    } else {
        rotated
    };
    assert!((second - expected).abs() < 1e-3);
}

#[test]
fn secondary_termination_collapses_to_the_primary() {
    let pipeline = build_pipeline("hero");
    let mut swl = pipeline.spectrum().sample(0.37);
    assert!(!swl.secondary_terminated());
    let pdf0 = swl.pdf(0);
    swl.terminate_secondary();
    assert!(swl.secondary_terminated());
    assert!((swl.pdf(0) - pdf0 / 4.0).abs() < 1e-7);
    for k in 1..4 {
        assert_eq!(swl.pdf(k), 0.0);
    }
}

// ============================================================================
// RGB Round Trip
// ============================================================================

#[test]
fn albedo_round_trip_reproduces_luminance() {
    let pipeline = build_pipeline("hero");
    let spectrum = pipeline.spectrum();
    let colors = [
        Vec3::new(0.7, 0.2, 0.1),
        Vec3::new(0.1, 0.6, 0.3),
        Vec3::new(0.2, 0.3, 0.9),
        Vec3::new(0.5, 0.5, 0.5),
        Vec3::new(0.9, 0.8, 0.1),
        Vec3::new(0.05, 0.05, 0.4),
    ];
    let samples = 10_000;
    for rgb in colors {
        let expected = srgb_to_cie_y(rgb);
        let mut estimate = 0.0f64;
        for i in 0..samples {
            let swl = spectrum.sample((i as f32 + 0.5) / samples as f32);
            let decoded = spectrum.decode_albedo(&swl, rgb);
            estimate += f64::from(spectrum.cie_y(&swl, &decoded));
        }
        let estimate = (estimate / f64::from(samples)) as f32;
        let error = (estimate - expected).abs();
        assert!(
            error < (0.02 * expected).max(0.015),
            "rgb {rgb:?}: estimated {estimate}, expected {expected}"
        );
    }
}

#[test]
fn albedo_decoding_is_bounded() {
    let pipeline = build_pipeline("hero");
    let spectrum = pipeline.spectrum();
    let swl = spectrum.sample(0.41);
    let decoded = spectrum.decode_albedo(&swl, Vec3::new(0.8, 0.4, 0.9));
    for k in 0..decoded.dimension() {
        assert!((0.0..=1.0).contains(&decoded[k]));
    }
}

#[test]
fn illuminant_decoding_is_unbounded_and_positive() {
    let pipeline = build_pipeline("hero");
    let spectrum = pipeline.spectrum();
    let swl = spectrum.sample(0.12);
    let decoded = spectrum.decode_illuminant(&swl, Vec3::splat(20.0));
    assert!(decoded.max_value() > 1.0);
    for k in 0..decoded.dimension() {
        assert!(decoded[k] >= 0.0);
    }
}

// ============================================================================
// Fixed RGB Variant
// ============================================================================

#[test]
fn srgb_variant_tracks_rgb_directly() {
    let pipeline = build_pipeline("srgb");
    let spectrum = pipeline.spectrum();
    assert_eq!(spectrum.dimension(), 3);
    assert!(spectrum.is_fixed());
    let swl = spectrum.sample(0.5);
    let rgb = Vec3::new(0.3, 0.5, 0.7);
    let decoded = spectrum.decode_albedo(&swl, rgb);
    assert_eq!(decoded.values(), &[0.3, 0.5, 0.7]);
    let back = spectrum.srgb(&swl, &decoded);
    assert!((back - rgb).length() < 1e-6);
    assert!((spectrum.cie_y(&swl, &decoded) - srgb_to_cie_y(rgb)).abs() < 1e-6);
}

#[test]
fn sampled_spectrum_reductions() {
    let sp = SampledSpectrum::from_fn(4, |i| (i + 1) as f32);
    assert_eq!(sp.sum(), 10.0);
    assert_eq!(sp.average(), 2.5);
    assert_eq!(sp.max_value(), 4.0);
    assert!(!sp.is_zero());
    assert!(SampledSpectrum::zero(4).is_zero());
}
