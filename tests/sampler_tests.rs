//! Sampler Tests
//!
//! Tests for:
//! - The uniform contract: unit-interval outputs, determinism
//! - State persistence: save/load resumability
//! - Stratification of the low-discrepancy variants

use glam::UVec2;
use prism::base::{Sampler, SamplerInstance};
use prism::samplers::{IndependentSampler, PaddedSobolSampler, Pmj02bnSampler};

fn all_samplers() -> Vec<(&'static str, Box<dyn SamplerInstance>)> {
    let independent = IndependentSampler::default().build().unwrap();
    let sobol = PaddedSobolSampler::default().build().unwrap();
    let pmj02bn = Pmj02bnSampler::default().build().unwrap();
    let mut samplers = vec![
        ("independent", independent),
        ("sobol", sobol),
        ("pmj02bn", pmj02bn),
    ];
    for (_, sampler) in &mut samplers {
        sampler.reset(UVec2::new(16, 16), 256, 16);
    }
    samplers
}

// ============================================================================
// Uniform Contract
// ============================================================================

#[test]
fn samples_stay_in_the_unit_interval() {
    for (name, sampler) in all_samplers() {
        for index in 0..16 {
            let mut state = sampler.start(UVec2::new(3, 5), index);
            for _ in 0..32 {
                let u = sampler.generate_1d(&mut state);
                assert!((0.0..1.0).contains(&u), "{name}: 1d sample {u}");
                let uv = sampler.generate_2d(&mut state);
                assert!((0.0..1.0).contains(&uv.x), "{name}: 2d sample {uv}");
                assert!((0.0..1.0).contains(&uv.y), "{name}: 2d sample {uv}");
            }
        }
    }
}

#[test]
fn restarting_reproduces_the_sequence() {
    for (name, sampler) in all_samplers() {
        let pixel = UVec2::new(7, 2);
        let mut first = sampler.start(pixel, 3);
        let a: Vec<f32> = (0..8).map(|_| sampler.generate_1d(&mut first)).collect();
        let mut second = sampler.start(pixel, 3);
        let b: Vec<f32> = (0..8).map(|_| sampler.generate_1d(&mut second)).collect();
        assert_eq!(a, b, "{name} must be deterministic per (pixel, index)");
    }
}

#[test]
fn distinct_pixels_are_decorrelated() {
    for (name, sampler) in all_samplers() {
        let mut state_a = sampler.start(UVec2::new(0, 0), 0);
        let mut state_b = sampler.start(UVec2::new(1, 0), 0);
        let a: Vec<f32> = (0..16).map(|_| sampler.generate_1d(&mut state_a)).collect();
        let b: Vec<f32> = (0..16).map(|_| sampler.generate_1d(&mut state_b)).collect();
        assert_ne!(a, b, "{name} produced identical streams for two pixels");
    }
}

// ============================================================================
// State Persistence
// ============================================================================

#[test]
fn suspended_states_resume_exactly() {
    for (name, sampler) in all_samplers() {
        let pixel = UVec2::new(9, 9);
        let id = 9 * 16 + 9;

        let mut state = sampler.start(pixel, 5);
        let _ = sampler.generate_2d(&mut state);
        let _ = sampler.generate_1d(&mut state);
        sampler.save_state(id, &state);

        // The uninterrupted continuation...
        let mut uninterrupted = state;
        let expected: Vec<f32> = (0..8)
            .map(|_| sampler.generate_1d(&mut uninterrupted))
            .collect();

        // ...must match the continuation after a reload.
        let mut resumed = sampler.load_state(id);
        assert_eq!(state, resumed, "{name} state round trip");
        let actual: Vec<f32> = (0..8).map(|_| sampler.generate_1d(&mut resumed)).collect();
        assert_eq!(expected, actual, "{name} resume mismatch");
    }
}

// ============================================================================
// Stratification
// ============================================================================

#[test]
fn sobol_first_dimension_is_stratified() {
    let mut sampler = PaddedSobolSampler::default().build().unwrap();
    let spp = 16u32;
    sampler.reset(UVec2::new(4, 4), 16, spp);
    let pixel = UVec2::new(2, 1);
    let mut bins = vec![0u32; spp as usize];
    for index in 0..spp {
        let mut state = sampler.start(pixel, index);
        let u = sampler.generate_1d(&mut state);
        bins[(u * spp as f32) as usize] += 1;
    }
    // An Owen-scrambled (0,2) dimension places one sample per stratum.
    assert!(
        bins.iter().all(|&count| count == 1),
        "stratum occupancy {bins:?}"
    );
}

#[test]
fn pmj02bn_pixel_samples_are_stratified_in_2d() {
    let mut sampler = Pmj02bnSampler::default().build().unwrap();
    let spp = 16u32;
    sampler.reset(UVec2::new(4, 4), 16, spp);
    let pixel = UVec2::new(0, 3);
    let mut occupancy = vec![0u32; spp as usize];
    for index in 0..spp {
        let mut state = sampler.start(pixel, index);
        let uv = sampler.generate_pixel_2d(&mut state);
        let cell = (uv.y * 4.0) as u32 * 4 + (uv.x * 4.0) as u32;
        occupancy[cell as usize] += 1;
    }
    // A (0,2) set of 16 points covers the 4x4 grid one point per cell.
    assert!(
        occupancy.iter().all(|&count| count == 1),
        "cell occupancy {occupancy:?}"
    );
}
