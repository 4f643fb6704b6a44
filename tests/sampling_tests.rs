//! Sampling & Light Sampler Tests
//!
//! Tests for:
//! - Walker alias tables: unbiasedness over many draws
//! - Multiple importance sampling: balance-heuristic variance reduction
//! - Light sampler: selection frequencies and PDF symmetry

use glam::{Vec2, Vec3};
use prism::base::{Interaction, SELECTION_ENVIRONMENT};
use prism::compute::Ray;
use prism::util::sampling::{balance_heuristic, create_alias_table, sample_alias_table};
use prism::{MacroMap, Pipeline, Scene, SceneParser};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn build_pipeline(source: &str) -> Pipeline {
    let graph = SceneParser::parse_source(source, &MacroMap::default()).unwrap();
    let scene = Scene::create(&graph).unwrap();
    Pipeline::create(&scene).unwrap()
}

fn quad_shape(name: &str, y: f32, half: f32) -> String {
    format!(
        r#""{name}": {{
            "type": "Shape", "impl": "mesh",
            "prop": {{
                "light": {{"impl": "diffuse", "prop": {{
                    "emission": {{"impl": "constant", "prop": {{"v": [1, 1, 1]}}}},
                    "two_sided": true
                }}}},
                "positions": [{x0}, {y}, {x0}, {x1}, {y}, {x0}, {x1}, {y}, {x1}, {x0}, {y}, {x1}],
                "indices": [0, 1, 2, 0, 2, 3]
            }}
        }}"#,
        x0 = -half,
        x1 = half,
    )
}

// ============================================================================
// Alias Tables
// ============================================================================

#[test]
fn alias_table_is_unbiased() {
    let weights = [1.0f32, 5.0, 0.5, 2.0, 8.0, 0.25, 3.0, 1.25];
    let (table, pdf) = create_alias_table(&weights);
    let n = 1_000_000u32;
    let mut counts = vec![0u32; weights.len()];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..n {
        let (bin, remapped) = sample_alias_table(&table, rng.gen::<f32>());
        assert!((0.0..1.0).contains(&remapped));
        counts[bin] += 1;
    }
    for (bin, &p) in pdf.iter().enumerate() {
        let frequency = counts[bin] as f32 / n as f32;
        let sigma = (p * (1.0 - p) / n as f32).sqrt();
        assert!(
            (frequency - p).abs() < 4.0 * sigma + 1e-6,
            "bin {bin}: frequency {frequency}, pdf {p}"
        );
    }
}

#[test]
fn alias_table_remapped_sample_is_uniform() {
    let (table, _) = create_alias_table(&[3.0, 1.0]);
    let n = 100_000;
    let mut sum = 0.0f64;
    for i in 0..n {
        let (_, remapped) = sample_alias_table(&table, (i as f32 + 0.5) / n as f32);
        sum += f64::from(remapped);
    }
    let mean = sum / f64::from(n);
    assert!((mean - 0.5).abs() < 0.01, "remapped mean {mean}");
}

// ============================================================================
// Multiple Importance Sampling
// ============================================================================

/// Integrates a two-peak 1D function with two matched strategies; the
/// balance-heuristic combination must beat either strategy alone.
#[test]
fn balance_heuristic_reduces_variance() {
    // f = fa + fb, where strategy A samples proportional to fa and
    // strategy B proportional to fb.
    let fa = |x: f32| 2.0 * x; // pdf_a = 2x
    let fb = |x: f32| 3.0 * x * x; // pdf_b = 3x^2
    let f = |x: f32| fa(x) + fb(x); // integral = 2
    let pdf_a = |x: f32| 2.0 * x;
    let pdf_b = |x: f32| 3.0 * x * x;
    let sample_a = |u: f32| u.sqrt();
    let sample_b = |u: f32| u.cbrt();

    let runs = 200;
    let per_run = 64;
    let mut rng = StdRng::seed_from_u64(42);
    let mut variance = |strategy: &dyn Fn(&mut StdRng) -> f32| {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for _ in 0..runs {
            let mut estimate = 0.0f32;
            for _ in 0..per_run {
                estimate += strategy(&mut rng);
            }
            let estimate = f64::from(estimate / per_run as f32);
            sum += estimate;
            sum_sq += estimate * estimate;
        }
        let mean = sum / f64::from(runs);
        (sum_sq / f64::from(runs) - mean * mean, mean)
    };

    let (var_a, mean_a) = variance(&|rng| {
        let x = sample_a(rng.gen::<f32>());
        f(x) / pdf_a(x)
    });
    let (var_b, mean_b) = variance(&|rng| {
        let x = sample_b(rng.gen::<f32>());
        f(x) / pdf_b(x)
    });
    // One draw from each strategy, balance-weighted.
    let (var_mis, mean_mis) = variance(&|rng| {
        let xa = sample_a(rng.gen::<f32>());
        let xb = sample_b(rng.gen::<f32>());
        let wa = balance_heuristic(pdf_a(xa), pdf_b(xa));
        let wb = balance_heuristic(pdf_b(xb), pdf_a(xb));
        wa * f(xa) / pdf_a(xa) + wb * f(xb) / pdf_b(xb)
    });

    for mean in [mean_a, mean_b, mean_mis] {
        assert!((mean - 2.0).abs() < 0.05, "estimator mean {mean}");
    }
    assert!(
        var_mis < var_a && var_mis < var_b,
        "variances: mis {var_mis}, a {var_a}, b {var_b}"
    );
}

// ============================================================================
// Light Sampler Selection
// ============================================================================

#[test]
fn environment_only_scene_always_selects_the_environment() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [4, 4]}},
        "camera": {"type": "Camera", "impl": "pinhole", "prop": {"film": "@film", "spp": 1}},
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
        }
    }"#;
    let pipeline = build_pipeline(source);
    let sampler = pipeline.light_sampler().unwrap();
    let n = 1_000_000;
    for i in 0..n {
        let selection = sampler.select((i as f32 + 0.5) / n as f32);
        assert_eq!(selection.tag, SELECTION_ENVIRONMENT);
        assert_eq!(selection.prob, 1.0);
    }
}

#[test]
fn three_lights_without_environment_select_uniformly() {
    let source = format!(
        r#"{{
            "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [4, 4]}}}},
            "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{"film": "@film", "spp": 1}}}},
            {a},
            {b},
            {c},
            "render": {{
                "integrator": {{"impl": "megapath"}},
                "cameras": ["@camera"],
                "shapes": ["@light_a", "@light_b", "@light_c"]
            }}
        }}"#,
        a = quad_shape("light_a", 1.0, 0.5),
        b = quad_shape("light_b", 2.0, 0.5),
        c = quad_shape("light_c", 3.0, 0.5),
    );
    let pipeline = build_pipeline(&source);
    let sampler = pipeline.light_sampler().unwrap();
    let n = 1_000_000u32;
    let mut counts = [0u32; 3];
    for i in 0..n {
        let selection = sampler.select((f64::from(i) / f64::from(n)) as f32);
        assert_ne!(selection.tag, SELECTION_ENVIRONMENT);
        assert!((selection.prob - 1.0 / 3.0).abs() < 1e-6);
        counts[selection.tag as usize] += 1;
    }
    for count in counts {
        let frequency = f64::from(count) / f64::from(n);
        assert!(
            (frequency - 1.0 / 3.0).abs() < 0.002,
            "selection frequency {frequency}"
        );
    }
}

#[test]
fn mixed_scene_clamps_the_environment_weight() {
    let source = format!(
        r#"{{
            "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [4, 4]}}}},
            "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{"film": "@film", "spp": 1}}}},
            {a},
            "render": {{
                "integrator": {{"impl": "megapath", "prop": {{
                    "light_sampler": {{"impl": "uniform", "prop": {{"environment_weight": 1.0}}}}
                }}}},
                "cameras": ["@camera"],
                "shapes": ["@light_a"],
                "environment": {{"impl": "constant"}}
            }}
        }}"#,
        a = quad_shape("light_a", 1.0, 0.5),
    );
    let pipeline = build_pipeline(&source);
    let sampler = pipeline.light_sampler().unwrap();
    // Even with weight 1, area lights keep at least 1% selection mass.
    let selection = sampler.select(0.995);
    assert_ne!(selection.tag, SELECTION_ENVIRONMENT);
    assert!((selection.prob - 0.01).abs() < 1e-6);
}

// ============================================================================
// Light Sampler PDF Symmetry
// ============================================================================

#[test]
fn sampled_light_pdf_matches_hit_evaluation() {
    let source = format!(
        r#"{{
            "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [4, 4]}}}},
            "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{"film": "@film", "spp": 1}}}},
            {a},
            "render": {{
                "integrator": {{"impl": "megapath"}},
                "cameras": ["@camera"],
                "shapes": ["@light_a"]
            }}
        }}"#,
        a = quad_shape("light_a", 2.0, 0.8),
    );
    let pipeline = build_pipeline(&source);
    let sampler = pipeline.light_sampler().unwrap();
    let spectrum = pipeline.spectrum();
    let swl = spectrum.sample(0.5);

    let p_from = Vec3::new(0.1, 0.0, -0.2);
    let mut it_from = Interaction::at_uv(Vec2::ZERO);
    it_from.pg = p_from;
    it_from.ps = p_from;

    let mut rng = StdRng::seed_from_u64(7);
    let mut checked = 0;
    for _ in 0..256 {
        let sample = sampler.sample(
            &pipeline,
            &it_from,
            rng.gen::<f32>(),
            Vec2::new(rng.gen::<f32>(), rng.gen::<f32>()),
            &swl,
            0.0,
        );
        if sample.eval.pdf <= 0.0 {
            continue;
        }
        let ray = Ray::new(p_from, sample.wi);
        let hit = pipeline.intersect(&ray).expect("sampled point must be hit");
        assert!(hit.handle.has_light());
        let eval = sampler.evaluate_hit(&pipeline, &hit, p_from, &swl, 0.0);
        let relative = (eval.pdf - sample.eval.pdf).abs() / sample.eval.pdf;
        assert!(
            relative < 1e-3,
            "pdf mismatch: sampled {}, evaluated {}",
            sample.eval.pdf,
            eval.pdf
        );
        checked += 1;
    }
    assert!(checked > 200, "only {checked} samples were checkable");
}
