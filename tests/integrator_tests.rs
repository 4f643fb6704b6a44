//! Integrator Tests
//!
//! End-to-end renders of small deterministic scenes:
//! - A Cornell-style box sanity render
//! - Furnace behavior under a constant environment
//! - Alpha cut-out neutrality: a zero-opacity surface renders
//!   bit-identically to an absent one
//! - Specular dispatch: delta lobes and dispersive termination

use glam::{Vec2, Vec3, Vec4};
use prism::base::LobeEvent;
use prism::compute::Ray;
use prism::util::colorspace::srgb_to_cie_y;
use prism::{MacroMap, Pipeline, Scene, SceneParser};

fn build_pipeline(source: &str) -> Pipeline {
    let graph = SceneParser::parse_source(source, &MacroMap::default()).unwrap();
    let scene = Scene::create(&graph).unwrap();
    Pipeline::create(&scene).unwrap()
}

fn render(source: &str) -> (Vec<Vec4>, u32) {
    let mut pipeline = build_pipeline(source);
    pipeline.render().unwrap();
    let resolution = pipeline.camera(0).film.resolution();
    (pipeline.camera(0).film.develop(), resolution.x)
}

/// An axis-aligned quad as inline mesh properties (positions only).
fn quad(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> String {
    format!(
        r#""positions": [{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}],
           "indices": [0, 1, 2, 0, 2, 3]"#,
        p0.x, p0.y, p0.z, p1.x, p1.y, p1.z, p2.x, p2.y, p2.z, p3.x, p3.y, p3.z
    )
}

fn cornell_scene() -> String {
    let floor = quad(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(-1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, -1.0),
    );
    let ceiling = quad(
        Vec3::new(-1.0, 2.0, -1.0),
        Vec3::new(1.0, 2.0, -1.0),
        Vec3::new(1.0, 2.0, 1.0),
        Vec3::new(-1.0, 2.0, 1.0),
    );
    let back = quad(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(1.0, 2.0, -1.0),
        Vec3::new(-1.0, 2.0, -1.0),
    );
    let left = quad(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(-1.0, 2.0, -1.0),
        Vec3::new(-1.0, 2.0, 1.0),
        Vec3::new(-1.0, 0.0, 1.0),
    );
    let right = quad(
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 2.0, 1.0),
        Vec3::new(1.0, 2.0, -1.0),
    );
    let lamp = quad(
        Vec3::new(-0.3, 1.99, -0.3),
        Vec3::new(0.3, 1.99, -0.3),
        Vec3::new(0.3, 1.99, 0.3),
        Vec3::new(-0.3, 1.99, 0.3),
    );
    format!(
        r#"{{
        "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [24, 24]}}}},
        "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{
            "film": "@film", "spp": 32, "fov": 40,
            "transform": {{"impl": "matrix", "prop": {{"translate": [0, 1, 3.4]}}}}
        }}}},
        "white": {{"type": "Surface", "impl": "matte",
                   "prop": {{"kd": {{"impl": "constant", "prop": {{"v": [0.73, 0.73, 0.73]}}}}}}}},
        "red": {{"type": "Surface", "impl": "matte",
                 "prop": {{"kd": {{"impl": "constant", "prop": {{"v": [0.65, 0.05, 0.05]}}}}}}}},
        "green": {{"type": "Surface", "impl": "matte",
                   "prop": {{"kd": {{"impl": "constant", "prop": {{"v": [0.12, 0.45, 0.15]}}}}}}}},
        "floor": {{"type": "Shape", "impl": "mesh", "prop": {{"surface": "@white", {floor}}}}},
        "ceiling": {{"type": "Shape", "impl": "mesh", "prop": {{"surface": "@white", {ceiling}}}}},
        "back": {{"type": "Shape", "impl": "mesh", "prop": {{"surface": "@white", {back}}}}},
        "left": {{"type": "Shape", "impl": "mesh", "prop": {{"surface": "@red", {left}}}}},
        "right": {{"type": "Shape", "impl": "mesh", "prop": {{"surface": "@green", {right}}}}},
        "lamp": {{"type": "Shape", "impl": "mesh", "prop": {{
            "surface": "@white",
            "light": {{"impl": "diffuse", "prop": {{
                "emission": {{"impl": "constant", "prop": {{"v": [1, 0.85, 0.6]}}}},
                "scale": 14
            }}}},
            {lamp}
        }}}},
        "render": {{
            "integrator": {{"impl": "megapath", "prop": {{"depth": 5}}}},
            "cameras": ["@camera"],
            "shapes": ["@floor", "@ceiling", "@back", "@left", "@right", "@lamp"]
        }}
    }}"#
    )
}

// ============================================================================
// Cornell Box Sanity
// ============================================================================

#[test]
fn cornell_box_renders_plausible_radiance() {
    let (pixels, width) = render(&cornell_scene());
    assert!(pixels.iter().all(|p| p.x.is_finite() && p.x >= 0.0));

    // Center crop mean luminance: lit, but far from blown out.
    let mut sum = 0.0f64;
    let mut count = 0u32;
    for y in 8..16 {
        for x in 8..16 {
            let p = pixels[(y * width + x) as usize];
            sum += f64::from(srgb_to_cie_y(p.truncate()));
            count += 1;
        }
    }
    let mean = (sum / f64::from(count)) as f32;
    assert!(
        (0.02..1.5).contains(&mean),
        "center crop mean luminance {mean}"
    );

    // Color bleeding: columns near the red wall leave more red than
    // blue, and symmetrically for the green wall.
    let side = |range: std::ops::Range<u32>| {
        let mut rgb = Vec3::ZERO;
        for y in 6..18 {
            for x in range.clone() {
                rgb += pixels[(y * width + x) as usize].truncate();
            }
        }
        rgb
    };
    let near_red = side(0..4);
    let near_green = side(20..24);
    assert!(near_red.x > near_red.z, "left side {near_red:?}");
    assert!(near_green.y > near_green.z, "right side {near_green:?}");
}

// ============================================================================
// Furnace Behavior
// ============================================================================

#[test]
fn constant_environment_furnace() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [16, 16]}},
        "camera": {"type": "Camera", "impl": "pinhole", "prop": {
            "film": "@film", "spp": 16, "fov": 40,
            "transform": {"impl": "matrix", "prop": {"translate": [0, 0, 4]}}
        }},
        "ball": {"type": "Shape", "impl": "sphere", "prop": {
            "subdivision": 3,
            "surface": {"impl": "matte", "prop": {
                "kd": {"impl": "constant", "prop": {"v": [0.5, 0.5, 0.5]}}
            }}
        }},
        "render": {
            "integrator": {"impl": "megapath", "prop": {"depth": 8}},
            "cameras": ["@camera"],
            "shapes": ["@ball"],
            "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
        }
    }"#;
    let (pixels, width) = render(source);

    // Corner rays miss everything and see the environment exactly.
    let corner = pixels[0].truncate();
    assert!((corner - Vec3::ONE).length() < 1e-3, "corner {corner:?}");

    // Sphere pixels bounce toward the environment; gray albedo keeps
    // them between the albedo floor and the environment level.
    let center = pixels[(8 * width + 8) as usize].truncate();
    let luminance = srgb_to_cie_y(center);
    assert!(
        (0.2..1.1).contains(&luminance),
        "sphere luminance {luminance}"
    );
}

// ============================================================================
// Alpha Cut-Out Neutrality
// ============================================================================

fn occluder_scene(with_occluder: bool) -> String {
    let floor = quad(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(-1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, -1.0),
    );
    let lamp = quad(
        Vec3::new(1.3, 2.0, -0.3),
        Vec3::new(1.9, 2.0, -0.3),
        Vec3::new(1.9, 2.0, 0.3),
        Vec3::new(1.3, 2.0, 0.3),
    );
    let occluder = quad(
        Vec3::new(-0.6, 0.1, 1.5),
        Vec3::new(0.1, 0.1, 1.5),
        Vec3::new(0.1, 0.8, 1.5),
        Vec3::new(-0.6, 0.8, 1.5),
    );
    let occluder_node = if with_occluder {
        format!(
            r#""ghost": {{"type": "Shape", "impl": "mesh", "prop": {{
                "surface": {{"impl": "matte", "prop": {{
                    "kd": {{"impl": "constant", "prop": {{"v": [0.4, 0.4, 0.4]}}}},
                    "opacity": {{"impl": "constant", "prop": {{"v": [0]}}}}
                }}}},
                {occluder}
            }}}},"#
        )
    } else {
        String::new()
    };
    let shapes = if with_occluder {
        r#"["@floor", "@lamp", "@ghost"]"#
    } else {
        r#"["@floor", "@lamp"]"#
    };
    format!(
        r#"{{
        "film": {{"type": "Film", "impl": "rgb", "prop": {{"resolution": [16, 16]}}}},
        "camera": {{"type": "Camera", "impl": "pinhole", "prop": {{
            "film": "@film", "spp": 8, "fov": 50,
            "transform": {{"impl": "matrix", "prop": {{"translate": [0, 0.6, 3]}}}}
        }}}},
        {occluder_node}
        "floor": {{"type": "Shape", "impl": "mesh", "prop": {{
            "surface": {{"impl": "matte", "prop": {{
                "kd": {{"impl": "constant", "prop": {{"v": [0.7, 0.7, 0.7]}}}}
            }}}},
            {floor}
        }}}},
        "lamp": {{"type": "Shape", "impl": "mesh", "prop": {{
            "light": {{"impl": "diffuse", "prop": {{
                "emission": {{"impl": "constant", "prop": {{"v": [1, 1, 1]}}}},
                "scale": 10, "two_sided": true
            }}}},
            {lamp}
        }}}},
        "render": {{
            "integrator": {{"impl": "megapath", "prop": {{"depth": 3}}}},
            "cameras": ["@camera"],
            "shapes": {shapes}
        }}
    }}"#
    )
}

#[test]
fn zero_opacity_surface_is_bit_identical_to_no_surface() {
    let (with_ghost, _) = render(&occluder_scene(true));
    let (without_ghost, _) = render(&occluder_scene(false));
    for (i, (a, b)) in with_ghost.iter().zip(&without_ghost).enumerate() {
        assert_eq!(a, b, "pixel {i} diverged: {a:?} vs {b:?}");
    }
}

// ============================================================================
// Specular Dispatch
// ============================================================================

#[test]
fn mirror_closure_is_a_delta_lobe() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [8, 8]}},
        "camera": {"type": "Camera", "impl": "pinhole", "prop": {
            "film": "@film", "spp": 1,
            "transform": {"impl": "matrix", "prop": {"translate": [0, 0, 4]}}
        }},
        "ball": {"type": "Shape", "impl": "sphere", "prop": {
            "subdivision": 3,
            "surface": {"impl": "mirror", "prop": {
                "tint": {"impl": "constant", "prop": {"v": [0.9, 0.9, 0.9]}}
            }}
        }},
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "shapes": ["@ball"],
            "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
        }
    }"#;
    let pipeline = build_pipeline(source);
    let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z);
    let it = pipeline.intersect(&ray).expect("ray must hit the sphere");
    assert!(it.handle.has_surface());

    let swl = pipeline.spectrum().sample(0.5);
    let surface = pipeline.surfaces().get(it.handle.surface_tag());
    let closure = surface.closure(&pipeline, &it, &swl, 0.0);

    let wo = Vec3::Z;
    // Light sampling never sees the delta lobe.
    let eval = closure.evaluate(wo, Vec3::new(0.3, 0.9, 0.3).normalize());
    assert_eq!(eval.pdf, 0.0);
    assert!(eval.f.is_zero());

    // Sampling reports an infinite PDF, collapsing the MIS weight onto
    // the BSDF branch on the next emission hit.
    let sample = closure.sample(wo, 0.5, Vec2::new(0.5, 0.5));
    assert!(sample.eval.pdf.is_infinite());
    assert_eq!(sample.event, LobeEvent::Reflect);
    assert!(
        prism::util::sampling::balance_heuristic(sample.eval.pdf, 123.0) >= 0.999
    );
    // Head-on, the mirror reflects straight back (up to the
    // tessellation's interpolated-normal error).
    assert!((sample.wi - Vec3::Z).length() < 0.05);
}

#[test]
fn dispersive_transmission_terminates_secondary_wavelengths() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [8, 8]}},
        "camera": {"type": "Camera", "impl": "pinhole", "prop": {
            "film": "@film", "spp": 1,
            "transform": {"impl": "matrix", "prop": {"translate": [0, 0, 4]}}
        }},
        "prismatic": {"type": "Shape", "impl": "sphere", "prop": {
            "subdivision": 3,
            "surface": {"impl": "glass", "prop": {
                "kr": {"impl": "constant", "prop": {"v": [1, 1, 1]}},
                "kt": {"impl": "constant", "prop": {"v": [1, 1, 1]}},
                "eta": 1.5,
                "dispersion": 0.01
            }}
        }},
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "shapes": ["@prismatic"],
            "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}},
            "spectrum": {"impl": "hero"}
        }
    }"#;
    let pipeline = build_pipeline(source);
    let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z);
    let it = pipeline.intersect(&ray).expect("ray must hit the sphere");

    let mut swl = pipeline.spectrum().sample(0.3);
    let surface = pipeline.surfaces().get(it.handle.surface_tag());
    let closure = surface.closure(&pipeline, &it, &swl, 0.0);
    assert!(closure.is_dispersive());
    let eta = closure.eta().unwrap();
    assert!(eta > 1.5, "Cauchy dispersion must raise eta, got {eta}");

    // Head-on incidence transmits for most lobe selectors (Fresnel
    // reflectance is about 4%); transmission collapses the bundle.
    let sample = closure.sample(Vec3::Z, 0.9, Vec2::new(0.5, 0.5));
    assert_eq!(sample.event, LobeEvent::Transmit);
    assert!(!swl.secondary_terminated());
    swl.terminate_secondary();
    assert!(swl.secondary_terminated());
}
