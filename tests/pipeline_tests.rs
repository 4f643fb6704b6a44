//! Pipeline Assembly Tests
//!
//! Tests for:
//! - Bindless table: id-space disjointness and slot contiguity
//! - Instance records: flags, tags, inheritance through groups
//! - Transform table: per-frame updates and refit
//! - Shared-resource memoization

use glam::Vec3;
use prism::compute::Ray;
use prism::pipeline::{InstanceFlags, InstanceHandle};
use prism::{MacroMap, Pipeline, Scene, SceneParser};

fn build_pipeline(source: &str) -> Pipeline {
    let graph = SceneParser::parse_source(source, &MacroMap::default()).unwrap();
    let scene = Scene::create(&graph).unwrap();
    Pipeline::create(&scene).unwrap()
}

const GROUPED_SCENE: &str = r#"{
    "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [8, 8]}},
    "camera": {"type": "Camera", "impl": "pinhole", "prop": {"film": "@film", "spp": 1}},
    "gray": {"type": "Texture", "impl": "constant", "prop": {"v": [0.5, 0.5, 0.5]}},
    "ball": {"type": "Shape", "impl": "sphere", "prop": {"subdivision": 1}},
    "pair": {
        "type": "Shape", "impl": "group",
        "prop": {
            "surface": {"impl": "matte", "prop": {"kd": "@gray"}},
            "transform": {"impl": "matrix", "prop": {"translate": [0, 0, -4]}},
            "shapes": ["@ball", {
                "impl": "sphere",
                "prop": {
                    "subdivision": 1,
                    "transform": {"impl": "matrix", "prop": {"translate": [3, 0, 0]}}
                }
            }]
        }
    },
    "render": {
        "integrator": {"impl": "megapath"},
        "cameras": ["@camera"],
        "shapes": ["@pair"],
        "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
    }
}"#;

// ============================================================================
// Bindless Table
// ============================================================================

#[test]
fn bindless_id_spaces_are_disjoint() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let bindless = pipeline.bindless();
    for id in 0..bindless.len() as u32 {
        let kinds = [
            bindless.is_buffer(id),
            bindless.is_tex2d(id),
            bindless.is_tex3d(id),
        ];
        assert_eq!(
            kinds.iter().filter(|&&k| k).count(),
            1,
            "id {id} must name exactly one resource kind"
        );
    }
}

#[test]
fn mesh_sub_buffers_are_contiguous_at_the_base() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let geometry = pipeline.geometry();
    for i in 0..geometry.instance_count() as u32 {
        let handle = geometry.instance(i);
        let base = handle.buffer_base();
        for slot in [
            InstanceHandle::VERTEX_SLOT,
            InstanceHandle::TRIANGLE_SLOT,
            InstanceHandle::ALIAS_SLOT,
            InstanceHandle::PDF_SLOT,
        ] {
            assert!(pipeline.bindless().is_buffer(base + slot));
        }
        assert_eq!(handle.triangle_count(), 20 * 4);
    }
}

#[test]
fn instance_handles_are_stable_after_build() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let first: Vec<InstanceHandle> = (0..pipeline.geometry().instance_count() as u32)
        .map(|i| pipeline.geometry().instance(i))
        .collect();
    let again: Vec<InstanceHandle> = (0..pipeline.geometry().instance_count() as u32)
        .map(|i| pipeline.geometry().instance(i))
        .collect();
    assert_eq!(first, again);
}

// ============================================================================
// Instance Records & Inheritance
// ============================================================================

#[test]
fn group_children_inherit_the_surface() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let geometry = pipeline.geometry();
    assert_eq!(geometry.instance_count(), 2);
    for i in 0..2 {
        let handle = geometry.instance(i);
        assert!(handle.flags().contains(InstanceFlags::HAS_SURFACE));
        assert!(!handle.flags().contains(InstanceFlags::HAS_LIGHT));
        assert!(handle.flags().contains(InstanceFlags::HAS_VERTEX_NORMAL));
    }
    // Both instances share one surface node, so one dispatch tag.
    assert_eq!(pipeline.surfaces().len(), 1);
    assert_eq!(geometry.instance(0).surface_tag(), geometry.instance(1).surface_tag());
}

#[test]
fn shared_mesh_is_uploaded_once() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let geometry = pipeline.geometry();
    // `ball` appears once; the inline sphere is a distinct node, but the
    // subdivided geometry cache still shares vertices. The bindless base
    // differs only if the mesh nodes differ.
    let record_a = geometry.mesh_record(0);
    let record_b = geometry.mesh_record(1);
    assert_eq!(record_a.triangle_count, record_b.triangle_count);
}

#[test]
fn group_transform_places_instances_apart() {
    let pipeline = build_pipeline(GROUPED_SCENE);
    let a = pipeline.geometry().instance_to_world(0).w_axis.truncate();
    let b = pipeline.geometry().instance_to_world(1).w_axis.truncate();
    assert!((a - Vec3::new(0.0, 0.0, -4.0)).length() < 1e-5);
    assert!((b - Vec3::new(3.0, 0.0, -4.0)).length() < 1e-5);
}

// ============================================================================
// Per-Frame Transform Updates
// ============================================================================

#[test]
fn animated_transforms_update_and_refit() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [8, 8]}},
        "camera": {"type": "Camera", "impl": "pinhole",
                   "prop": {"film": "@film", "spp": 1, "time_span": [0, 1]}},
        "gray": {"type": "Texture", "impl": "constant", "prop": {"v": [0.5, 0.5, 0.5]}},
        "mover": {
            "type": "Shape", "impl": "sphere",
            "prop": {
                "subdivision": 1,
                "surface": {"impl": "matte", "prop": {"kd": "@gray"}},
                "transform": {"impl": "lerp", "prop": {
                    "time_points": [0, 1],
                    "transforms": [
                        {"impl": "matrix", "prop": {"translate": [-5, 0, 0]}},
                        {"impl": "matrix", "prop": {"translate": [5, 0, 0]}}
                    ]
                }}
            }
        },
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "shapes": ["@mover"],
            "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
        }
    }"#;
    let mut pipeline = build_pipeline(source);

    pipeline.update_geometry(0.0);
    let at_start = Ray::new(Vec3::new(-5.0, 0.0, 5.0), Vec3::NEG_Z);
    assert!(pipeline.intersect(&at_start).is_some());
    let at_end = Ray::new(Vec3::new(5.0, 0.0, 5.0), Vec3::NEG_Z);
    assert!(pipeline.intersect(&at_end).is_none());

    pipeline.update_geometry(1.0);
    assert!(pipeline.intersect(&at_start).is_none());
    assert!(pipeline.intersect(&at_end).is_some());
}

// ============================================================================
// Shared Resources
// ============================================================================

#[test]
fn hero_spectrum_registers_three_coefficient_volumes_once() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [4, 4]}},
        "camera": {"type": "Camera", "impl": "pinhole", "prop": {"film": "@film", "spp": 1}},
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "environment": {"impl": "constant"},
            "spectrum": {"impl": "hero"}
        }
    }"#;
    let pipeline = build_pipeline(source);
    let bindless = pipeline.bindless();
    let volumes = (0..bindless.len() as u32)
        .filter(|&id| bindless.is_tex3d(id))
        .count();
    assert_eq!(volumes, 3);
}
