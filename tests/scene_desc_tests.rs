//! Scene Description Tests
//!
//! Tests for:
//! - SceneDesc: declare/define/reference semantics and error cases
//! - Parser: JSON notation, internal nodes, lists, macro substitution
//! - Graph: structural idempotence, validation, recursion cap
//! - Typed scene: plug-in resolution, tag checking, node dedup

use prism::errors::PrismError;
use prism::sdl::{SceneDesc, SceneNodeTag, SceneParser, SourceLocation};
use prism::{MacroMap, Scene};

fn parse(source: &str) -> prism::Result<prism::SceneGraph> {
    SceneParser::parse_source(source, &MacroMap::default())
}

const WELL_FORMED: &str = r#"{
    "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [16, 16]}},
    "white": {"type": "Texture", "impl": "constant", "prop": {"v": [0.8, 0.8, 0.8]}},
    "floor_surface": {
        "type": "Surface", "impl": "matte",
        "prop": {"kd": "@white"}
    },
    "floor": {
        "type": "Shape", "impl": "mesh",
        "prop": {
            "surface": "@floor_surface",
            "positions": [-1, 0, -1, 1, 0, -1, 1, 0, 1, -1, 0, 1],
            "indices": [0, 2, 1, 0, 3, 2]
        }
    },
    "camera": {
        "type": "Camera", "impl": "pinhole",
        "prop": {
            "film": "@film",
            "spp": 4,
            "transform": {"impl": "matrix", "prop": {"translate": [0, 1, 4]}}
        }
    },
    "render": {
        "integrator": {"impl": "megapath", "prop": {"depth": 4}},
        "cameras": ["@camera"],
        "shapes": ["@floor"],
        "environment": {"impl": "constant", "prop": {"emission": [1, 1, 1]}}
    }
}"#;

// ============================================================================
// Graph Construction & Idempotence
// ============================================================================

#[test]
fn parse_well_formed_scene() {
    let graph = parse(WELL_FORMED).unwrap();
    assert!(graph.global("camera").is_some());
    assert_eq!(
        graph.global("floor").unwrap().tag(),
        Some(SceneNodeTag::Shape)
    );
}

#[test]
fn parsing_twice_is_structurally_equal() {
    let a = parse(WELL_FORMED).unwrap();
    let b = parse(WELL_FORMED).unwrap();
    assert!(a.structurally_equal(&b));
}

#[test]
fn structural_equality_detects_differences() {
    let a = parse(WELL_FORMED).unwrap();
    let changed = WELL_FORMED.replace("\"depth\": 4", "\"depth\": 5");
    let b = parse(&changed).unwrap();
    assert!(!a.structurally_equal(&b));
}

#[test]
fn macro_substitution_applies_before_parse() {
    let source = WELL_FORMED.replace("\"spp\": 4", "\"spp\": ${spp}");
    let mut macros = MacroMap::default();
    macros.insert("spp".to_string(), "32".to_string());
    let graph = SceneParser::parse_source(&source, &macros).unwrap();
    let camera = graph.global("camera").unwrap();
    assert_eq!(camera.u32_prop_or("spp", 0).unwrap(), 32);
}

// ============================================================================
// Validation & Error Cases
// ============================================================================

#[test]
fn dangling_reference_fails_at_freeze() {
    let source = WELL_FORMED.replace("\"@floor_surface\"", "\"@missing_surface\"");
    let err = parse(&source).unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }), "got {err}");
}

#[test]
fn missing_root_fails_at_freeze() {
    let err = parse(r#"{"film": {"type": "Film", "impl": "rgb"}}"#).unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }));
}

#[test]
fn unknown_tag_fails() {
    let err = parse(r#"{"x": {"type": "Widget", "impl": "rgb"}, "render": {}}"#).unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }));
}

#[test]
fn empty_property_list_fails() {
    let source = WELL_FORMED.replace("[\"@floor\"]", "[]");
    assert!(parse(&source).is_err());
}

#[test]
fn deep_recursion_hits_the_cap() {
    // Nest internal nodes well past the validation depth cap.
    let mut inner = String::from(r#"{"impl": "constant", "prop": {"v": 1}}"#);
    for _ in 0..40 {
        inner = format!(r#"{{"impl": "checker", "prop": {{"scale": 1, "child": {inner}}}}}"#);
    }
    let source = format!(
        r#"{{
            "film": {{"type": "Film", "impl": "rgb"}},
            "deep": {{"type": "Texture", "impl": "checker", "prop": {{"nested": {inner}}}}},
            "render": {{
                "integrator": {{"impl": "megapath"}}
            }}
        }}"#
    );
    let err = parse(&source).unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }));
}

#[test]
fn scene_desc_rejects_root_redefinition() {
    let desc = SceneDesc::new();
    desc.define_root(SourceLocation::unknown()).unwrap();
    assert!(desc.define_root(SourceLocation::unknown()).is_err());
}

#[test]
fn scene_desc_rejects_node_redefinition() {
    let desc = SceneDesc::new();
    desc.define(
        "x",
        SceneNodeTag::Texture,
        "constant",
        SourceLocation::unknown(),
        None,
    )
    .unwrap();
    let err = desc
        .define(
            "x",
            SceneNodeTag::Texture,
            "constant",
            SourceLocation::unknown(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }));
}

#[test]
fn scene_desc_rejects_tag_mismatch_with_declaration() {
    let desc = SceneDesc::new();
    desc.declare("x", SceneNodeTag::Texture).unwrap();
    let err = desc
        .define(
            "x",
            SceneNodeTag::Surface,
            "matte",
            SourceLocation::unknown(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }));
}

#[test]
fn scene_desc_honors_forward_declarations() {
    let desc = SceneDesc::new();
    let declared = desc.declare("x", SceneNodeTag::Texture).unwrap();
    let referenced = desc.reference("x").unwrap();
    assert_eq!(declared, referenced);
    let defined = desc
        .define(
            "x",
            SceneNodeTag::Texture,
            "constant",
            SourceLocation::unknown(),
            None,
        )
        .unwrap();
    assert_eq!(declared, defined);
}

#[test]
fn scene_desc_rejects_structural_tags_as_globals() {
    let desc = SceneDesc::new();
    assert!(desc.declare("x", SceneNodeTag::Internal).is_err());
    assert!(desc.declare("x", SceneNodeTag::Root).is_err());
    assert!(desc
        .define(
            "render",
            SceneNodeTag::Texture,
            "constant",
            SourceLocation::unknown(),
            None,
        )
        .is_err());
}

// ============================================================================
// Typed Scene Loading
// ============================================================================

#[test]
fn typed_scene_loads_well_formed_graph() {
    let graph = parse(WELL_FORMED).unwrap();
    let scene = Scene::create(&graph).unwrap();
    assert_eq!(scene.cameras().len(), 1);
    assert_eq!(scene.shapes().len(), 1);
    assert!(scene.environment().is_some());
}

#[test]
fn reference_with_wrong_tag_fails_at_load() {
    // `floor` is a shape; using it as a surface must fail.
    let source = WELL_FORMED.replace("\"surface\": \"@floor_surface\"", "\"surface\": \"@film\"");
    let graph = parse(&source).unwrap();
    let err = Scene::create(&graph).unwrap_err();
    assert!(matches!(err, PrismError::Schema { .. }), "got {err}");
}

#[test]
fn unknown_plugin_fails_at_load() {
    let source = WELL_FORMED.replace("\"impl\": \"matte\"", "\"impl\": \"warp\"");
    let graph = parse(&source).unwrap();
    let err = Scene::create(&graph).unwrap_err();
    assert!(matches!(err, PrismError::Plugin(_)), "got {err}");
}

#[test]
fn base_inheritance_fills_missing_properties() {
    let source = r#"{
        "film": {"type": "Film", "impl": "rgb", "prop": {"resolution": [8, 8]}},
        "proto": {"type": "Camera", "impl": "pinhole", "prop": {"film": "@film", "spp": 7}},
        "camera": {"type": "Camera", "impl": "pinhole", "base": "@proto", "prop": {"fov": 60}},
        "render": {
            "integrator": {"impl": "megapath"},
            "cameras": ["@camera"],
            "environment": {"impl": "constant"}
        }
    }"#;
    let graph = parse(source).unwrap();
    let scene = Scene::create(&graph).unwrap();
    assert_eq!(scene.cameras()[0].spp(), 7);
}
