use std::path::Path;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;

use crate::errors::{PrismError, Result};
use crate::sdl::desc::{SceneDesc, SceneGraph, ROOT_IDENTIFIER};
use crate::sdl::node::{NodeId, SourceLocation, Value};
use crate::sdl::tag::SceneNodeTag;

/// CLI macro definitions substituted into scene text before parsing.
pub type MacroMap = FxHashMap<String, String>;

/// The JSON scene parser.
///
/// The top level of a scene file contains an optional `import` list of
/// relative paths, named global nodes (objects with `type`, `impl`,
/// optional `base`, and a `prop` map), and exactly one root node bound to
/// the `render` key. References use the `@identifier` sigil; inline
/// objects inside a property become internal nodes. Imports are parsed in
/// parallel on the global thread pool into the same description graph.
pub struct SceneParser;

impl SceneParser {
    /// Parses a scene file (and its imports) into a frozen graph.
    pub fn parse(path: &Path, macros: &MacroMap) -> Result<SceneGraph> {
        let desc = SceneDesc::new();
        parse_file(&desc, path, macros)?;
        desc.freeze()
    }

    /// Parses in-memory scene text. `import` directives are rejected as
    /// there is no directory to resolve them against.
    pub fn parse_source(source: &str, macros: &MacroMap) -> Result<SceneGraph> {
        let desc = SceneDesc::new();
        let substituted = substitute_macros(source, macros);
        let json: Json = serde_json::from_str(&substituted)?;
        parse_root(&desc, &json, SourceLocation::unknown(), None, macros)?;
        desc.freeze()
    }
}

fn substitute_macros(source: &str, macros: &MacroMap) -> String {
    let mut text = source.to_string();
    for (key, value) in macros {
        text = text.replace(&format!("${{{key}}}"), value);
    }
    text
}

fn parse_file(desc: &SceneDesc, path: &Path, macros: &MacroMap) -> Result<()> {
    let file = desc.register_path(path);
    let source = std::fs::read_to_string(&*file).map_err(|e| {
        PrismError::schema(
            format!("failed to read scene file '{}': {e}", path.display()),
            SourceLocation::unknown(),
        )
    })?;
    let substituted = substitute_macros(&source, macros);
    let json: Json = serde_json::from_str(&substituted)?;
    let location = SourceLocation::file(file.clone());
    let dir = file.parent().map(Path::to_path_buf);
    parse_root(desc, &json, location, dir.as_deref(), macros)
}

fn parse_root(
    desc: &SceneDesc,
    json: &Json,
    location: SourceLocation,
    dir: Option<&Path>,
    macros: &MacroMap,
) -> Result<()> {
    let Json::Object(map) = json else {
        return Err(PrismError::schema(
            "scene description root must be a JSON object",
            location,
        ));
    };

    // Process imports first to fully utilize the thread pool.
    if let Some(import) = map.get("import") {
        parse_imports(desc, import, &location, dir, macros)?;
    }

    for (key, value) in map {
        if key == "import" {
            continue;
        }
        if key == ROOT_IDENTIFIER {
            if !value.is_object() {
                return Err(PrismError::schema("invalid render node", location));
            }
            let root = desc.define_root(location.clone())?;
            parse_node_properties(desc, root, value, &location)?;
            continue;
        }
        let Json::Object(body) = value else {
            return Err(PrismError::schema(
                format!("invalid global node '{key}'"),
                location,
            ));
        };
        for prop_key in body.keys() {
            if !matches!(prop_key.as_str(), "type" | "impl" | "base" | "prop") {
                return Err(PrismError::schema(
                    format!("invalid global node property '{key}.{prop_key}'"),
                    location,
                ));
            }
        }
        let type_desc = body
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| {
                PrismError::schema(format!("missing node type in global node '{key}'"), location.clone())
            })?;
        let tag = SceneNodeTag::parse(type_desc).ok_or_else(|| {
            PrismError::schema(
                format!("unknown scene node type '{type_desc}' in global node '{key}'"),
                location.clone(),
            )
        })?;
        let impl_desc = body
            .get("impl")
            .and_then(Json::as_str)
            .ok_or_else(|| {
                PrismError::schema(
                    format!("missing node impl in global node '{key}'"),
                    location.clone(),
                )
            })?;
        let base = match body.get("base") {
            Some(Json::String(s)) => Some(parse_reference(desc, s, &location)?),
            Some(_) => {
                return Err(PrismError::schema(
                    format!("invalid base node in global node '{key}'"),
                    location,
                ));
            }
            None => None,
        };
        let node = desc.define(key, tag, impl_desc, location.clone(), base)?;
        if let Some(prop) = body.get("prop") {
            parse_node_properties(desc, node, prop, &location)?;
        }
    }
    Ok(())
}

fn parse_imports(
    desc: &SceneDesc,
    import: &Json,
    location: &SourceLocation,
    dir: Option<&Path>,
    macros: &MacroMap,
) -> Result<()> {
    let Some(dir) = dir else {
        return Err(PrismError::schema(
            "imports are only available when parsing from a file",
            location.clone(),
        ));
    };
    let files: Vec<&str> = match import {
        Json::String(s) => vec![s.as_str()],
        Json::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    PrismError::schema("invalid import entry", location.clone())
                })
            })
            .collect::<Result<_>>()?,
        _ => {
            return Err(PrismError::schema("invalid import node", location.clone()));
        }
    };

    let errors: Mutex<Vec<PrismError>> = Mutex::new(Vec::new());
    rayon::scope(|scope| {
        for file in files {
            let path = dir.join(file);
            let errors = &errors;
            scope.spawn(move |_| {
                if let Err(e) = parse_file(desc, &path, macros) {
                    errors.lock().push(e);
                }
            });
        }
    });
    match errors.into_inner().into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn parse_reference(desc: &SceneDesc, name: &str, location: &SourceLocation) -> Result<NodeId> {
    let Some(identifier) = name.strip_prefix('@') else {
        return Err(PrismError::schema(
            format!("invalid reference name '{name}'"),
            location.clone(),
        ));
    };
    desc.reference(identifier)
}

fn parse_internal(
    desc: &SceneDesc,
    parent: NodeId,
    key: &str,
    json: &Json,
    location: &SourceLocation,
) -> Result<NodeId> {
    let Json::Object(body) = json else {
        return Err(PrismError::schema(
            format!("invalid inline node in property '{key}'"),
            location.clone(),
        ));
    };
    for prop_key in body.keys() {
        if !matches!(prop_key.as_str(), "type" | "impl" | "base" | "prop") {
            return Err(PrismError::schema(
                format!("invalid internal node property '{key}.{prop_key}'"),
                location.clone(),
            ));
        }
    }
    let impl_desc = body.get("impl").and_then(Json::as_str).ok_or_else(|| {
        PrismError::schema(
            format!("missing impl in inline node of property '{key}'"),
            location.clone(),
        )
    })?;
    let base = match body.get("base") {
        Some(Json::String(s)) => Some(parse_reference(desc, s, location)?),
        Some(_) => {
            return Err(PrismError::schema(
                format!("invalid base in inline node of property '{key}'"),
                location.clone(),
            ));
        }
        None => None,
    };
    let internal = desc.define_internal(parent, impl_desc, location.clone(), base)?;
    if let Some(prop) = body.get("prop") {
        parse_node_properties(desc, internal, prop, location)?;
    }
    Ok(internal)
}

fn parse_node_properties(
    desc: &SceneDesc,
    node: NodeId,
    json: &Json,
    location: &SourceLocation,
) -> Result<()> {
    let Json::Object(map) = json else {
        return Err(PrismError::schema(
            "node property map must be a JSON object",
            location.clone(),
        ));
    };
    for (key, value) in map {
        match value {
            Json::String(s) => {
                if s.starts_with('@') {
                    let reference = parse_reference(desc, s, location)?;
                    desc.add_property(node, key, Value::Node(vec![reference]))?;
                } else {
                    desc.add_property(node, key, Value::String(vec![s.clone()]))?;
                }
            }
            Json::Number(n) => {
                let v = n.as_f64().ok_or_else(|| {
                    PrismError::schema(
                        format!("invalid number in property '{key}'"),
                        location.clone(),
                    )
                })?;
                desc.add_property(node, key, Value::Number(vec![v]))?;
            }
            Json::Bool(b) => {
                desc.add_property(node, key, Value::Bool(vec![*b]))?;
            }
            Json::Array(items) => {
                let value = parse_array(desc, node, key, items, location)?;
                desc.add_property(node, key, value)?;
            }
            Json::Object(_) => {
                let internal = parse_internal(desc, node, key, value, location)?;
                desc.add_property(node, key, Value::Node(vec![internal]))?;
            }
            Json::Null => {}
        }
    }
    Ok(())
}

fn parse_array(
    desc: &SceneDesc,
    node: NodeId,
    key: &str,
    items: &[Json],
    location: &SourceLocation,
) -> Result<Value> {
    let Some(first) = items.first() else {
        return Err(PrismError::schema(
            format!("empty array is not allowed in property '{key}'"),
            location.clone(),
        ));
    };
    let heterogeneous = || {
        PrismError::schema(
            format!("property '{key}' must be a homogeneous list"),
            location.clone(),
        )
    };
    match first {
        Json::String(s) if s.starts_with('@') => {
            // Node list: a mix of references and inline objects.
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::String(s) => nodes.push(parse_reference(desc, s, location)?),
                    Json::Object(_) => {
                        nodes.push(parse_internal(desc, node, key, item, location)?);
                    }
                    _ => return Err(heterogeneous()),
                }
            }
            Ok(Value::Node(nodes))
        }
        Json::String(_) => {
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::String(s) => strings.push(s.clone()),
                    _ => return Err(heterogeneous()),
                }
            }
            Ok(Value::String(strings))
        }
        Json::Number(_) => {
            let mut numbers = Vec::with_capacity(items.len());
            for item in items {
                match item.as_f64() {
                    Some(v) => numbers.push(v),
                    None => return Err(heterogeneous()),
                }
            }
            Ok(Value::Number(numbers))
        }
        Json::Bool(_) => {
            let mut bools = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::Bool(b) => bools.push(*b),
                    _ => return Err(heterogeneous()),
                }
            }
            Ok(Value::Bool(bools))
        }
        Json::Object(_) => {
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::Object(_) => {
                        nodes.push(parse_internal(desc, node, key, item, location)?);
                    }
                    Json::String(s) => nodes.push(parse_reference(desc, s, location)?),
                    _ => return Err(heterogeneous()),
                }
            }
            Ok(Value::Node(nodes))
        }
        _ => Err(heterogeneous()),
    }
}
