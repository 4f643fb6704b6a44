use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{PrismError, Result};
use crate::sdl::node::{NodeId, NodeView, SceneNodeDesc, SourceLocation, Value};
use crate::sdl::tag::SceneNodeTag;

/// The sentinel identifier binding the root node.
pub const ROOT_IDENTIFIER: &str = "render";

/// A scene description under construction.
///
/// Thread-safe for concurrent `declare`/`define`/`reference` on distinct
/// identifiers (parallel imports funnel into one graph); property mutation
/// on a single node is driven by the one parser that owns it. Freezing
/// validates the graph and yields an immutable [`SceneGraph`].
pub struct SceneDesc {
    inner: Mutex<DescInner>,
}

struct DescInner {
    nodes: Vec<SceneNodeDesc>,
    globals: FxHashMap<String, NodeId>,
    root: Option<NodeId>,
    paths: Vec<Arc<PathBuf>>,
}

impl SceneDesc {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DescInner {
                nodes: Vec::new(),
                globals: FxHashMap::default(),
                root: None,
                paths: Vec::new(),
            }),
        }
    }

    /// Registers a source file path shared by the location records of
    /// everything parsed from it.
    pub fn register_path(&self, path: &Path) -> Arc<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let arc = Arc::new(canonical);
        self.inner.lock().paths.push(arc.clone());
        arc
    }

    /// Forward-declares a global node with its tag.
    pub fn declare(&self, identifier: &str, tag: SceneNodeTag) -> Result<NodeId> {
        if tag == SceneNodeTag::Internal {
            return Err(PrismError::schema_unlocated(format!(
                "invalid forward declaration of internal node '{identifier}'"
            )));
        }
        if tag == SceneNodeTag::Root || identifier == ROOT_IDENTIFIER {
            return Err(PrismError::schema_unlocated(
                "invalid forward declaration of root node",
            ));
        }
        let mut inner = self.inner.lock();
        let id = inner.get_or_insert(identifier);
        let node = &mut inner.nodes[id.0 as usize];
        match node.tag {
            None => node.tag = Some(tag),
            Some(t) if t != tag => {
                return Err(PrismError::schema_unlocated(format!(
                    "forward declaration of node '{identifier}' has a different tag \
                     '{tag}' from '{t}' in previous declarations"
                )));
            }
            Some(_) => {}
        }
        Ok(id)
    }

    /// Defines a global node body.
    pub fn define(
        &self,
        identifier: &str,
        tag: SceneNodeTag,
        impl_type: &str,
        location: SourceLocation,
        base: Option<NodeId>,
    ) -> Result<NodeId> {
        if identifier == ROOT_IDENTIFIER || tag == SceneNodeTag::Root {
            return Err(PrismError::schema(
                "defining the root node as a normal global node is not allowed",
                location,
            ));
        }
        if tag == SceneNodeTag::Internal {
            return Err(PrismError::schema(
                format!("defining internal node '{identifier}' as a global node is not allowed"),
                location,
            ));
        }
        let mut inner = self.inner.lock();
        let id = inner.get_or_insert(identifier);
        let node = &mut inner.nodes[id.0 as usize];
        if node.is_defined() {
            return Err(PrismError::schema(
                format!("redefinition of node '{identifier}' in scene description"),
                location,
            ));
        }
        match node.tag {
            None => node.tag = Some(tag),
            Some(t) if t != tag => {
                return Err(PrismError::schema(
                    format!(
                        "definition of node '{identifier}' has a different tag '{tag}' \
                         from '{t}' in previous declarations"
                    ),
                    location,
                ));
            }
            Some(_) => {}
        }
        node.impl_type = impl_type.to_string();
        node.location = location;
        node.base = base;
        Ok(id)
    }

    /// Defines the root node, addressed by [`ROOT_IDENTIFIER`].
    pub fn define_root(&self, location: SourceLocation) -> Result<NodeId> {
        let mut inner = self.inner.lock();
        if inner.root.is_some() {
            return Err(PrismError::schema(
                "redefinition of root node in scene description",
                location,
            ));
        }
        let id = NodeId(inner.nodes.len() as u32);
        let mut node = SceneNodeDesc::new(ROOT_IDENTIFIER, Some(SceneNodeTag::Root));
        node.impl_type = ROOT_IDENTIFIER.to_string();
        node.location = location;
        inner.nodes.push(node);
        inner.root = Some(id);
        Ok(id)
    }

    /// Defines an anonymous node owned by `parent`.
    pub fn define_internal(
        &self,
        parent: NodeId,
        impl_type: &str,
        location: SourceLocation,
        base: Option<NodeId>,
    ) -> Result<NodeId> {
        let mut inner = self.inner.lock();
        let id = NodeId(inner.nodes.len() as u32);
        let mut node = SceneNodeDesc::new("", Some(SceneNodeTag::Internal));
        node.impl_type = impl_type.to_string();
        node.location = location;
        node.base = base;
        inner.nodes.push(node);
        inner.nodes[parent.0 as usize].internal_children.push(id);
        Ok(id)
    }

    /// Resolves an identifier to a node, creating an undefined placeholder
    /// for forward references. Placeholders must be defined before freeze.
    pub fn reference(&self, identifier: &str) -> Result<NodeId> {
        if identifier == ROOT_IDENTIFIER {
            return Err(PrismError::schema_unlocated(
                "the root node cannot be referenced",
            ));
        }
        if identifier.is_empty() {
            return Err(PrismError::schema_unlocated("empty reference identifier"));
        }
        Ok(self.inner.lock().get_or_insert(identifier))
    }

    /// Appends a property to a node. Properties are append-only until
    /// freeze; names must be unique per node and lists non-empty.
    pub fn add_property(&self, node: NodeId, name: &str, value: Value) -> Result<()> {
        if value.is_empty() {
            return Err(PrismError::schema_unlocated(format!(
                "empty list for property '{name}'"
            )));
        }
        let mut inner = self.inner.lock();
        let desc = &mut inner.nodes[node.0 as usize];
        if desc.find_property(name).is_some() {
            let location = desc.location.clone();
            return Err(PrismError::schema(
                format!(
                    "duplicate property '{}' on node '{}'",
                    name, desc.identifier
                ),
                location,
            ));
        }
        desc.properties.push((name.to_string(), value));
        Ok(())
    }

    /// Validates the graph and freezes it.
    ///
    /// Enforces: the root is defined, every declared or referenced node is
    /// defined, and recursion through node properties, bases, and internal
    /// children stays within the depth cap.
    pub fn freeze(self) -> Result<SceneGraph> {
        let inner = self.inner.into_inner();
        let Some(root) = inner.root else {
            return Err(PrismError::schema_unlocated(
                "root node is not defined in the scene description",
            ));
        };
        for node in &inner.nodes {
            if !node.is_defined() {
                return Err(PrismError::schema_unlocated(format!(
                    "node '{}' is declared or referenced but never defined",
                    node.identifier
                )));
            }
        }
        let graph = SceneGraph {
            nodes: inner.nodes,
            globals: inner.globals,
            root,
        };
        graph.check_depth(root, 0)?;
        for &id in graph.globals.values() {
            graph.check_depth(id, 0)?;
        }
        Ok(graph)
    }
}

impl Default for SceneDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl DescInner {
    fn get_or_insert(&mut self, identifier: &str) -> NodeId {
        if let Some(&id) = self.globals.get(identifier) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SceneNodeDesc::new(identifier, None));
        self.globals.insert(identifier.to_string(), id);
        id
    }
}

/// A frozen, validated scene description.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<SceneNodeDesc>,
    globals: FxHashMap<String, NodeId>,
    root: NodeId,
}

impl SceneGraph {
    /// Recursion cap for graph validation and `base` chains.
    pub const MAX_DEPTH: usize = 32;

    pub(crate) fn desc(&self, id: NodeId) -> &SceneNodeDesc {
        &self.nodes[id.0 as usize]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> NodeView<'_> {
        NodeView { graph: self, id }
    }

    #[must_use]
    pub fn root(&self) -> NodeView<'_> {
        self.node(self.root)
    }

    #[must_use]
    pub fn global(&self, identifier: &str) -> Option<NodeView<'_>> {
        self.globals.get(identifier).map(|&id| self.node(id))
    }

    #[must_use]
    pub fn global_identifiers(&self) -> Vec<&str> {
        self.globals.keys().map(String::as_str).collect()
    }

    fn check_depth(&self, id: NodeId, depth: usize) -> Result<()> {
        if depth > Self::MAX_DEPTH {
            return Err(PrismError::schema_unlocated(
                "scene description is too deep; recursion in definitions?",
            ));
        }
        let node = self.desc(id);
        if let Some(base) = node.base {
            self.check_depth(base, depth + 1)?;
        }
        for &child in &node.internal_children {
            self.check_depth(child, depth + 1)?;
        }
        for (_, value) in &node.properties {
            if let Value::Node(refs) = value {
                for &r in refs {
                    self.check_depth(r, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Structural equality under (identifier, tag, impl, ordered
    /// properties, internal children), independent of node id numbering.
    #[must_use]
    pub fn structurally_equal(&self, other: &SceneGraph) -> bool {
        let mut lhs: Vec<_> = self.globals.keys().collect();
        let mut rhs: Vec<_> = other.globals.keys().collect();
        lhs.sort();
        rhs.sort();
        if lhs != rhs {
            return false;
        }
        let mut visited = FxHashSet::default();
        if !self.nodes_equal(other, self.root, other.root, &mut visited) {
            return false;
        }
        for (name, &a) in &self.globals {
            let b = other.globals[name];
            if !self.nodes_equal(other, a, b, &mut visited) {
                return false;
            }
        }
        true
    }

    fn nodes_equal(
        &self,
        other: &SceneGraph,
        a: NodeId,
        b: NodeId,
        visited: &mut FxHashSet<(NodeId, NodeId)>,
    ) -> bool {
        if !visited.insert((a, b)) {
            return true;
        }
        let na = self.desc(a);
        let nb = other.desc(b);
        if na.identifier != nb.identifier
            || na.tag != nb.tag
            || na.impl_type != nb.impl_type
            || na.properties.len() != nb.properties.len()
            || na.internal_children.len() != nb.internal_children.len()
        {
            return false;
        }
        for ((name_a, va), (name_b, vb)) in na.properties.iter().zip(&nb.properties) {
            if name_a != name_b {
                return false;
            }
            let equal = match (va, vb) {
                (Value::Node(ra), Value::Node(rb)) => {
                    ra.len() == rb.len()
                        && ra
                            .iter()
                            .zip(rb)
                            .all(|(&x, &y)| self.nodes_equal(other, x, y, visited))
                }
                _ => va == vb,
            };
            if !equal {
                return false;
            }
        }
        na.internal_children
            .iter()
            .zip(&nb.internal_children)
            .all(|(&x, &y)| self.nodes_equal(other, x, y, visited))
    }
}
