use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use crate::errors::{PrismError, Result};
use crate::sdl::desc::SceneGraph;
use crate::sdl::tag::SceneNodeTag;

/// Index of a node inside its owning description graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// Position in a scene description file, carried into error messages.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    file: Option<Arc<PathBuf>>,
    line: u32,
    column: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: Arc<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file),
            line,
            column,
        }
    }

    /// A location pointing at a file as a whole.
    #[must_use]
    pub fn file(file: Arc<PathBuf>) -> Self {
        Self {
            file: Some(file),
            line: 0,
            column: 0,
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        self.file.is_some()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) if self.line > 0 => {
                write!(f, " [{}:{}:{}]", file.display(), self.line, self.column)
            }
            Some(file) => write!(f, " [{}]", file.display()),
            None => Ok(()),
        }
    }
}

/// A property value: a non-empty homogeneous list. Singletons are lists
/// of length one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(Vec<bool>),
    Number(Vec<f64>),
    String(Vec<String>),
    Node(Vec<NodeId>),
}

impl Value {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::Bool(v) => v.len(),
            Value::Number(v) => v.len(),
            Value::String(v) => v.len(),
            Value::Node(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Node(_) => "node",
        }
    }
}

/// One entity in the description graph.
///
/// Global nodes carry a stable identifier; internal nodes have an empty
/// identifier and are owned by exactly one parent through its
/// `internal_children` list. Until a node is defined its `impl_type` is
/// empty; forward references leave `tag` unset until declaration.
#[derive(Debug)]
pub struct SceneNodeDesc {
    pub(crate) identifier: String,
    pub(crate) tag: Option<SceneNodeTag>,
    pub(crate) impl_type: String,
    pub(crate) location: SourceLocation,
    pub(crate) base: Option<NodeId>,
    pub(crate) properties: Vec<(String, Value)>,
    pub(crate) internal_children: Vec<NodeId>,
}

impl SceneNodeDesc {
    pub(crate) fn new(identifier: impl Into<String>, tag: Option<SceneNodeTag>) -> Self {
        Self {
            identifier: identifier.into(),
            tag,
            impl_type: String::new(),
            location: SourceLocation::unknown(),
            base: None,
            properties: Vec::new(),
            internal_children: Vec::new(),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn tag(&self) -> Option<SceneNodeTag> {
        self.tag
    }

    #[must_use]
    pub fn impl_type(&self) -> &str {
        &self.impl_type
    }

    #[must_use]
    pub fn source_location(&self) -> &SourceLocation {
        &self.location
    }

    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.impl_type.is_empty()
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.tag == Some(SceneNodeTag::Internal)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.tag == Some(SceneNodeTag::Root)
    }

    #[must_use]
    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    pub(crate) fn find_property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A node bound to its graph, giving typed property access with `base`
/// inheritance.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    pub(crate) graph: &'a SceneGraph,
    pub(crate) id: NodeId,
}

macro_rules! scalar_getter {
    ($name:ident, $or:ident, $ty:ty, $conv:expr) => {
        pub fn $name(&self, name: &str) -> Result<$ty> {
            let v = self.number_list(name)?;
            Ok($conv(v[0]))
        }

        pub fn $or(&self, name: &str, default: $ty) -> Result<$ty> {
            match self.lookup(name) {
                Some(_) => self.$name(name),
                None => Ok(default),
            }
        }
    };
}

impl<'a> NodeView<'a> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn desc(&self) -> &'a SceneNodeDesc {
        self.graph.desc(self.id)
    }

    #[must_use]
    pub fn identifier(&self) -> &'a str {
        self.desc().identifier()
    }

    #[must_use]
    pub fn tag(&self) -> Option<SceneNodeTag> {
        self.desc().tag()
    }

    #[must_use]
    pub fn impl_type(&self) -> &'a str {
        self.desc().impl_type()
    }

    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.desc().source_location().clone()
    }

    /// Looks up a property on this node, falling back through the `base`
    /// chain (bounded, matching the graph recursion cap).
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        let mut node = self.desc();
        for _ in 0..SceneGraph::MAX_DEPTH {
            if let Some(v) = node.find_property(name) {
                return Some(v);
            }
            match node.base {
                Some(base) => node = self.graph.desc(base),
                None => return None,
            }
        }
        None
    }

    fn missing(&self, name: &str, expected: &str) -> PrismError {
        PrismError::schema(
            format!(
                "node '{}' has no '{}' property of type {}",
                self.display_name(),
                name,
                expected
            ),
            self.location(),
        )
    }

    fn display_name(&self) -> String {
        let desc = self.desc();
        if desc.identifier.is_empty() {
            format!(
                "<{}:{}>",
                desc.tag.map_or("?", SceneNodeTag::description),
                desc.impl_type
            )
        } else {
            desc.identifier.clone()
        }
    }

    // ------------------------------------------------------------------
    // List getters
    // ------------------------------------------------------------------

    pub fn number_list(&self, name: &str) -> Result<&'a [f64]> {
        match self.lookup(name) {
            Some(Value::Number(v)) => Ok(v),
            Some(other) => Err(PrismError::schema(
                format!(
                    "property '{}' of node '{}' has type {}, expected number",
                    name,
                    self.display_name(),
                    other.type_name()
                ),
                self.location(),
            )),
            None => Err(self.missing(name, "number")),
        }
    }

    pub fn bool_list(&self, name: &str) -> Result<&'a [bool]> {
        match self.lookup(name) {
            Some(Value::Bool(v)) => Ok(v),
            Some(other) => Err(PrismError::schema(
                format!(
                    "property '{}' of node '{}' has type {}, expected bool",
                    name,
                    self.display_name(),
                    other.type_name()
                ),
                self.location(),
            )),
            None => Err(self.missing(name, "bool")),
        }
    }

    pub fn string_list(&self, name: &str) -> Result<&'a [String]> {
        match self.lookup(name) {
            Some(Value::String(v)) => Ok(v),
            Some(other) => Err(PrismError::schema(
                format!(
                    "property '{}' of node '{}' has type {}, expected string",
                    name,
                    self.display_name(),
                    other.type_name()
                ),
                self.location(),
            )),
            None => Err(self.missing(name, "string")),
        }
    }

    pub fn node_list(&self, name: &str) -> Result<Vec<NodeView<'a>>> {
        match self.lookup(name) {
            Some(Value::Node(v)) => Ok(v
                .iter()
                .map(|&id| NodeView {
                    graph: self.graph,
                    id,
                })
                .collect()),
            Some(other) => Err(PrismError::schema(
                format!(
                    "property '{}' of node '{}' has type {}, expected node",
                    name,
                    self.display_name(),
                    other.type_name()
                ),
                self.location(),
            )),
            None => Err(self.missing(name, "node")),
        }
    }

    pub fn node_list_or_empty(&self, name: &str) -> Result<Vec<NodeView<'a>>> {
        match self.lookup(name) {
            Some(_) => self.node_list(name),
            None => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Scalar getters
    // ------------------------------------------------------------------

    scalar_getter!(f32_prop, f32_prop_or, f32, |v: f64| v as f32);
    scalar_getter!(f64_prop, f64_prop_or, f64, |v: f64| v);
    scalar_getter!(u32_prop, u32_prop_or, u32, |v: f64| v as u32);
    scalar_getter!(i32_prop, i32_prop_or, i32, |v: f64| v as i32);

    pub fn bool_prop(&self, name: &str) -> Result<bool> {
        Ok(self.bool_list(name)?[0])
    }

    pub fn bool_prop_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.lookup(name) {
            Some(_) => self.bool_prop(name),
            None => Ok(default),
        }
    }

    pub fn string_prop(&self, name: &str) -> Result<&'a str> {
        Ok(self.string_list(name)?[0].as_str())
    }

    pub fn string_prop_or(&self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.lookup(name) {
            Some(_) => self.string_prop(name),
            None => Ok(default),
        }
    }

    pub fn node_prop(&self, name: &str) -> Result<NodeView<'a>> {
        Ok(self.node_list(name)?[0])
    }

    pub fn node_prop_or_none(&self, name: &str) -> Result<Option<NodeView<'a>>> {
        match self.lookup(name) {
            Some(_) => Ok(Some(self.node_prop(name)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Vector getters
    // ------------------------------------------------------------------

    fn numbers_exact(&self, name: &str, n: usize) -> Result<&'a [f64]> {
        let v = self.number_list(name)?;
        if v.len() != n {
            return Err(PrismError::schema(
                format!(
                    "property '{}' of node '{}' has {} element(s), expected {}",
                    name,
                    self.display_name(),
                    v.len(),
                    n
                ),
                self.location(),
            ));
        }
        Ok(v)
    }

    pub fn vec2_prop(&self, name: &str) -> Result<Vec2> {
        let v = self.numbers_exact(name, 2)?;
        Ok(Vec2::new(v[0] as f32, v[1] as f32))
    }

    pub fn vec3_prop(&self, name: &str) -> Result<Vec3> {
        let v = self.numbers_exact(name, 3)?;
        Ok(Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32))
    }

    pub fn vec3_prop_or(&self, name: &str, default: Vec3) -> Result<Vec3> {
        match self.lookup(name) {
            Some(_) => self.vec3_prop(name),
            None => Ok(default),
        }
    }

    /// A vec3 property that also accepts a scalar splatted to all lanes.
    pub fn vec3_prop_or_splat(&self, name: &str, default: Vec3) -> Result<Vec3> {
        match self.lookup(name) {
            Some(Value::Number(v)) if v.len() == 1 => Ok(Vec3::splat(v[0] as f32)),
            Some(_) => self.vec3_prop(name),
            None => Ok(default),
        }
    }

    pub fn vec4_prop(&self, name: &str) -> Result<Vec4> {
        let v = self.numbers_exact(name, 4)?;
        Ok(Vec4::new(
            v[0] as f32,
            v[1] as f32,
            v[2] as f32,
            v[3] as f32,
        ))
    }

    pub fn uvec2_prop_or(&self, name: &str, default: (u32, u32)) -> Result<(u32, u32)> {
        match self.lookup(name) {
            Some(Value::Number(v)) if v.len() == 1 => Ok((v[0] as u32, v[0] as u32)),
            Some(_) => {
                let v = self.numbers_exact(name, 2)?;
                Ok((v[0] as u32, v[1] as u32))
            }
            None => Ok(default),
        }
    }
}
