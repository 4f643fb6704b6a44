use std::fmt;

/// The closed set of scene node categories.
///
/// A node's tag is fixed at declaration and never changes; the plug-in
/// loader resolves `(tag, impl)` pairs to constructors. `Internal` and
/// `Root` are structural tags that cannot be used for global nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneNodeTag {
    Camera,
    Film,
    Filter,
    Sampler,
    Integrator,
    Shape,
    Surface,
    Light,
    LightSampler,
    Transform,
    Texture,
    Environment,
    Spectrum,
    Medium,
    PhaseFunction,
    Internal,
    Root,
}

impl SceneNodeTag {
    /// Lowercase description, as used in plug-in module names.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            SceneNodeTag::Camera => "camera",
            SceneNodeTag::Film => "film",
            SceneNodeTag::Filter => "filter",
            SceneNodeTag::Sampler => "sampler",
            SceneNodeTag::Integrator => "integrator",
            SceneNodeTag::Shape => "shape",
            SceneNodeTag::Surface => "surface",
            SceneNodeTag::Light => "light",
            SceneNodeTag::LightSampler => "lightsampler",
            SceneNodeTag::Transform => "transform",
            SceneNodeTag::Texture => "texture",
            SceneNodeTag::Environment => "environment",
            SceneNodeTag::Spectrum => "spectrum",
            SceneNodeTag::Medium => "medium",
            SceneNodeTag::PhaseFunction => "phasefunction",
            SceneNodeTag::Internal => "internal",
            SceneNodeTag::Root => "root",
        }
    }

    /// Parses a `type` string from the scene description. Returns `None`
    /// for unknown names and for the structural tags, which are not valid
    /// global node types.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let tag = match name.to_ascii_lowercase().as_str() {
            "camera" => SceneNodeTag::Camera,
            "film" => SceneNodeTag::Film,
            "filter" => SceneNodeTag::Filter,
            "sampler" => SceneNodeTag::Sampler,
            "integrator" => SceneNodeTag::Integrator,
            "shape" => SceneNodeTag::Shape,
            "surface" => SceneNodeTag::Surface,
            "light" => SceneNodeTag::Light,
            "lightsampler" | "light-sampler" => SceneNodeTag::LightSampler,
            "transform" => SceneNodeTag::Transform,
            "texture" => SceneNodeTag::Texture,
            "environment" => SceneNodeTag::Environment,
            "spectrum" => SceneNodeTag::Spectrum,
            "medium" => SceneNodeTag::Medium,
            "phasefunction" | "phase-function" => SceneNodeTag::PhaseFunction,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for SceneNodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_descriptions() {
        for tag in [
            SceneNodeTag::Camera,
            SceneNodeTag::LightSampler,
            SceneNodeTag::PhaseFunction,
            SceneNodeTag::Spectrum,
        ] {
            assert_eq!(SceneNodeTag::parse(tag.description()), Some(tag));
        }
    }

    #[test]
    fn structural_tags_do_not_parse() {
        assert_eq!(SceneNodeTag::parse("internal"), None);
        assert_eq!(SceneNodeTag::parse("root"), None);
        assert_eq!(SceneNodeTag::parse("widget"), None);
    }
}
