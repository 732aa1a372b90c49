//! Shader templates
//!
//! Shader text is opaque to the renderer. A [`ShaderLibrary`] hands out one
//! [`ShaderTemplate`] per [`ShaderId`]; the program cache prepends the
//! permutation's `#define` block and links the result.

use std::collections::HashMap;
use std::rc::Rc;

use crate::foundation::ids::{IdAllocator, ShaderSourceId};

/// Identifies a shader family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    /// Unlit
    Basic,
    /// Per-vertex diffuse
    Lambert,
    /// Per-fragment specular
    Phong,
    /// Depth visualization
    Depth,
    /// Normal visualization
    Normal,
    /// Solid lines
    LineBasic,
    /// Dashed lines
    LineDashed,
    /// Point sprites
    Points,
    /// Caller supplied template
    Custom(ShaderSourceId),
}

/// Vertex and fragment text plus the names the renderer should look up
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderTemplate {
    id: ShaderSourceId,
    /// Vertex stage source, without the define prefix
    pub vertex: String,
    /// Fragment stage source, without the define prefix
    pub fragment: String,
    /// Extra uniforms to resolve after linking
    pub uniforms: Vec<String>,
    /// Extra attributes to resolve after linking
    pub attributes: Vec<String>,
}

impl ShaderTemplate {
    /// Template with a fresh source id
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: IdAllocator::shader_source(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Builder: extra uniform names
    pub fn with_uniforms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniforms.extend(names.into_iter().map(Into::into));
        self
    }

    /// Builder: extra attribute names
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Source id, used as the permutation key of custom shaders
    pub fn id(&self) -> ShaderSourceId {
        self.id
    }
}

/// Source of shader templates
pub trait ShaderLibrary {
    /// Template for a shader family, `None` if unknown
    fn template(&self, id: ShaderId) -> Option<Rc<ShaderTemplate>>;
}

/// HashMap-backed library filled by the host
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<ShaderId, Rc<ShaderTemplate>>,
}

impl TemplateCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a minimal template for every built-in family
    ///
    /// The templates declare the standard attribute and uniform names and
    /// do nothing else; hosts replace them with real shader text.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for id in [
            ShaderId::Basic,
            ShaderId::Lambert,
            ShaderId::Phong,
            ShaderId::Depth,
            ShaderId::Normal,
            ShaderId::LineBasic,
            ShaderId::LineDashed,
            ShaderId::Points,
        ] {
            catalog.insert(id, ShaderTemplate::new(MINIMAL_VERTEX, MINIMAL_FRAGMENT));
        }
        catalog
    }

    /// Register or replace a template
    pub fn insert(&mut self, id: ShaderId, template: ShaderTemplate) {
        self.templates.insert(id, Rc::new(template));
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl ShaderLibrary for TemplateCatalog {
    fn template(&self, id: ShaderId) -> Option<Rc<ShaderTemplate>> {
        self.templates.get(&id).cloned()
    }
}

/// A library that answers one custom id before deferring to another
pub struct WithCustom<'a> {
    base: &'a dyn ShaderLibrary,
    custom: Rc<ShaderTemplate>,
}

impl<'a> WithCustom<'a> {
    /// Overlay `custom` on `base`
    pub fn new(base: &'a dyn ShaderLibrary, custom: Rc<ShaderTemplate>) -> Self {
        Self { base, custom }
    }
}

impl ShaderLibrary for WithCustom<'_> {
    fn template(&self, id: ShaderId) -> Option<Rc<ShaderTemplate>> {
        match id {
            ShaderId::Custom(source) if source == self.custom.id() => Some(Rc::clone(&self.custom)),
            other => self.base.template(other),
        }
    }
}

const MINIMAL_VERTEX: &str = "\
uniform mat4 modelMatrix;
uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;
uniform mat3 normalMatrix;
uniform vec3 cameraPosition;
attribute vec3 position;
attribute vec3 normal;
attribute vec2 uv;
attribute vec2 uv2;
attribute vec3 color;
attribute vec4 tangent;
void main() {
    gl_Position = projectionMatrix * modelViewMatrix * vec4(position, 1.0);
}
";

const MINIMAL_FRAGMENT: &str = "\
uniform vec3 diffuse;
uniform float opacity;
uniform float size;
uniform float scale;
uniform sampler2D map;
void main() {
    gl_FragColor = vec4(diffuse, opacity);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_covers_every_family() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.template(ShaderId::Phong).is_some());
    }

    #[test]
    fn test_custom_overlay_resolves_only_its_own_id() {
        let catalog = TemplateCatalog::builtin();
        let custom = Rc::new(ShaderTemplate::new("void main() {}", "void main() {}"));
        let other = ShaderTemplate::new("", "");
        let layered = WithCustom::new(&catalog, Rc::clone(&custom));

        assert!(layered.template(ShaderId::Custom(custom.id())).is_some());
        assert!(layered.template(ShaderId::Custom(other.id())).is_none());
        assert!(layered.template(ShaderId::Basic).is_some());
    }
}
