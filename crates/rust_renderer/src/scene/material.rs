//! Material definitions
//!
//! A material describes *how* a surface is drawn: which shader family
//! (`MaterialKind`), which optional features are enabled, and the fixed
//! function state (blending, depth, culling, line width) applied around the
//! draw call. Materials are shared between nodes through [`MaterialRef`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::ids::{IdAllocator, MaterialId};
use crate::foundation::math::Color;
use crate::render::gpu::{BlendEquation, BlendFactor};
use crate::render::program::ShaderTemplate;
use crate::scene::texture::TextureRef;

/// Shared, single-threaded handle to a material
pub type MaterialRef = Rc<RefCell<Material>>;

/// Shader family of a material
#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Unlit color / texture
    Basic,
    /// Per-vertex diffuse lighting
    Lambert,
    /// Per-fragment specular lighting
    Phong,
    /// Visualizes depth
    Depth,
    /// Visualizes normals
    Normal,
    /// Solid lines
    LineBasic,
    /// Dashed lines
    LineDashed,
    /// Point sprites
    Points,
    /// Caller supplied shader text
    Shader(Rc<ShaderTemplate>),
}

/// Blending modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    /// Blending disabled
    NoBlending,
    /// Standard alpha blending
    #[default]
    Normal,
    /// Additive blending for particles and glows
    Additive,
    /// Subtractive blending
    Subtractive,
    /// Multiplicative blending
    Multiply,
    /// Explicit equation and factors
    Custom {
        /// Blend equation
        equation: BlendEquation,
        /// Source factor
        src: BlendFactor,
        /// Destination factor
        dst: BlendFactor,
    },
}

/// Which faces are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Front faces only
    #[default]
    Front,
    /// Back faces only
    Back,
    /// Both faces
    Double,
}

/// Source of per-vertex colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexColors {
    /// Colors are not uploaded
    #[default]
    None,
    /// Every corner gets the face color
    Face,
    /// Per-corner colors, falling back to the face color
    Vertex,
}

/// Normal interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shading {
    /// Face normal on every corner
    Flat,
    /// Per-corner normals when available
    #[default]
    Smooth,
}

/// Material resource
#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    /// Optional name for debugging
    pub name: Option<String>,
    /// Shader family
    pub kind: MaterialKind,
    /// Base color
    pub color: Color,
    /// Opacity in `[0, 1]`
    pub opacity: f32,
    /// Drawn in the back-to-front pass with blending
    pub transparent: bool,
    /// Blend mode
    pub blending: Blending,
    /// Depth test enabled
    pub depth_test: bool,
    /// Depth write enabled
    pub depth_write: bool,
    /// Polygon offset `(factor, units)`, `None` to disable
    pub polygon_offset: Option<(f32, f32)>,
    /// Faces drawn
    pub side: Side,
    /// Draw triangle edges instead of filled triangles
    pub wireframe: bool,
    /// Line width used for wireframe drawing
    pub wireframe_linewidth: f32,
    /// Line width used by line materials
    pub linewidth: f32,
    /// Per-vertex color source
    pub vertex_colors: VertexColors,
    /// Normal interpolation
    pub shading: Shading,
    /// Diffuse texture
    pub map: Option<TextureRef>,
    /// Environment texture
    pub env_map: Option<TextureRef>,
    /// Light map, sampled with the second UV layer
    pub light_map: Option<TextureRef>,
    /// Bump map
    pub bump_map: Option<TextureRef>,
    /// Tangent-space normal map
    pub normal_map: Option<TextureRef>,
    /// Specular intensity map
    pub specular_map: Option<TextureRef>,
    /// Skinned vertices
    pub skinning: bool,
    /// Morph target positions are blended
    pub morph_targets: bool,
    /// Morph target normals are blended
    pub morph_normals: bool,
    /// Scene fog applies
    pub fog: bool,
    /// Discard fragments with alpha below this threshold, `0.0` disables
    pub alpha_test: f32,
    /// Point size shrinks with distance
    pub size_attenuation: bool,
    /// Point size
    pub size: f32,
    /// Phong metal mode
    pub metal: bool,
    /// Lambert / Phong wrap-around lighting
    pub wrap_around: bool,
    /// Phong per-pixel lighting
    pub per_pixel: bool,
    /// Skip every entry using this material
    pub visible: bool,
    /// Program must be re-resolved on the next draw
    pub needs_update: bool,
}

impl Material {
    /// Material of the given kind with default state
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            id: IdAllocator::material(),
            name: None,
            kind,
            color: Color::WHITE,
            opacity: 1.0,
            transparent: false,
            blending: Blending::Normal,
            depth_test: true,
            depth_write: true,
            polygon_offset: None,
            side: Side::Front,
            wireframe: false,
            wireframe_linewidth: 1.0,
            linewidth: 1.0,
            vertex_colors: VertexColors::None,
            shading: Shading::Smooth,
            map: None,
            env_map: None,
            light_map: None,
            bump_map: None,
            normal_map: None,
            specular_map: None,
            skinning: false,
            morph_targets: false,
            morph_normals: false,
            fog: true,
            alpha_test: 0.0,
            size_attenuation: true,
            size: 1.0,
            metal: false,
            wrap_around: false,
            per_pixel: false,
            visible: true,
            needs_update: true,
        }
    }

    /// Unlit material
    pub fn basic(color: Color) -> Self {
        Self { color, ..Self::new(MaterialKind::Basic) }
    }

    /// Diffuse-lit material
    pub fn lambert(color: Color) -> Self {
        Self { color, ..Self::new(MaterialKind::Lambert) }
    }

    /// Specular-lit material
    pub fn phong(color: Color) -> Self {
        Self { color, ..Self::new(MaterialKind::Phong) }
    }

    /// Line material
    pub fn line_basic(color: Color) -> Self {
        Self { color, ..Self::new(MaterialKind::LineBasic) }
    }

    /// Point material
    pub fn points(color: Color, size: f32) -> Self {
        Self { color, size, ..Self::new(MaterialKind::Points) }
    }

    /// Custom shader material
    pub fn shader(template: Rc<ShaderTemplate>) -> Self {
        Self::new(MaterialKind::Shader(template))
    }

    /// Builder: make transparent with the given opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self.transparent = true;
        self
    }

    /// Builder: blending mode
    pub fn with_blending(mut self, blending: Blending) -> Self {
        self.blending = blending;
        self
    }

    /// Builder: drawn sides
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Builder: diffuse texture
    pub fn with_map(mut self, map: TextureRef) -> Self {
        self.map = Some(map);
        self
    }

    /// Builder: wireframe drawing
    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    /// Builder: debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Wrap in a shared handle
    pub fn into_shared(self) -> MaterialRef {
        Rc::new(RefCell::new(self))
    }

    /// Material id
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Textures referenced by this material
    pub fn textures(&self) -> impl Iterator<Item = &TextureRef> {
        [
            &self.map,
            &self.env_map,
            &self.light_map,
            &self.bump_map,
            &self.normal_map,
            &self.specular_map,
        ]
        .into_iter()
        .flatten()
    }

    /// Textures paired with the sampler uniform they feed
    pub fn named_textures(&self) -> impl Iterator<Item = (&'static str, &TextureRef)> {
        [
            ("map", &self.map),
            ("envMap", &self.env_map),
            ("lightMap", &self.light_map),
            ("bumpMap", &self.bump_map),
            ("normalMap", &self.normal_map),
            ("specularMap", &self.specular_map),
        ]
        .into_iter()
        .filter_map(|(name, texture)| texture.as_ref().map(|t| (name, t)))
    }
}

/// Material assignment of a mesh
#[derive(Debug, Clone)]
pub enum MeshMaterial {
    /// One material for every face
    Single(MaterialRef),
    /// Faces pick a material by `Face::material_index`
    PerFace(Vec<MaterialRef>),
}

impl MeshMaterial {
    /// Material used for faces with the given material index
    pub fn for_index(&self, index: usize) -> Option<&MaterialRef> {
        match self {
            Self::Single(material) => Some(material),
            Self::PerFace(materials) => materials.get(index),
        }
    }

    /// Every referenced material
    pub fn all(&self) -> &[MaterialRef] {
        match self {
            Self::Single(material) => std::slice::from_ref(material),
            Self::PerFace(materials) => materials,
        }
    }
}

impl From<MaterialRef> for MeshMaterial {
    fn from(material: MaterialRef) -> Self {
        Self::Single(material)
    }
}
