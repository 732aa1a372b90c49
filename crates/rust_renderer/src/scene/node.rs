//! Scene nodes
//!
//! Every node owns a local transform and caches its world matrix. The kind
//! of object a node represents is a closed enum; the renderer only talks to
//! it through the capability methods on [`NodeKind`].

use crate::foundation::ids::ObjectId;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::scene::geometry::GeometryRef;
use crate::scene::light::Light;
use crate::scene::material::{MaterialRef, MeshMaterial};

slotmap::new_key_type! {
    /// Arena key of a node inside a [`Scene`](crate::scene::Scene)
    ///
    /// Keys are versioned, so a key held after its node was removed never
    /// resolves to a node inserted later in the same slot.
    pub struct NodeId;
}

/// How a line geometry's vertices are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineMode {
    /// Consecutive vertices form a strip
    Strip,
    /// Vertex pairs form separate segments
    Pieces,
}

/// Primitive a node is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// Indexed triangles, chunked into geometry groups
    Triangles,
    /// Non-indexed line strip
    LineStrip,
    /// Non-indexed line segments
    LinePieces,
    /// Non-indexed points
    Points,
}

/// Closed set of scene object variants
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure transform node
    Group,
    /// Triangle mesh
    Mesh {
        /// Faces and vertices
        geometry: GeometryRef,
        /// Material or per-face materials
        material: MeshMaterial,
    },
    /// Line strip or segments
    Line {
        /// Vertices and per-vertex colors
        geometry: GeometryRef,
        /// Line material
        material: MaterialRef,
        /// Connectivity
        mode: LineMode,
    },
    /// Point cloud
    Points {
        /// Vertices and per-vertex colors
        geometry: GeometryRef,
        /// Point material
        material: MaterialRef,
    },
    /// Light source
    Light(Light),
}

impl NodeKind {
    /// Geometry drawn by this node, if any
    pub fn geometry(&self) -> Option<&GeometryRef> {
        match self {
            Self::Mesh { geometry, .. }
            | Self::Line { geometry, .. }
            | Self::Points { geometry, .. } => Some(geometry),
            Self::Group | Self::Light(_) => None,
        }
    }

    /// Whether the node participates in frustum culling at all
    pub fn is_cullable(&self) -> bool {
        matches!(self, Self::Mesh { .. } | Self::Line { .. } | Self::Points { .. })
    }

    /// Primitive the node is drawn with
    pub fn draw_kind(&self) -> Option<DrawKind> {
        match self {
            Self::Mesh { .. } => Some(DrawKind::Triangles),
            Self::Line { mode: LineMode::Strip, .. } => Some(DrawKind::LineStrip),
            Self::Line { mode: LineMode::Pieces, .. } => Some(DrawKind::LinePieces),
            Self::Points { .. } => Some(DrawKind::Points),
            Self::Group | Self::Light(_) => None,
        }
    }

    /// Material used for faces of the given material index
    pub fn material_for(&self, material_index: usize) -> Option<&MaterialRef> {
        match self {
            Self::Mesh { material, .. } => material.for_index(material_index),
            Self::Line { material, .. } | Self::Points { material, .. } => Some(material),
            Self::Group | Self::Light(_) => None,
        }
    }

    /// Every material the node references
    pub fn materials(&self) -> &[MaterialRef] {
        match self {
            Self::Mesh { material, .. } => material.all(),
            Self::Line { material, .. } | Self::Points { material, .. } => {
                std::slice::from_ref(material)
            }
            Self::Group | Self::Light(_) => &[],
        }
    }

    /// Light carried by the node
    pub fn light(&self) -> Option<&Light> {
        match self {
            Self::Light(light) => Some(light),
            _ => None,
        }
    }
}

/// A node of the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub(crate) object_id: Option<ObjectId>,
    /// Debug name
    pub name: Option<String>,
    /// Object variant
    pub kind: NodeKind,
    /// Hidden nodes and their subtrees are skipped
    pub visible: bool,
    /// Test against the camera frustum before drawing
    pub frustum_culled: bool,
    /// Sort depth override
    pub render_depth: Option<f32>,
    /// Compose the local matrix from position/rotation/scale
    pub matrix_auto_update: bool,
    transform: Transform,
    local_matrix: Mat4,
    local_dirty: bool,
    pub(crate) world_matrix: Mat4,
    pub(crate) world_matrix_dirty: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    /// Detached node of the given kind
    pub fn new(kind: NodeKind) -> Self {
        Self {
            object_id: None,
            name: None,
            kind,
            visible: true,
            frustum_culled: true,
            render_depth: None,
            matrix_auto_update: true,
            transform: Transform::identity(),
            local_matrix: Mat4::identity(),
            local_dirty: false,
            world_matrix: Mat4::identity(),
            world_matrix_dirty: true,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Empty transform node
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    /// Mesh node
    pub fn mesh(geometry: GeometryRef, material: impl Into<MeshMaterial>) -> Self {
        Self::new(NodeKind::Mesh { geometry, material: material.into() })
    }

    /// Line node
    pub fn line(geometry: GeometryRef, material: MaterialRef, mode: LineMode) -> Self {
        Self::new(NodeKind::Line { geometry, material, mode })
    }

    /// Point cloud node
    pub fn points(geometry: GeometryRef, material: MaterialRef) -> Self {
        Self::new(NodeKind::Points { geometry, material })
    }

    /// Light node
    pub fn light(light: Light) -> Self {
        Self::new(NodeKind::Light(light))
    }

    /// Builder: debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Stable object id, assigned when the node is inserted into a scene
    pub fn object_id(&self) -> Option<ObjectId> {
        self.object_id
    }

    /// Local transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Set the position relative to the parent
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        self.local_dirty = true;
    }

    /// Set the rotation relative to the parent
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.local_dirty = true;
    }

    /// Set the scale relative to the parent
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.local_dirty = true;
    }

    /// Replace the whole local transform
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.local_dirty = true;
    }

    /// Set the local matrix directly
    ///
    /// Only meaningful with `matrix_auto_update` off; otherwise the next
    /// transform edit recomposes the matrix from position/rotation/scale.
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        self.local_matrix = matrix;
        self.world_matrix_dirty = true;
    }

    /// Local matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// World matrix as of the last propagation pass
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// Whether the world matrix is stale
    pub fn world_matrix_dirty(&self) -> bool {
        self.world_matrix_dirty
    }

    /// Parent key
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child keys in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Recompose the local matrix if auto update is on and the transform moved
    pub(crate) fn update_local_matrix(&mut self) {
        if self.matrix_auto_update && self.local_dirty {
            self.local_matrix = self.transform.to_matrix();
            self.local_dirty = false;
            self.world_matrix_dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;
    use crate::scene::geometry::Geometry;
    use crate::scene::material::Material;

    #[test]
    fn test_capabilities_by_kind() {
        let geometry = Geometry::new().into_shared();
        let material = Material::basic(Color::WHITE).into_shared();

        let mesh = SceneNode::mesh(geometry.clone(), material.clone());
        assert!(mesh.kind.is_cullable());
        assert_eq!(mesh.kind.draw_kind(), Some(DrawKind::Triangles));
        assert!(mesh.kind.geometry().is_some());

        let line = SceneNode::line(geometry, material, LineMode::Pieces);
        assert_eq!(line.kind.draw_kind(), Some(DrawKind::LinePieces));

        let group = SceneNode::group();
        assert!(!group.kind.is_cullable());
        assert!(group.kind.geometry().is_none());
        assert!(group.kind.materials().is_empty());
    }

    #[test]
    fn test_manual_matrix_survives_without_auto_update() {
        let mut node = SceneNode::group();
        node.matrix_auto_update = false;
        node.set_position(Vec3::new(1.0, 0.0, 0.0));
        let manual = Mat4::new_scaling(2.0);
        node.set_local_matrix(manual);
        node.update_local_matrix();
        assert_eq!(*node.local_matrix(), manual);
    }

    #[test]
    fn test_transform_edit_marks_world_dirty_on_recompose() {
        let mut node = SceneNode::group();
        node.world_matrix_dirty = false;
        node.set_position(Vec3::new(0.0, 1.0, 0.0));
        node.update_local_matrix();
        assert!(node.world_matrix_dirty());
        assert_eq!(node.local_matrix()[(1, 3)], 1.0);
    }
}
