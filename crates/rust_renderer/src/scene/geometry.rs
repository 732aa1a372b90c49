//! Geometry data model
//!
//! A `Geometry` is the CPU-side description of a mesh, line or point cloud.
//! The renderer never mutates it except to clear dirty flags after a
//! successful upload. Callers that edit vertex or face data in place must
//! set the matching flag through [`Geometry::mark_dirty`] so the next frame
//! re-uploads it.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::foundation::ids::{GeometryId, IdAllocator};
use crate::foundation::math::{Color, Vec2, Vec3, Vec4};
use crate::scene::bounds::BoundingSphere;

/// Shared, single-threaded handle to a geometry
pub type GeometryRef = Rc<RefCell<Geometry>>;

bitflags! {
    /// Per-aspect dirty flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u32 {
        /// Vertex positions changed
        const VERTICES = 1 << 0;
        /// Face or vertex normals changed
        const NORMALS = 1 << 1;
        /// Face topology changed, rebuild index buffers
        const ELEMENTS = 1 << 2;
        /// UV layers changed
        const UVS = 1 << 3;
        /// Face or vertex colors changed
        const COLORS = 1 << 4;
        /// Vertex tangents changed
        const TANGENTS = 1 << 5;
        /// Morph target positions changed
        const MORPH_TARGETS = 1 << 6;
    }
}

/// Vertex indices of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceIndices {
    /// Triangle `a, b, c`
    Triangle([u32; 3]),
    /// Quad `a, b, c, d`
    Quad([u32; 4]),
}

impl FaceIndices {
    /// Number of vertices the face contributes to a group
    pub fn arity(&self) -> usize {
        match self {
            Self::Triangle(_) => 3,
            Self::Quad(_) => 4,
        }
    }

    /// Vertex indices as a slice
    pub fn as_slice(&self) -> &[u32] {
        match self {
            Self::Triangle(v) => v,
            Self::Quad(v) => v,
        }
    }

    /// Triangles produced when drawn
    pub fn triangle_count(&self) -> usize {
        match self {
            Self::Triangle(_) => 1,
            Self::Quad(_) => 2,
        }
    }
}

/// A triangle or quad face
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Vertex indices into `Geometry::vertices`
    pub indices: FaceIndices,
    /// Flat face normal
    pub normal: Vec3,
    /// Optional per-corner normals (empty or one per corner)
    pub vertex_normals: Vec<Vec3>,
    /// Flat face color
    pub color: Color,
    /// Optional per-corner colors (empty or one per corner)
    pub vertex_colors: Vec<Color>,
    /// Optional per-corner tangents (empty or one per corner)
    pub vertex_tangents: Vec<Vec4>,
    /// Index into a multi-material list
    pub material_index: usize,
}

impl Face {
    /// Triangle face with no per-corner data
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self::with_indices(FaceIndices::Triangle([a, b, c]))
    }

    /// Quad face with no per-corner data
    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self::with_indices(FaceIndices::Quad([a, b, c, d]))
    }

    fn with_indices(indices: FaceIndices) -> Self {
        Self {
            indices,
            normal: Vec3::zeros(),
            vertex_normals: Vec::new(),
            color: Color::WHITE,
            vertex_colors: Vec::new(),
            vertex_tangents: Vec::new(),
            material_index: 0,
        }
    }

    /// Builder: material index
    pub fn with_material_index(mut self, index: usize) -> Self {
        self.material_index = index;
        self
    }

    /// Builder: flat color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Whether a full set of per-corner normals is present
    pub fn has_vertex_normals(&self) -> bool {
        self.vertex_normals.len() == self.indices.arity()
    }

    /// Whether a full set of per-corner colors is present
    pub fn has_vertex_colors(&self) -> bool {
        self.vertex_colors.len() == self.indices.arity()
    }

    /// Whether a full set of per-corner tangents is present
    pub fn has_vertex_tangents(&self) -> bool {
        self.vertex_tangents.len() == self.indices.arity()
    }
}

/// CPU-side geometry
#[derive(Debug, Clone)]
pub struct Geometry {
    id: GeometryId,
    /// Debug name
    pub name: Option<String>,
    vertices: Vec<Vec3>,
    /// Per-vertex colors, used by line and point geometries
    pub colors: Vec<Color>,
    /// Faces in draw order
    pub faces: Vec<Face>,
    /// First UV layer, one entry per face with one UV per corner
    pub face_uvs: Vec<Vec<Vec2>>,
    /// Second UV layer, same layout as `face_uvs`
    pub face_uvs2: Vec<Vec<Vec2>>,
    /// Morph target vertex positions, each the same length as `vertices`
    pub morph_targets: Vec<Vec<Vec3>>,
    /// Buffers for this geometry are expected to change often
    pub dynamic: bool,
    dirty: DirtyFlags,
    bounding_sphere: Option<BoundingSphere>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    /// Empty geometry with a fresh id
    pub fn new() -> Self {
        Self {
            id: IdAllocator::geometry(),
            name: None,
            vertices: Vec::new(),
            colors: Vec::new(),
            faces: Vec::new(),
            face_uvs: Vec::new(),
            face_uvs2: Vec::new(),
            morph_targets: Vec::new(),
            dynamic: false,
            dirty: DirtyFlags::all(),
            bounding_sphere: None,
        }
    }

    /// Geometry from vertices and faces
    pub fn from_parts(vertices: Vec<Vec3>, faces: Vec<Face>) -> Self {
        let mut geometry = Self::new();
        geometry.vertices = vertices;
        geometry.faces = faces;
        geometry
    }

    /// Wrap in a shared handle
    pub fn into_shared(self) -> GeometryRef {
        Rc::new(RefCell::new(self))
    }

    /// Geometry id
    pub fn id(&self) -> GeometryId {
        self.id
    }

    /// Vertex positions
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Mutable access to vertex positions for in-place edits
    ///
    /// Marks `VERTICES` dirty. The vertex count must not change once the
    /// geometry has been uploaded; use [`Geometry::set_vertices`] before
    /// first registration instead.
    pub fn vertices_mut(&mut self) -> &mut [Vec3] {
        self.dirty |= DirtyFlags::VERTICES;
        self.bounding_sphere = None;
        &mut self.vertices
    }

    /// Replace the vertex set
    pub fn set_vertices(&mut self, vertices: Vec<Vec3>) {
        self.vertices = vertices;
        self.dirty |= DirtyFlags::VERTICES;
        self.bounding_sphere = None;
    }

    /// Currently pending aspects
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Request re-upload of the given aspects
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    /// Clear aspects after they were uploaded
    pub(crate) fn clear_dirty(&mut self, flags: DirtyFlags) {
        self.dirty.remove(flags);
    }

    /// Total vertices the faces expand to when drawn non-indexed per face
    pub fn face_vertex_count(&self) -> usize {
        self.faces.iter().map(|f| f.indices.arity()).sum()
    }

    /// Whether every face has a UV entry in the first layer
    pub fn has_uvs(&self) -> bool {
        !self.faces.is_empty() && self.face_uvs.len() == self.faces.len()
    }

    /// Whether every face has a UV entry in the second layer
    pub fn has_uvs2(&self) -> bool {
        !self.faces.is_empty() && self.face_uvs2.len() == self.faces.len()
    }

    /// Whether every face carries tangents
    pub fn has_tangents(&self) -> bool {
        !self.faces.is_empty() && self.faces.iter().all(Face::has_vertex_tangents)
    }

    /// Lazily computed bounding sphere
    pub fn bounding_sphere(&mut self) -> BoundingSphere {
        if let Some(sphere) = self.bounding_sphere {
            return sphere;
        }
        let sphere = BoundingSphere::from_points(&self.vertices);
        self.bounding_sphere = Some(sphere);
        sphere
    }

    /// Cached bounding sphere, if already computed
    pub fn cached_bounding_sphere(&self) -> Option<BoundingSphere> {
        self.bounding_sphere
    }

    /// Recompute flat face normals from vertex positions
    pub fn compute_face_normals(&mut self) {
        for face in &mut self.faces {
            let idx = face.indices.as_slice();
            let (Some(a), Some(b), Some(c)) = (
                self.vertices.get(idx[0] as usize),
                self.vertices.get(idx[1] as usize),
                self.vertices.get(idx[2] as usize),
            ) else {
                log::warn!("[GEOMETRY] {} has a face indexing past its vertices", self.id);
                continue;
            };
            let n = (c - b).cross(&(a - b));
            face.normal = if n.norm_squared() > 0.0 { n.normalize() } else { Vec3::zeros() };
        }
        self.dirty |= DirtyFlags::NORMALS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad_plane() -> Geometry {
        Geometry::from_parts(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![Face::quad(0, 1, 2, 3)],
        )
    }

    #[test]
    fn test_bounding_sphere_is_cached_until_structural_edit() {
        let mut geometry = quad_plane();
        let first = geometry.bounding_sphere();
        assert_relative_eq!(first.radius, 2.0_f32.sqrt(), epsilon = 1e-6);

        geometry.mark_dirty(DirtyFlags::VERTICES);
        assert!(geometry.cached_bounding_sphere().is_some());

        geometry.set_vertices(vec![Vec3::zeros(), Vec3::new(4.0, 0.0, 0.0)]);
        assert!(geometry.cached_bounding_sphere().is_none());
        assert_relative_eq!(geometry.bounding_sphere().radius, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_face_normals_follow_counter_clockwise_winding() {
        let mut geometry = quad_plane();
        geometry.compute_face_normals();
        assert_relative_eq!(geometry.faces[0].normal, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        assert!(geometry.dirty().contains(DirtyFlags::NORMALS));
    }

    #[test]
    fn test_face_vertex_count_counts_quads_as_four() {
        let mut geometry = quad_plane();
        geometry.faces.push(Face::triangle(0, 1, 2));
        assert_eq!(geometry.face_vertex_count(), 7);
    }

    #[test]
    fn test_geometry_ids_are_unique() {
        assert_ne!(Geometry::new().id(), Geometry::new().id());
    }
}
