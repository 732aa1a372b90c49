//! Geometry chunking
//!
//! Index buffers are 16-bit, so a single draw can address at most 65 535
//! vertices. The chunker splits a geometry's faces into [`GeometryGroup`]s
//! that each stay under that limit. Faces are expanded per corner (3 vertices
//! per triangle, 4 per quad), so a group's vertex count is the sum of its
//! face arities.

use std::collections::HashMap;

use crate::foundation::ids::{GeometryId, GroupId, IdAllocator};
use crate::render::buffers::GroupBuffers;
use crate::scene::geometry::{FaceIndices, Geometry};

/// Largest vertex count one group may hold
pub const MAX_GROUP_VERTICES: usize = 65_535;

/// What a group draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// A run of faces, drawn indexed
    Faces,
    /// The geometry's raw vertex list (lines, points), drawn non-indexed
    VertexStream,
}

/// One GPU-sized chunk of a geometry
#[derive(Debug)]
pub struct GeometryGroup {
    id: GroupId,
    geometry: GeometryId,
    kind: GroupKind,
    material_index: usize,
    triangle_faces: Vec<usize>,
    quad_faces: Vec<usize>,
    vertex_count: usize,
    triangle_count: usize,
    pub(crate) buffers: GroupBuffers,
}

impl GeometryGroup {
    fn new(geometry: GeometryId, kind: GroupKind, material_index: usize) -> Self {
        Self {
            id: IdAllocator::group(),
            geometry,
            kind,
            material_index,
            triangle_faces: Vec::new(),
            quad_faces: Vec::new(),
            vertex_count: 0,
            triangle_count: 0,
            buffers: GroupBuffers::default(),
        }
    }

    /// Group id, never reused
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Geometry the group was cut from
    pub fn geometry(&self) -> GeometryId {
        self.geometry
    }

    /// Indexed faces or raw vertex stream
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Material index shared by every face in the group
    pub fn material_index(&self) -> usize {
        self.material_index
    }

    /// Indices of the triangle faces, in geometry order
    pub fn triangle_faces(&self) -> &[usize] {
        &self.triangle_faces
    }

    /// Indices of the quad faces, in geometry order
    pub fn quad_faces(&self) -> &[usize] {
        &self.quad_faces
    }

    /// Total faces in the group
    pub fn face_count(&self) -> usize {
        self.triangle_faces.len() + self.quad_faces.len()
    }

    /// Triangles drawn for the group, two per quad
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Vertices the group expands to
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Triangle indices needed to draw the group (quads split in two)
    pub fn index_count(&self) -> usize {
        self.triangle_faces.len() * 3 + self.quad_faces.len() * 6
    }

    /// Line indices needed to draw the group as wireframe
    pub fn line_index_count(&self) -> usize {
        self.triangle_faces.len() * 6 + self.quad_faces.len() * 8
    }

    /// Face indices in staging order: every triangle, then every quad
    pub fn faces_in_staging_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.triangle_faces.iter().chain(self.quad_faces.iter()).copied()
    }

    fn push_face(&mut self, face: usize, indices: &FaceIndices) {
        match indices {
            FaceIndices::Triangle(_) => self.triangle_faces.push(face),
            FaceIndices::Quad(_) => self.quad_faces.push(face),
        }
        self.vertex_count += indices.arity();
        self.triangle_count += indices.triangle_count();
    }
}

/// Splits geometries into groups
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryChunker;

impl GeometryChunker {
    /// Partition faces into groups per material index
    ///
    /// Faces are visited in order. Each material index keeps one open
    /// group; a face that would push it past [`MAX_GROUP_VERTICES`] closes
    /// it and opens a new one. Groups are returned in creation order.
    pub fn partition(geometry: &Geometry) -> Vec<GeometryGroup> {
        let mut groups: Vec<GeometryGroup> = Vec::new();
        let mut open: HashMap<usize, usize> = HashMap::new();

        for (face_index, face) in geometry.faces.iter().enumerate() {
            let arity = face.indices.arity();
            let slot = match open.get(&face.material_index) {
                Some(&slot) if groups[slot].vertex_count + arity <= MAX_GROUP_VERTICES => slot,
                _ => {
                    groups.push(GeometryGroup::new(geometry.id(), GroupKind::Faces, face.material_index));
                    let slot = groups.len() - 1;
                    open.insert(face.material_index, slot);
                    slot
                }
            };
            groups[slot].push_face(face_index, &face.indices);
        }

        log::debug!(
            "[CHUNKER] {} split into {} group(s) from {} face(s)",
            geometry.id(),
            groups.len(),
            geometry.faces.len()
        );
        groups
    }

    /// Single non-indexed group over the raw vertex list
    pub fn vertex_stream(geometry: &Geometry) -> GeometryGroup {
        let mut group = GeometryGroup::new(geometry.id(), GroupKind::VertexStream, 0);
        group.vertex_count = geometry.vertices().len();
        group
    }
}
