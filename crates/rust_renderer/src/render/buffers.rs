//! Geometry buffer synchronization
//!
//! Maps a geometry's dirty aspects onto per-group staging arrays and GPU
//! uploads. Each group owns its buffers; they are created lazily on the
//! first upload and sized exactly for the group. After that the group's
//! shape is frozen: a geometry that changes face count, face arity or vertex
//! count is reported as [`RenderError::GeometryStructureChanged`] rather
//! than being silently truncated.
//!
//! Corner layout inside a group: every triangle face first, then every quad
//! face, each expanded to one vertex per corner. Quads are split into the
//! triangles `(0, 1, 3)` and `(1, 2, 3)`.

use crate::foundation::ids::GroupId;
use crate::foundation::math::{Color, Vec2, Vec3};
use crate::render::chunker::{GeometryGroup, GroupKind, MAX_GROUP_VERTICES};
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{BufferHandle, BufferTarget, BufferUsage, GpuContext};
use crate::scene::geometry::{DirtyFlags, Face, Geometry};
use crate::scene::material::{Material, Shading, VertexColors};

/// Which attribute buffers a geometry's groups carry
///
/// Decided once, when the geometry is first registered, from the geometry
/// contents and the first material drawing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferLayout {
    /// Upload normals
    pub normals: bool,
    /// Use the face normal on every corner
    pub flat_normals: bool,
    /// Upload the first UV layer
    pub uvs: bool,
    /// Upload the second UV layer
    pub uvs2: bool,
    /// Color source, `None` for no color buffer
    pub colors: VertexColors,
    /// Upload tangents
    pub tangents: bool,
    /// Number of morph target position buffers
    pub morph_targets: usize,
    /// Build a wireframe line index buffer
    pub wireframe: bool,
}

impl BufferLayout {
    /// Layout for face groups drawn with `material`
    pub fn for_faces(geometry: &Geometry, material: &Material) -> Self {
        Self {
            normals: true,
            flat_normals: material.shading == Shading::Flat,
            uvs: geometry.has_uvs(),
            uvs2: geometry.has_uvs2(),
            colors: material.vertex_colors,
            tangents: geometry.has_tangents(),
            morph_targets: if material.morph_targets { geometry.morph_targets.len() } else { 0 },
            wireframe: true,
        }
    }

    /// Layout for a raw vertex stream (lines, points)
    pub fn for_vertex_stream(geometry: &Geometry) -> Self {
        Self {
            normals: false,
            flat_normals: false,
            uvs: false,
            uvs2: false,
            colors: if geometry.colors.is_empty() { VertexColors::None } else { VertexColors::Vertex },
            tangents: false,
            morph_targets: 0,
            wireframe: false,
        }
    }

    /// Aspects that have a backing buffer for a group of the given kind
    pub fn backed_aspects(&self, kind: GroupKind) -> DirtyFlags {
        let mut aspects = DirtyFlags::VERTICES;
        if self.colors != VertexColors::None {
            aspects |= DirtyFlags::COLORS;
        }
        if kind == GroupKind::VertexStream {
            return aspects;
        }
        aspects |= DirtyFlags::ELEMENTS;
        if self.normals {
            aspects |= DirtyFlags::NORMALS;
        }
        if self.uvs || self.uvs2 {
            aspects |= DirtyFlags::UVS;
        }
        if self.tangents {
            aspects |= DirtyFlags::TANGENTS;
        }
        if self.morph_targets > 0 {
            aspects |= DirtyFlags::MORPH_TARGETS;
        }
        aspects
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupShape {
    face_count: usize,
    vertex_count: usize,
}

#[derive(Debug, Default)]
struct Staging {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    uvs2: Vec<f32>,
    colors: Vec<f32>,
    tangents: Vec<f32>,
    morph_targets: Vec<Vec<f32>>,
    indices: Vec<u16>,
    line_indices: Vec<u16>,
}

/// GPU buffers and staging arrays of one group
#[derive(Debug, Default)]
pub struct GroupBuffers {
    /// Positions, 3 floats per vertex
    pub position: Option<BufferHandle>,
    /// Normals, 3 floats per vertex
    pub normal: Option<BufferHandle>,
    /// First UV layer, 2 floats per vertex
    pub uv: Option<BufferHandle>,
    /// Second UV layer, 2 floats per vertex
    pub uv2: Option<BufferHandle>,
    /// Colors, 3 floats per vertex
    pub color: Option<BufferHandle>,
    /// Tangents, 4 floats per vertex
    pub tangent: Option<BufferHandle>,
    /// Morph target positions, one buffer per target
    pub morph_targets: Vec<BufferHandle>,
    /// Triangle indices
    pub index: Option<BufferHandle>,
    /// Wireframe line indices
    pub line_index: Option<BufferHandle>,
    shape: Option<GroupShape>,
    staging: Staging,
}

impl GroupBuffers {
    /// Whether the buffers were created
    pub fn is_created(&self) -> bool {
        self.shape.is_some()
    }

    /// Staged triangle indices
    pub fn indices(&self) -> &[u16] {
        &self.staging.indices
    }

    /// Staged wireframe line indices
    pub fn line_indices(&self) -> &[u16] {
        &self.staging.line_indices
    }

    /// Staged positions
    pub fn positions(&self) -> &[f32] {
        &self.staging.positions
    }

    /// Staged normals
    pub fn normals(&self) -> &[f32] {
        &self.staging.normals
    }

    /// Staged colors
    pub fn colors(&self) -> &[f32] {
        &self.staging.colors
    }

    /// Every live buffer handle
    pub fn handles(&self) -> Vec<BufferHandle> {
        [self.position, self.normal, self.uv, self.uv2, self.color, self.tangent, self.index, self.line_index]
            .into_iter()
            .flatten()
            .chain(self.morph_targets.iter().copied())
            .collect()
    }
}

/// Uploads dirty geometry aspects
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferSynchronizer;

impl BufferSynchronizer {
    /// Upload every dirty aspect of `geometry` into all of its groups
    ///
    /// Flags are cleared only after every group took the aspect, so groups
    /// sharing a geometry stay in step. Returns the number of buffer uploads.
    pub fn upload(
        groups: &mut [GeometryGroup],
        geometry: &mut Geometry,
        layout: &BufferLayout,
        ctx: &mut dyn GpuContext,
    ) -> RenderResult<usize> {
        let dirty = geometry.dirty();
        let uploads = Self::upload_aspects(groups, geometry, layout, dirty, ctx)?;
        geometry.clear_dirty(dirty);
        Ok(uploads)
    }

    /// Upload the `dirty` aspects into `groups` without touching the flags
    ///
    /// Used when several buffer sets are built from one geometry: the caller
    /// snapshots the flags once, uploads every set, and clears the snapshot
    /// only when all of them succeeded.
    pub fn upload_aspects(
        groups: &mut [GeometryGroup],
        geometry: &Geometry,
        layout: &BufferLayout,
        dirty: DirtyFlags,
        ctx: &mut dyn GpuContext,
    ) -> RenderResult<usize> {
        let usage = if geometry.dynamic { BufferUsage::Dynamic } else { BufferUsage::Static };

        let mut uploads = 0;
        for group in groups.iter_mut() {
            uploads += Self::upload_group(group, geometry, layout, dirty, usage, ctx)?;
        }

        if uploads > 0 {
            log::trace!("[BUFFERS] {} uploaded {} buffer(s) for {:?}", geometry.id(), uploads, dirty);
        }
        Ok(uploads)
    }

    /// Delete every buffer of a group
    pub fn release(group: &mut GeometryGroup, ctx: &mut dyn GpuContext) {
        for handle in group.buffers.handles() {
            ctx.delete_buffer(handle);
        }
        group.buffers = GroupBuffers::default();
    }

    fn upload_group(
        group: &mut GeometryGroup,
        geometry: &Geometry,
        layout: &BufferLayout,
        dirty: DirtyFlags,
        usage: BufferUsage,
        ctx: &mut dyn GpuContext,
    ) -> RenderResult<usize> {
        if group.vertex_count() > MAX_GROUP_VERTICES {
            return Err(RenderError::GroupOverflow { group: group.id(), vertices: group.vertex_count() });
        }
        Self::check_structure(group, geometry)?;

        let backed = layout.backed_aspects(group.kind());
        let pending = if group.buffers.is_created() { dirty & backed } else { backed };
        if pending.is_empty() {
            return Ok(0);
        }

        let mut staging = std::mem::take(&mut group.buffers.staging);
        let result = Self::stage_and_upload(group, geometry, layout, pending, usage, &mut staging, ctx);
        group.buffers.staging = staging;
        let uploads = result?;

        group.buffers.shape = Some(GroupShape {
            face_count: geometry.faces.len(),
            vertex_count: geometry.vertices().len(),
        });
        Ok(uploads)
    }

    fn check_structure(group: &GeometryGroup, geometry: &Geometry) -> RenderResult<()> {
        let changed = |what: &'static str, expected: usize, actual: usize| RenderError::GeometryStructureChanged {
            geometry: geometry.id(),
            what,
            expected,
            actual,
        };

        if let Some(shape) = group.buffers.shape {
            if shape.face_count != geometry.faces.len() {
                return Err(changed("face count", shape.face_count, geometry.faces.len()));
            }
            if shape.vertex_count != geometry.vertices().len() {
                return Err(changed("vertex count", shape.vertex_count, geometry.vertices().len()));
            }
        }

        let arity_of = |face: usize| geometry.faces.get(face).map(|f| f.indices.arity());
        for &face in group.triangle_faces() {
            if arity_of(face) != Some(3) {
                return Err(changed("face arity", 3, arity_of(face).unwrap_or(0)));
            }
        }
        for &face in group.quad_faces() {
            if arity_of(face) != Some(4) {
                return Err(changed("face arity", 4, arity_of(face).unwrap_or(0)));
            }
        }
        Ok(())
    }

    fn stage_and_upload(
        group: &mut GeometryGroup,
        geometry: &Geometry,
        layout: &BufferLayout,
        pending: DirtyFlags,
        usage: BufferUsage,
        staging: &mut Staging,
        ctx: &mut dyn GpuContext,
    ) -> RenderResult<usize> {
        let corners = Self::corners(group, geometry)?;
        let group_id = group.id();
        let buffers = &mut group.buffers;
        let mut uploads = 0;

        if pending.contains(DirtyFlags::VERTICES) {
            staging.positions.clear();
            for corner in &corners {
                push_vec3(&mut staging.positions, &geometry.vertices()[corner.vertex]);
            }
            uploads += upload_floats(ctx, &mut buffers.position, &staging.positions, usage);
        }

        if pending.contains(DirtyFlags::NORMALS) {
            staging.normals.clear();
            for corner in &corners {
                let face = &geometry.faces[corner.face];
                let normal = if !layout.flat_normals && face.has_vertex_normals() {
                    face.vertex_normals[corner.slot]
                } else {
                    face.normal
                };
                push_vec3(&mut staging.normals, &normal);
            }
            uploads += upload_floats(ctx, &mut buffers.normal, &staging.normals, usage);
        }

        if pending.contains(DirtyFlags::COLORS) {
            staging.colors.clear();
            for corner in &corners {
                let color = Self::corner_color(geometry, layout, corner);
                staging.colors.extend_from_slice(&color.to_array());
            }
            uploads += upload_floats(ctx, &mut buffers.color, &staging.colors, usage);
        }

        if pending.contains(DirtyFlags::UVS) {
            if layout.uvs {
                stage_uvs(&mut staging.uvs, &geometry.face_uvs, &corners);
                uploads += upload_floats(ctx, &mut buffers.uv, &staging.uvs, usage);
            }
            if layout.uvs2 {
                stage_uvs(&mut staging.uvs2, &geometry.face_uvs2, &corners);
                uploads += upload_floats(ctx, &mut buffers.uv2, &staging.uvs2, usage);
            }
        }

        if pending.contains(DirtyFlags::TANGENTS) {
            staging.tangents.clear();
            for corner in &corners {
                let face = &geometry.faces[corner.face];
                match face.vertex_tangents.get(corner.slot) {
                    Some(t) => staging.tangents.extend_from_slice(&[t.x, t.y, t.z, t.w]),
                    None => staging.tangents.extend_from_slice(&[0.0; 4]),
                }
            }
            uploads += upload_floats(ctx, &mut buffers.tangent, &staging.tangents, usage);
        }

        if pending.contains(DirtyFlags::MORPH_TARGETS) {
            staging.morph_targets.resize_with(layout.morph_targets, Vec::new);
            for (target_index, target) in geometry.morph_targets.iter().take(layout.morph_targets).enumerate() {
                let data = &mut staging.morph_targets[target_index];
                data.clear();
                for corner in &corners {
                    let position = target.get(corner.vertex).unwrap_or(&geometry.vertices()[corner.vertex]);
                    push_vec3(data, position);
                }
                if buffers.morph_targets.len() <= target_index {
                    buffers.morph_targets.push(ctx.create_buffer());
                }
                let handle = buffers.morph_targets[target_index];
                ctx.upload_buffer(BufferTarget::Array, handle, bytemuck::cast_slice(data), usage);
                uploads += 1;
            }
        }

        if pending.contains(DirtyFlags::ELEMENTS) {
            Self::stage_indices(group_id, group_faces(geometry, &corners), staging)?;
            uploads += upload_indices(ctx, &mut buffers.index, &staging.indices, usage);
            if layout.wireframe {
                uploads += upload_indices(ctx, &mut buffers.line_index, &staging.line_indices, usage);
            }
        }

        Ok(uploads)
    }

    fn corner_color(geometry: &Geometry, layout: &BufferLayout, corner: &Corner) -> Color {
        if corner.face == NO_FACE {
            return geometry.colors.get(corner.vertex).copied().unwrap_or(Color::WHITE);
        }
        let face = &geometry.faces[corner.face];
        match layout.colors {
            VertexColors::Vertex if face.has_vertex_colors() => face.vertex_colors[corner.slot],
            _ => face.color,
        }
    }

    /// Expand a group into its corners, validating vertex references
    fn corners(group: &GeometryGroup, geometry: &Geometry) -> RenderResult<Vec<Corner>> {
        let vertex_count = geometry.vertices().len();
        if group.kind() == GroupKind::VertexStream {
            if group.vertex_count() != vertex_count {
                return Err(RenderError::GeometryStructureChanged {
                    geometry: geometry.id(),
                    what: "vertex count",
                    expected: group.vertex_count(),
                    actual: vertex_count,
                });
            }
            return Ok((0..vertex_count).map(|vertex| Corner { face: NO_FACE, slot: 0, vertex }).collect());
        }

        let mut corners = Vec::with_capacity(group.vertex_count());
        for face_index in group.faces_in_staging_order() {
            let face: &Face = &geometry.faces[face_index];
            for (slot, &vertex) in face.indices.as_slice().iter().enumerate() {
                let vertex = vertex as usize;
                if vertex >= vertex_count {
                    return Err(RenderError::GeometryStructureChanged {
                        geometry: geometry.id(),
                        what: "vertex index",
                        expected: vertex_count,
                        actual: vertex,
                    });
                }
                corners.push(Corner { face: face_index, slot, vertex });
            }
        }
        Ok(corners)
    }

    fn stage_indices(group: GroupId, arities: impl Iterator<Item = usize>, staging: &mut Staging) -> RenderResult<()> {
        staging.indices.clear();
        staging.line_indices.clear();
        let mut offset = 0_usize;
        for arity in arities {
            if offset + arity > MAX_GROUP_VERTICES {
                return Err(RenderError::GroupOverflow { group, vertices: offset + arity });
            }
            let o = u16::try_from(offset).map_err(|_| RenderError::GroupOverflow { group, vertices: offset })?;
            if arity == 3 {
                staging.indices.extend_from_slice(&[o, o + 1, o + 2]);
                staging.line_indices.extend_from_slice(&[o, o + 1, o + 1, o + 2, o + 2, o]);
            } else {
                staging.indices.extend_from_slice(&[o, o + 1, o + 3, o + 1, o + 2, o + 3]);
                staging.line_indices.extend_from_slice(&[o, o + 1, o + 1, o + 2, o + 2, o + 3, o + 3, o]);
            }
            offset += arity;
        }
        Ok(())
    }
}

/// Face index of corners taken straight from a vertex stream
const NO_FACE: usize = usize::MAX;

/// One expanded vertex: source face, corner slot and vertex index
#[derive(Debug, Clone, Copy)]
struct Corner {
    face: usize,
    slot: usize,
    vertex: usize,
}

/// Arity of each face in corner order
fn group_faces<'a>(geometry: &'a Geometry, corners: &'a [Corner]) -> impl Iterator<Item = usize> + 'a {
    corners
        .iter()
        .filter(|c| c.slot == 0)
        .map(move |c| geometry.faces[c.face].indices.arity())
}

fn push_vec3(out: &mut Vec<f32>, v: &Vec3) {
    out.extend_from_slice(&[v.x, v.y, v.z]);
}

fn stage_uvs(out: &mut Vec<f32>, layer: &[Vec<Vec2>], corners: &[Corner]) {
    out.clear();
    for corner in corners {
        match layer.get(corner.face).and_then(|uvs| uvs.get(corner.slot)) {
            Some(uv) => out.extend_from_slice(&[uv.x, uv.y]),
            None => out.extend_from_slice(&[0.0, 0.0]),
        }
    }
}

fn upload_floats(ctx: &mut dyn GpuContext, slot: &mut Option<BufferHandle>, data: &[f32], usage: BufferUsage) -> usize {
    let handle = *slot.get_or_insert_with(|| ctx.create_buffer());
    ctx.upload_buffer(BufferTarget::Array, handle, bytemuck::cast_slice(data), usage);
    1
}

fn upload_indices(ctx: &mut dyn GpuContext, slot: &mut Option<BufferHandle>, data: &[u16], usage: BufferUsage) -> usize {
    let handle = *slot.get_or_insert_with(|| ctx.create_buffer());
    ctx.upload_buffer(BufferTarget::ElementArray, handle, bytemuck::cast_slice(data), usage);
    1
}
