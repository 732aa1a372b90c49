//! GPU state diffing
//!
//! Remembers the last fixed-function state sent to the context and only
//! forwards calls that change it. Every slot starts out unknown, and
//! [`GpuStateCache::reset`] returns them to unknown so the next pass
//! re-applies everything it needs.

use std::collections::BTreeSet;

use crate::foundation::ids::{GroupId, MaterialId, ProgramId};
use crate::render::gpu::{BlendEquation, BlendFactor, CullFace, FrontFace, GpuContext, ProgramHandle};
use crate::scene::material::{Blending, Side};

/// Last applied state; `None` means unknown
#[derive(Debug, Default)]
pub struct GpuStateCache {
    blend_enabled: Option<bool>,
    blend_equation: Option<BlendEquation>,
    blend_factors: Option<(BlendFactor, BlendFactor)>,
    depth_test: Option<bool>,
    depth_write: Option<bool>,
    polygon_offset: Option<Option<(f32, f32)>>,
    cull_face: Option<Option<CullFace>>,
    front_face: Option<FrontFace>,
    line_width: Option<f32>,
    program: Option<ProgramId>,
    material: Option<MaterialId>,
    bound_geometry: Option<(GroupId, ProgramId, bool)>,
    enabled_attributes: BTreeSet<u32>,
}

impl GpuStateCache {
    /// Cache with every slot unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything that was applied
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a blend mode
    pub fn set_blending(&mut self, blending: Blending, ctx: &mut dyn GpuContext) {
        let (equation, src, dst) = match blending {
            Blending::NoBlending => {
                self.set_blend_enabled(false, ctx);
                return;
            }
            Blending::Normal => (BlendEquation::Add, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            Blending::Additive => (BlendEquation::Add, BlendFactor::SrcAlpha, BlendFactor::One),
            Blending::Subtractive => (BlendEquation::Add, BlendFactor::Zero, BlendFactor::OneMinusSrcColor),
            Blending::Multiply => (BlendEquation::Add, BlendFactor::Zero, BlendFactor::SrcColor),
            Blending::Custom { equation, src, dst } => (equation, src, dst),
        };
        self.set_blend_enabled(true, ctx);
        if self.blend_equation != Some(equation) {
            ctx.set_blend_equation(equation);
            self.blend_equation = Some(equation);
        }
        if self.blend_factors != Some((src, dst)) {
            ctx.set_blend_func(src, dst);
            self.blend_factors = Some((src, dst));
        }
    }

    fn set_blend_enabled(&mut self, enabled: bool, ctx: &mut dyn GpuContext) {
        if self.blend_enabled != Some(enabled) {
            ctx.set_blend_enabled(enabled);
            self.blend_enabled = Some(enabled);
        }
    }

    /// Toggle depth testing
    pub fn set_depth_test(&mut self, enabled: bool, ctx: &mut dyn GpuContext) {
        if self.depth_test != Some(enabled) {
            ctx.set_depth_test(enabled);
            self.depth_test = Some(enabled);
        }
    }

    /// Toggle depth writes
    pub fn set_depth_write(&mut self, enabled: bool, ctx: &mut dyn GpuContext) {
        if self.depth_write != Some(enabled) {
            ctx.set_depth_write(enabled);
            self.depth_write = Some(enabled);
        }
    }

    /// Set or clear polygon offset
    pub fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>, ctx: &mut dyn GpuContext) {
        if self.polygon_offset != Some(offset) {
            ctx.set_polygon_offset(offset);
            self.polygon_offset = Some(offset);
        }
    }

    /// Face culling and winding for a material side
    pub fn set_side(&mut self, side: Side, ctx: &mut dyn GpuContext) {
        let (cull, front) = match side {
            Side::Front => (Some(CullFace::Back), FrontFace::Ccw),
            Side::Back => (Some(CullFace::Back), FrontFace::Cw),
            Side::Double => (None, FrontFace::Ccw),
        };
        if self.cull_face != Some(cull) {
            ctx.set_cull_face(cull);
            self.cull_face = Some(cull);
        }
        if cull.is_some() && self.front_face != Some(front) {
            ctx.set_front_face(front);
            self.front_face = Some(front);
        }
    }

    /// Set the rasterized line width
    pub fn set_line_width(&mut self, width: f32, ctx: &mut dyn GpuContext) {
        if self.line_width != Some(width) {
            ctx.set_line_width(width);
            self.line_width = Some(width);
        }
    }

    /// Make a program current; true if it changed
    pub fn use_program(&mut self, id: ProgramId, handle: ProgramHandle, ctx: &mut dyn GpuContext) -> bool {
        if self.program == Some(id) {
            return false;
        }
        ctx.use_program(handle);
        self.program = Some(id);
        true
    }

    /// Note the material whose uniforms are loaded; true if it changed
    pub fn set_material(&mut self, id: MaterialId) -> bool {
        if self.material == Some(id) {
            return false;
        }
        self.material = Some(id);
        true
    }

    /// Note the bound `(group, program)` pair; true if buffers must be rebound
    ///
    /// `wireframe` selects the line index buffer of the group, so switching
    /// it also counts as a different binding.
    pub fn bind_geometry(&mut self, group: GroupId, program: ProgramId, wireframe: bool) -> bool {
        let key = (group, program, wireframe);
        if self.bound_geometry == Some(key) {
            return false;
        }
        self.bound_geometry = Some(key);
        true
    }

    /// Enable exactly the given attribute locations
    pub fn enable_attributes(&mut self, locations: &BTreeSet<u32>, ctx: &mut dyn GpuContext) {
        for location in locations.difference(&self.enabled_attributes) {
            ctx.enable_vertex_attribute(*location);
        }
        for location in self.enabled_attributes.difference(locations) {
            ctx.disable_vertex_attribute(*location);
        }
        self.enabled_attributes.clone_from(locations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::{GpuCommand, RecordingContext};

    #[test]
    fn test_repeated_state_is_not_reissued() {
        let mut ctx = RecordingContext::new();
        let mut state = GpuStateCache::new();

        state.set_blending(Blending::Normal, &mut ctx);
        state.set_depth_test(true, &mut ctx);
        let issued = ctx.commands().len();

        state.set_blending(Blending::Normal, &mut ctx);
        state.set_depth_test(true, &mut ctx);
        assert_eq!(ctx.commands().len(), issued);
    }

    #[test]
    fn test_only_the_differing_factor_call_is_issued() {
        let mut ctx = RecordingContext::new();
        let mut state = GpuStateCache::new();
        state.set_blending(Blending::Normal, &mut ctx);
        ctx.clear_commands();

        state.set_blending(Blending::Additive, &mut ctx);
        assert_eq!(ctx.commands(), &[GpuCommand::BlendFunc(BlendFactor::SrcAlpha, BlendFactor::One)]);
    }

    #[test]
    fn test_reset_forces_reapplication() {
        let mut ctx = RecordingContext::new();
        let mut state = GpuStateCache::new();
        state.set_depth_write(false, &mut ctx);
        state.reset();
        ctx.clear_commands();

        state.set_depth_write(false, &mut ctx);
        assert_eq!(ctx.commands(), &[GpuCommand::DepthWrite(false)]);
    }

    #[test]
    fn test_geometry_rebind_only_on_pair_change() {
        let mut state = GpuStateCache::new();
        let (g1, g2, p) = (GroupId(1), GroupId(2), ProgramId(1));
        assert!(state.bind_geometry(g1, p, false));
        assert!(!state.bind_geometry(g1, p, false));
        assert!(state.bind_geometry(g2, p, false));
        assert!(state.bind_geometry(g2, ProgramId(2), false));
        assert!(state.bind_geometry(g2, ProgramId(2), true));
    }

    #[test]
    fn test_double_side_disables_culling() {
        let mut ctx = RecordingContext::new();
        let mut state = GpuStateCache::new();
        state.set_side(Side::Front, &mut ctx);
        ctx.clear_commands();

        state.set_side(Side::Double, &mut ctx);
        assert_eq!(ctx.commands(), &[GpuCommand::CullFace(None)]);
    }

    #[test]
    fn test_attribute_sets_are_diffed() {
        let mut ctx = RecordingContext::new();
        let mut state = GpuStateCache::new();
        state.enable_attributes(&[0, 1].into_iter().collect(), &mut ctx);
        ctx.clear_commands();

        state.enable_attributes(&[1, 2].into_iter().collect(), &mut ctx);
        assert_eq!(ctx.commands(), &[GpuCommand::EnableAttribute(2), GpuCommand::DisableAttribute(0)]);
    }
}
