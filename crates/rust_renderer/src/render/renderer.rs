//! Renderer façade
//!
//! Owns the GPU context and every cache built on top of it, and turns a
//! scene plus a camera into draw calls.
//!
//! A frame runs in a fixed order:
//! 1. World matrices (scene, then camera) and the frustum
//! 2. Registrations for nodes added and removed since the last frame
//! 3. Lights, render target and clear
//! 4. Render list (cull, split, sort)
//! 5. Dirty buffers of the geometries the list draws; entries whose
//!    geometry failed to upload are dropped
//! 6. Pre plugins, opaque pass, transparent pass, post plugins

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use crate::config::{Config, RendererConfig};
use crate::foundation::ids::{GeometryId, MaterialId, ProgramId, TextureId};
use crate::foundation::math::Color;
use crate::render::buffers::BufferSynchronizer;
use crate::render::chunker::GeometryGroup;
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame_uniforms::FrameUniforms;
use crate::render::gpu::{
    ClearFlags, GpuCapabilities, GpuContext, PrimitiveMode, TextureHandle, UniformValue,
};
use crate::render::info::{MemoryCounters, RenderCounters, RenderInfo};
use crate::render::lights::LightUniforms;
use crate::render::plugin::{PluginFrame, RenderPlugin};
use crate::render::program::{
    PermutationDescriptor, ProgramCache, ProgramCacheEntry, ShaderLibrary, TemplateCatalog, WithCustom,
};
use crate::render::registry::{GeometryKey, Registry};
use crate::render::render_list::{RenderList, RenderListEntry};
use crate::render::state::GpuStateCache;
use crate::render::target::RenderTarget;
use crate::scene::camera::Camera;
use crate::scene::frustum::Frustum;
use crate::scene::geometry::GeometryRef;
use crate::scene::graph::Scene;
use crate::scene::light::LightCounts;
use crate::scene::material::{Blending, MaterialKind, MaterialRef};
use crate::scene::node::DrawKind;
use crate::scene::texture::TextureRef;

/// Attribute slots every program may ask for
const MIN_VERTEX_ATTRIBUTES: u32 = 8;

/// Program a material is drawn with
#[derive(Debug, Clone, Copy)]
enum MaterialProgram {
    Ready { program: ProgramId, descriptor: PermutationDescriptor },
    /// Linking failed; retried only after `needs_update` is set again
    Failed,
}

/// Retained-mode renderer bound to one GPU context
pub struct Renderer<C: GpuContext> {
    ctx: C,
    config: RendererConfig,
    capabilities: GpuCapabilities,
    library: Box<dyn ShaderLibrary>,
    registry: Registry,
    programs: ProgramCache,
    material_programs: HashMap<MaterialId, MaterialProgram>,
    textures: HashMap<TextureId, TextureHandle>,
    state: GpuStateCache,
    frustum: Frustum,
    pre_plugins: Vec<Box<dyn RenderPlugin>>,
    post_plugins: Vec<Box<dyn RenderPlugin>>,
    viewport: (i32, i32, u32, u32),
    scissor: Option<(i32, i32, u32, u32)>,
    clear_color: Color,
    clear_alpha: f32,
    counters: RenderCounters,
}

impl<C: GpuContext> Renderer<C> {
    /// Renderer using the built-in shader templates
    pub fn new(ctx: C, config: RendererConfig) -> RenderResult<Self> {
        Self::with_library(ctx, config, TemplateCatalog::builtin())
    }

    /// Renderer reading its configuration from a TOML or RON file
    pub fn from_config_file(ctx: C, path: &str) -> RenderResult<Self> {
        let config = RendererConfig::load_from_file(path)?;
        Self::new(ctx, config)
    }

    /// Renderer using a host supplied shader library
    pub fn with_library(
        mut ctx: C,
        config: RendererConfig,
        library: impl ShaderLibrary + 'static,
    ) -> RenderResult<Self> {
        let capabilities = ctx.capabilities().map_err(RenderError::InitializationFailed)?;
        if capabilities.max_vertex_attributes < MIN_VERTEX_ATTRIBUTES {
            return Err(RenderError::MissingCapability(format!(
                "{} vertex attributes, {} required",
                capabilities.max_vertex_attributes, MIN_VERTEX_ATTRIBUTES
            )));
        }
        if capabilities.max_texture_units == 0 {
            return Err(RenderError::MissingCapability("texture units".to_string()));
        }
        if config.shadow_map_enabled && !capabilities.float_textures {
            log::warn!("[RENDERER] Shadow maps requested without float textures, precision will suffer");
        }

        let clear_color = config.clear_color;
        let clear_alpha = config.clear_alpha;
        ctx.set_clear_color([clear_color.r, clear_color.g, clear_color.b, clear_alpha]);
        log::info!(
            "[RENDERER] Initialized ({} texture units, {} vertex attributes, {:?} precision)",
            capabilities.max_texture_units,
            capabilities.max_vertex_attributes,
            config.precision
        );

        Ok(Self {
            ctx,
            config,
            capabilities,
            library: Box::new(library),
            registry: Registry::new(),
            programs: ProgramCache::new(),
            material_programs: HashMap::new(),
            textures: HashMap::new(),
            state: GpuStateCache::new(),
            frustum: Frustum::default(),
            pre_plugins: Vec::new(),
            post_plugins: Vec::new(),
            viewport: (0, 0, 0, 0),
            scissor: None,
            clear_color,
            clear_alpha,
            counters: RenderCounters::default(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable configuration; changes affecting programs apply to materials
    /// flagged `needs_update`
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Capabilities reported at construction
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// The GPU context
    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Mutable GPU context
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// Object registrations
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render and memory statistics
    pub fn info(&self) -> RenderInfo {
        RenderInfo {
            render: self.counters,
            memory: MemoryCounters {
                programs: self.programs.len(),
                geometries: self.registry.geometry_count(),
                textures: self.textures.len(),
            },
        }
    }

    /// Resize the drawing surface and reset the viewport to cover it
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.set_viewport(0, 0, width, height);
    }

    /// Set the viewport rectangle
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
        self.ctx.set_viewport(x, y, width, height);
    }

    /// Restrict drawing to a rectangle, `None` to draw everywhere
    pub fn set_scissor(&mut self, rect: Option<(i32, i32, u32, u32)>) {
        self.scissor = rect;
        self.ctx.set_scissor(rect);
    }

    /// Set the clear color and alpha
    pub fn set_clear_color(&mut self, color: Color, alpha: f32) {
        self.clear_color = color;
        self.clear_alpha = alpha;
        self.ctx.set_clear_color([color.r, color.g, color.b, alpha]);
    }

    /// Current clear color and alpha
    pub fn clear_color(&self) -> (Color, f32) {
        (self.clear_color, self.clear_alpha)
    }

    /// Current viewport rectangle
    pub fn viewport(&self) -> (i32, i32, u32, u32) {
        self.viewport
    }

    /// Current scissor rectangle
    pub fn scissor(&self) -> Option<(i32, i32, u32, u32)> {
        self.scissor
    }

    /// Clear buffers of the bound framebuffer
    pub fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::COLOR, color);
        flags.set(ClearFlags::DEPTH, depth);
        flags.set(ClearFlags::STENCIL, stencil);
        if !flags.is_empty() {
            self.ctx.clear(flags);
        }
    }

    /// Draw into `target`, or the default framebuffer for `None`
    pub fn set_render_target(&mut self, target: Option<&mut RenderTarget>) -> RenderResult<()> {
        match target {
            Some(target) => {
                let framebuffer = target.ensure(&mut self.ctx)?;
                self.ctx.bind_framebuffer(Some(framebuffer));
                self.ctx.set_viewport(0, 0, target.width(), target.height());
            }
            None => {
                self.ctx.bind_framebuffer(None);
                let (x, y, width, height) = self.viewport;
                self.ctx.set_viewport(x, y, width, height);
            }
        }
        Ok(())
    }

    /// Add a plugin run before the render list
    pub fn add_pre_plugin(&mut self, mut plugin: Box<dyn RenderPlugin>) {
        plugin.init(&mut self.ctx);
        log::debug!("[RENDERER] Added pre plugin '{}'", plugin.name());
        self.pre_plugins.push(plugin);
    }

    /// Add a plugin run after the render list
    pub fn add_post_plugin(&mut self, mut plugin: Box<dyn RenderPlugin>) {
        plugin.init(&mut self.ctx);
        log::debug!("[RENDERER] Added post plugin '{}'", plugin.name());
        self.post_plugins.push(plugin);
    }

    /// Release the program held by a material
    ///
    /// The material gets a new program the next time it is drawn.
    pub fn dispose_material(&mut self, material: &MaterialRef) {
        let mut material = material.borrow_mut();
        if let Some(MaterialProgram::Ready { program, .. }) = self.material_programs.remove(&material.id()) {
            self.programs.release(program, &mut self.ctx);
        }
        material.needs_update = true;
        log::debug!("[RENDERER] Disposed material {}", material.id());
    }

    /// Delete the GPU buffers of a geometry
    ///
    /// Objects still drawing it get fresh groups and a full upload on the
    /// next frame.
    pub fn dispose_geometry(&mut self, geometry: &GeometryRef) {
        let id = geometry.borrow().id();
        for key in self.registry.keys_for(id) {
            self.registry.release_geometry(key, &mut self.ctx);
        }
        geometry.borrow_mut().mark_dirty(crate::scene::geometry::DirtyFlags::all());
        log::debug!("[RENDERER] Disposed geometry {}", id);
    }

    /// Delete the GPU copy of a texture
    pub fn dispose_texture(&mut self, texture: &TextureRef) {
        let mut texture = texture.borrow_mut();
        if let Some(handle) = self.textures.remove(&texture.id()) {
            self.ctx.delete_texture(handle);
        }
        texture.needs_update = true;
    }

    /// Render one frame
    ///
    /// Structural geometry errors and program link failures skip the
    /// affected objects and are logged; only render target failures abort
    /// the frame.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
        target: Option<&mut RenderTarget>,
        force_clear: bool,
    ) -> RenderResult<()> {
        self.counters = RenderCounters::default();
        self.state.reset();

        scene.update_world_matrices();
        let parent_world = camera.parent.and_then(|parent| scene.world_matrix(parent)).copied();
        camera.update_world_matrix(parent_world.as_ref());
        self.frustum.set_from_matrix(&camera.view_projection());

        self.sync_registrations(scene);

        let lights = scene.lights();
        let light_counts = LightCounts::from_lights(lights.iter().map(|l| l.light), self.config.max_lights);
        let light_uniforms = LightUniforms::collect(&lights, light_counts, self.config.gamma_input);

        self.set_render_target(target)?;
        if self.config.auto_clear || force_clear {
            self.clear(self.config.auto_clear_color, self.config.auto_clear_depth, self.config.auto_clear_stencil);
        }

        let mut list = RenderList::build(scene, camera, &self.frustum, &self.registry, self.config.sort_objects);
        let failed = self.sync_geometries(&list);
        list.drop_geometries(&failed);

        let scene: &Scene = scene;
        let camera: &Camera = camera;
        let frame = FrameUniforms::new(camera, scene.fog, self.viewport.3, light_counts, light_uniforms);

        Self::run_plugins(&mut self.pre_plugins, &mut self.state, &mut self.ctx, scene, camera, self.viewport);

        if let Some(material) = scene.override_material.clone() {
            self.state.reset();
            let blending = material.borrow().blending;
            for entry in list.opaque().iter().chain(list.transparent()) {
                self.dispatch(scene, &frame, entry, &material, blending);
            }
        } else {
            for entry in list.opaque() {
                if let Some(material) = &entry.opaque {
                    self.dispatch(scene, &frame, entry, material, Blending::NoBlending);
                }
            }
            for entry in list.transparent() {
                if let Some(material) = &entry.transparent {
                    let blending = material.borrow().blending;
                    self.dispatch(scene, &frame, entry, material, blending);
                }
            }
        }

        Self::run_plugins(&mut self.post_plugins, &mut self.state, &mut self.ctx, scene, camera, self.viewport);

        log::trace!(
            "[RENDERER] Frame: {} calls, {} vertices, {} faces, {} points",
            self.counters.calls,
            self.counters.vertices,
            self.counters.faces,
            self.counters.points
        );
        Ok(())
    }

    fn sync_registrations(&mut self, scene: &mut Scene) {
        for removed in scene.take_removed() {
            self.registry.unregister(removed.object_id, &mut self.ctx);
        }
        for node_id in scene.take_added() {
            if let Some(node) = scene.get(node_id) {
                self.registry.register(node_id, node);
            }
        }
        self.registry.reinitialize(scene);
    }

    /// Upload dirty buffers of every geometry `list` draws
    ///
    /// All buffer sets built from one geometry (faces and vertex stream)
    /// take the same dirty snapshot, and the flags are cleared only once
    /// every set uploaded. Returns the buffer sets that failed this frame.
    fn sync_geometries(&mut self, list: &RenderList) -> HashSet<GeometryKey> {
        let drawn: BTreeSet<GeometryId> = list.entries().map(|entry| entry.geometry.0).collect();
        let mut failed = HashSet::new();
        for id in drawn {
            let keys = self.registry.keys_for(id);
            let Some(geometry) = keys
                .first()
                .and_then(|key| self.registry.geometry(*key))
                .map(|buffers| Rc::clone(&buffers.geometry))
            else {
                continue;
            };
            let dirty = geometry.borrow().dirty();
            let mut synced = true;
            for key in keys {
                let Some(buffers) = self.registry.geometry_mut(key) else {
                    continue;
                };
                let result = BufferSynchronizer::upload_aspects(
                    &mut buffers.groups,
                    &geometry.borrow(),
                    &buffers.layout,
                    dirty,
                    &mut self.ctx,
                );
                match result {
                    Ok(_) => self.registry.activate(key),
                    Err(err) => {
                        log::error!("[RENDERER] Skipping {}: {}", key.0, err);
                        failed.insert(key);
                        synced = false;
                    }
                }
            }
            if synced {
                geometry.borrow_mut().clear_dirty(dirty);
            }
        }
        failed
    }

    fn run_plugins(
        plugins: &mut [Box<dyn RenderPlugin>],
        state: &mut GpuStateCache,
        ctx: &mut C,
        scene: &Scene,
        camera: &Camera,
        viewport: (i32, i32, u32, u32),
    ) {
        for plugin in plugins.iter_mut() {
            state.reset();
            let mut frame = PluginFrame { scene, camera, viewport, ctx: &mut *ctx };
            plugin.render(&mut frame);
        }
        if !plugins.is_empty() {
            state.reset();
        }
    }

    /// Program for `material`, linking on first use or after `needs_update`
    fn resolve_program(&mut self, material: &MaterialRef, frame: &FrameUniforms) -> Option<ProgramId> {
        let mut material = material.borrow_mut();
        let descriptor =
            PermutationDescriptor::for_material(&material, frame.light_counts, frame.fog.as_ref(), &self.config);
        let previous = self.material_programs.get(&material.id()).copied();

        match previous {
            Some(MaterialProgram::Ready { program, descriptor: held })
                if held == descriptor && !material.needs_update =>
            {
                return Some(program);
            }
            Some(MaterialProgram::Failed) if !material.needs_update => return None,
            _ => {}
        }

        let acquired = match &material.kind {
            MaterialKind::Shader(template) => {
                let library = WithCustom::new(self.library.as_ref(), Rc::clone(template));
                self.programs.acquire(&descriptor, &library, &mut self.ctx)
            }
            _ => self.programs.acquire(&descriptor, self.library.as_ref(), &mut self.ctx),
        };
        if let Some(MaterialProgram::Ready { program, .. }) = previous {
            self.programs.release(program, &mut self.ctx);
        }
        material.needs_update = false;

        match acquired {
            Ok(program) => {
                self.material_programs
                    .insert(material.id(), MaterialProgram::Ready { program, descriptor });
                Some(program)
            }
            Err(err) => {
                log::warn!("[RENDERER] Material {} is unusable until updated: {}", material.id(), err);
                self.material_programs.insert(material.id(), MaterialProgram::Failed);
                None
            }
        }
    }

    fn dispatch(
        &mut self,
        scene: &Scene,
        frame: &FrameUniforms,
        entry: &RenderListEntry,
        material_ref: &MaterialRef,
        blending: Blending,
    ) {
        let Some(node) = scene.get(entry.node) else {
            return;
        };
        let Some(program_id) = self.resolve_program(material_ref, frame) else {
            return;
        };
        let Some(program) = self.programs.get(program_id) else {
            return;
        };
        let Some(buffers) = self.registry.geometry(entry.geometry) else {
            return;
        };
        let Some(group) = buffers.groups.get(entry.group_index) else {
            return;
        };
        let material = material_ref.borrow();
        let ctx: &mut dyn GpuContext = &mut self.ctx;

        self.state.set_blending(blending, ctx);
        self.state.set_depth_test(material.depth_test, ctx);
        self.state.set_depth_write(material.depth_write, ctx);
        self.state.set_polygon_offset(material.polygon_offset, ctx);
        self.state.set_side(material.side, ctx);

        let program_changed = self.state.use_program(program_id, program.handle(), ctx);
        let material_changed = self.state.set_material(material.id()) || program_changed;
        if program_changed {
            frame.apply_camera(program, ctx);
            frame.apply_lights(program, ctx);
            frame.apply_fog(program, ctx);
        }
        if material_changed {
            frame.apply_material(program, &material, ctx);
            let mut unit = 0;
            for (name, texture) in material.named_textures() {
                if unit >= self.capabilities.max_texture_units {
                    log::warn!("[RENDERER] Out of texture units for {}", material.id());
                    break;
                }
                if let Some(location) = program.uniform(name) {
                    let handle = upload_texture(&mut self.textures, texture, ctx);
                    ctx.bind_texture(unit, handle);
                    ctx.set_uniform(location, &UniformValue::Int(i32::try_from(unit).unwrap_or(0)));
                    unit += 1;
                }
            }
        }
        frame.apply_object(program, node.world_matrix(), ctx);

        let wireframe = entry.draw_kind == DrawKind::Triangles && material.wireframe;
        if self.state.bind_geometry(group.id(), program_id, wireframe) {
            bind_attributes(group, program, &mut self.state, ctx);
            if entry.draw_kind == DrawKind::Triangles {
                let index = if wireframe { group.buffers.line_index } else { group.buffers.index };
                if let Some(index) = index {
                    ctx.bind_index_buffer(index);
                }
            }
        }

        let counters = &mut self.counters;
        match entry.draw_kind {
            DrawKind::Triangles if wireframe => {
                self.state.set_line_width(material.wireframe_linewidth, ctx);
                ctx.draw_elements(PrimitiveMode::Lines, count_u32(group.line_index_count()), 0);
                counters.vertices += group.vertex_count();
                counters.faces += group.triangle_count();
            }
            DrawKind::Triangles => {
                ctx.draw_elements(PrimitiveMode::Triangles, count_u32(group.index_count()), 0);
                counters.vertices += group.vertex_count();
                counters.faces += group.triangle_count();
            }
            DrawKind::LineStrip | DrawKind::LinePieces => {
                self.state.set_line_width(material.linewidth, ctx);
                let mode = if entry.draw_kind == DrawKind::LineStrip {
                    PrimitiveMode::LineStrip
                } else {
                    PrimitiveMode::Lines
                };
                ctx.draw_arrays(mode, 0, count_u32(group.vertex_count()));
                counters.vertices += group.vertex_count();
            }
            DrawKind::Points => {
                ctx.draw_arrays(PrimitiveMode::Points, 0, count_u32(group.vertex_count()));
                counters.points += group.vertex_count();
            }
        }
        counters.calls += 1;
    }
}

impl<C: GpuContext> Drop for Renderer<C> {
    fn drop(&mut self) {
        for (_, handle) in self.textures.drain() {
            self.ctx.delete_texture(handle);
        }
        for key in self.registry.geometry_keys() {
            self.registry.release_geometry(key, &mut self.ctx);
        }
        for (_, slot) in self.material_programs.drain() {
            if let MaterialProgram::Ready { program, .. } = slot {
                self.programs.release(program, &mut self.ctx);
            }
        }
    }
}

fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn upload_texture(
    textures: &mut HashMap<TextureId, TextureHandle>,
    texture: &TextureRef,
    ctx: &mut dyn GpuContext,
) -> TextureHandle {
    let mut texture = texture.borrow_mut();
    let handle = *textures.entry(texture.id()).or_insert_with(|| ctx.create_texture());
    if texture.needs_update {
        ctx.upload_texture(handle, texture.width, texture.height, &texture.pixels);
        texture.needs_update = false;
        log::trace!("[RENDERER] Uploaded {} ({}x{})", texture.id(), texture.width, texture.height);
    }
    handle
}

fn bind_attributes(
    group: &GeometryGroup,
    program: &ProgramCacheEntry,
    state: &mut GpuStateCache,
    ctx: &mut dyn GpuContext,
) {
    let buffers = &group.buffers;
    let mut streams = vec![
        ("position", buffers.position, 3),
        ("normal", buffers.normal, 3),
        ("uv", buffers.uv, 2),
        ("uv2", buffers.uv2, 2),
        ("color", buffers.color, 3),
        ("tangent", buffers.tangent, 4),
    ];
    let morph_names: Vec<String> = (0..buffers.morph_targets.len()).map(|i| format!("morphTarget{i}")).collect();
    for (name, handle) in morph_names.iter().zip(&buffers.morph_targets) {
        streams.push((name.as_str(), Some(*handle), 3));
    }

    let mut enabled = BTreeSet::new();
    for (name, handle, components) in streams {
        if let (Some(location), Some(handle)) = (program.attribute(name), handle) {
            ctx.bind_vertex_attribute(location, handle, components);
            enabled.insert(location);
        }
    }
    state.enable_attributes(&enabled, ctx);
}
