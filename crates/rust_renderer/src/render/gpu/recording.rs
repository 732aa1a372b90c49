//! Headless context that records every call

use std::collections::HashMap;

use super::{
    BlendEquation, BlendFactor, BufferHandle, BufferTarget, BufferUsage, ClearFlags, CullFace,
    FramebufferHandle, FrontFace, GpuCapabilities, GpuContext, PrimitiveMode, ProgramHandle,
    TextureHandle, UniformLocation, UniformValue,
};

/// One recorded context call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// `create_buffer`
    CreateBuffer(BufferHandle),
    /// `upload_buffer`, with the payload size in bytes
    UploadBuffer {
        /// Binding point
        target: BufferTarget,
        /// Buffer written
        buffer: BufferHandle,
        /// Payload size in bytes
        bytes: usize,
        /// Usage hint
        usage: BufferUsage,
    },
    /// `delete_buffer`
    DeleteBuffer(BufferHandle),
    /// `create_program` that linked
    CreateProgram(ProgramHandle),
    /// `create_program` that failed to link
    LinkFailed,
    /// `delete_program`
    DeleteProgram(ProgramHandle),
    /// `use_program`
    UseProgram(ProgramHandle),
    /// `set_uniform`
    SetUniform(UniformLocation),
    /// `enable_vertex_attribute`
    EnableAttribute(u32),
    /// `disable_vertex_attribute`
    DisableAttribute(u32),
    /// `bind_vertex_attribute`
    BindAttribute {
        /// Attribute location
        location: u32,
        /// Source buffer
        buffer: BufferHandle,
        /// Components per vertex
        components: u32,
    },
    /// `bind_index_buffer`
    BindIndexBuffer(BufferHandle),
    /// `draw_elements`
    DrawElements {
        /// Primitive mode
        mode: PrimitiveMode,
        /// Index count
        count: u32,
        /// First index
        offset: u32,
    },
    /// `draw_arrays`
    DrawArrays {
        /// Primitive mode
        mode: PrimitiveMode,
        /// First vertex
        first: u32,
        /// Vertex count
        count: u32,
    },
    /// `set_blend_enabled`
    BlendEnabled(bool),
    /// `set_blend_equation`
    BlendEquation(BlendEquation),
    /// `set_blend_func`
    BlendFunc(BlendFactor, BlendFactor),
    /// `set_depth_test`
    DepthTest(bool),
    /// `set_depth_write`
    DepthWrite(bool),
    /// `set_polygon_offset`
    PolygonOffset(Option<(f32, f32)>),
    /// `set_cull_face`
    CullFace(Option<CullFace>),
    /// `set_front_face`
    FrontFace(FrontFace),
    /// `set_line_width`
    LineWidth(f32),
    /// `set_viewport`
    Viewport(i32, i32, u32, u32),
    /// `set_scissor`
    Scissor(Option<(i32, i32, u32, u32)>),
    /// `set_clear_color`
    ClearColor([f32; 4]),
    /// `clear`
    Clear(ClearFlags),
    /// `create_texture`
    CreateTexture(TextureHandle),
    /// `upload_texture`
    UploadTexture(TextureHandle),
    /// `bind_texture`
    BindTexture(u32, TextureHandle),
    /// `delete_texture`
    DeleteTexture(TextureHandle),
    /// `create_framebuffer`
    CreateFramebuffer(FramebufferHandle),
    /// `bind_framebuffer`
    BindFramebuffer(Option<FramebufferHandle>),
    /// `delete_framebuffer`
    DeleteFramebuffer(FramebufferHandle),
}

#[derive(Debug, Clone)]
struct RecordedProgram {
    source: String,
    uniforms: HashMap<String, UniformLocation>,
}

/// Context that never touches a GPU
///
/// Uniforms and attributes are reported active when their name occurs in the
/// program's source text, which is close enough to a real linker for
/// bookkeeping tests.
#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<GpuCommand>,
    next_handle: u32,
    programs: HashMap<ProgramHandle, RecordedProgram>,
    fail_link_marker: Option<String>,
    capabilities: Option<GpuCapabilities>,
    context_lost: bool,
}

impl RecordingContext {
    /// Context reporting default capabilities
    pub fn new() -> Self {
        Self {
            capabilities: Some(GpuCapabilities::default()),
            ..Default::default()
        }
    }

    /// Context reporting the given capabilities
    pub fn with_capabilities(capabilities: GpuCapabilities) -> Self {
        Self {
            capabilities: Some(capabilities),
            ..Default::default()
        }
    }

    /// Context whose capability query fails, as with a lost context
    pub fn lost() -> Self {
        Self {
            context_lost: true,
            ..Default::default()
        }
    }

    /// Fail linking any program whose source contains `marker`
    pub fn fail_link_when(&mut self, marker: impl Into<String>) {
        self.fail_link_marker = Some(marker.into());
    }

    /// Every recorded command
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Forget recorded commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of commands matching a predicate
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Recorded draw commands
    pub fn draw_calls(&self) -> Vec<&GpuCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::DrawElements { .. } | GpuCommand::DrawArrays { .. }))
            .collect()
    }

    /// Number of buffer uploads
    pub fn buffer_uploads(&self) -> usize {
        self.count(|c| matches!(c, GpuCommand::UploadBuffer { .. }))
    }

    /// Number of programs currently alive
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GpuContext for RecordingContext {
    fn capabilities(&self) -> Result<GpuCapabilities, String> {
        if self.context_lost {
            return Err("context lost".to_string());
        }
        self.capabilities
            .clone()
            .ok_or_else(|| "no context".to_string())
    }

    fn create_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.commands.push(GpuCommand::CreateBuffer(handle));
        handle
    }

    fn upload_buffer(&mut self, target: BufferTarget, buffer: BufferHandle, data: &[u8], usage: BufferUsage) {
        self.commands.push(GpuCommand::UploadBuffer { target, buffer, bytes: data.len(), usage });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(GpuCommand::DeleteBuffer(buffer));
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<ProgramHandle, String> {
        if let Some(marker) = &self.fail_link_marker {
            if vertex_source.contains(marker.as_str()) || fragment_source.contains(marker.as_str()) {
                self.commands.push(GpuCommand::LinkFailed);
                return Err(format!("ERROR: 0:1: '{marker}' : syntax error"));
            }
        }
        let handle = ProgramHandle(self.next());
        self.programs.insert(
            handle,
            RecordedProgram {
                source: format!("{vertex_source}\n{fragment_source}"),
                uniforms: HashMap::new(),
            },
        );
        self.commands.push(GpuCommand::CreateProgram(handle));
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.commands.push(GpuCommand::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let next = self.next_handle + 1;
        let recorded = self.programs.get_mut(&program)?;
        if !recorded.source.contains(name) {
            return None;
        }
        if let Some(location) = recorded.uniforms.get(name) {
            return Some(*location);
        }
        let location = UniformLocation(i32::try_from(next).unwrap_or(i32::MAX));
        recorded.uniforms.insert(name.to_string(), location);
        self.next_handle = next;
        Some(location)
    }

    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32> {
        let recorded = self.programs.get(&program)?;
        if !recorded.source.contains(name) {
            return None;
        }
        let index = recorded.source.find(name).unwrap_or(0);
        Some(u32::try_from(index % 16).unwrap_or(0))
    }

    fn set_uniform(&mut self, location: UniformLocation, _value: &UniformValue) {
        self.commands.push(GpuCommand::SetUniform(location));
    }

    fn enable_vertex_attribute(&mut self, location: u32) {
        self.commands.push(GpuCommand::EnableAttribute(location));
    }

    fn disable_vertex_attribute(&mut self, location: u32) {
        self.commands.push(GpuCommand::DisableAttribute(location));
    }

    fn bind_vertex_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32) {
        self.commands.push(GpuCommand::BindAttribute { location, buffer, components });
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        self.commands.push(GpuCommand::BindIndexBuffer(buffer));
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, offset: u32) {
        self.commands.push(GpuCommand::DrawElements { mode, count, offset });
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        self.commands.push(GpuCommand::DrawArrays { mode, first, count });
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::BlendEnabled(enabled));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.commands.push(GpuCommand::BlendEquation(equation));
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.commands.push(GpuCommand::BlendFunc(src, dst));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::DepthTest(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::DepthWrite(enabled));
    }

    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>) {
        self.commands.push(GpuCommand::PolygonOffset(offset));
    }

    fn set_cull_face(&mut self, cull: Option<CullFace>) {
        self.commands.push(GpuCommand::CullFace(cull));
    }

    fn set_front_face(&mut self, front: FrontFace) {
        self.commands.push(GpuCommand::FrontFace(front));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(GpuCommand::LineWidth(width));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.commands.push(GpuCommand::Viewport(x, y, width, height));
    }

    fn set_scissor(&mut self, rect: Option<(i32, i32, u32, u32)>) {
        self.commands.push(GpuCommand::Scissor(rect));
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.commands.push(GpuCommand::ClearColor(rgba));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.commands.push(GpuCommand::Clear(flags));
    }

    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.commands.push(GpuCommand::CreateTexture(handle));
        handle
    }

    fn upload_texture(&mut self, texture: TextureHandle, _width: u32, _height: u32, _pixels: &[u8]) {
        self.commands.push(GpuCommand::UploadTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(GpuCommand::BindTexture(unit, texture));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.commands.push(GpuCommand::DeleteTexture(texture));
    }

    fn create_framebuffer(&mut self, width: u32, height: u32, _depth: bool, _stencil: bool) -> Result<FramebufferHandle, String> {
        if width == 0 || height == 0 {
            return Err(format!("framebuffer size {width}x{height} is incomplete"));
        }
        let handle = FramebufferHandle(self.next());
        self.commands.push(GpuCommand::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.commands.push(GpuCommand::BindFramebuffer(framebuffer));
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.commands.push(GpuCommand::DeleteFramebuffer(framebuffer));
    }
}
