//! GPU context abstraction
//!
//! The renderer reaches the graphics API only through [`GpuContext`]. The
//! trait mirrors a GL-style immediate API: create/upload/delete buffers,
//! link programs, look up uniform and attribute locations, toggle fixed
//! function state and issue draws. Context creation and presentation belong
//! to the embedding application.
//!
//! [`RecordingContext`] is a headless implementation that records every
//! call, used for tests and for inspecting what a frame would submit.

mod recording;

pub use recording::{GpuCommand, RecordingContext};

use bitflags::bitflags;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a linked GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to an off-screen framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

/// Location of a uniform inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Buffer binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data
    ElementArray,
}

/// Upload usage hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once, drawn many times
    Static,
    /// Rewritten often
    Dynamic,
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    /// Separate triangles
    Triangles,
    /// Separate line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Points
    Points,
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    /// `src + dst`
    Add,
    /// `src - dst`
    Subtract,
    /// `dst - src`
    ReverseSubtract,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// min(source alpha, 1 - destination alpha)
    SrcAlphaSaturate,
}

/// Faces removed by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
}

/// Winding treated as front facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise
    Ccw,
    /// Clockwise
    Cw,
}

bitflags! {
    /// Buffers cleared by [`GpuContext::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Color buffer
        const COLOR = 1 << 0;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

/// Uniform payload
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// `int` / sampler unit
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `mat3`, column major
    Mat3([f32; 9]),
    /// `mat4`, column major
    Mat4([f32; 16]),
    /// `float[]`
    FloatArray(Vec<f32>),
    /// `vec3[]`, flattened
    Vec3Array(Vec<f32>),
}

/// Limits and optional features reported by a context
#[derive(Debug, Clone, PartialEq)]
pub struct GpuCapabilities {
    /// Vertex attribute slots
    pub max_vertex_attributes: u32,
    /// Fragment texture units
    pub max_texture_units: u32,
    /// Vertex texture units, 0 when vertex texture fetch is missing
    pub max_vertex_texture_units: u32,
    /// Largest texture edge
    pub max_texture_size: u32,
    /// Float textures supported
    pub float_textures: bool,
    /// `OES_standard_derivatives` or equivalent
    pub standard_derivatives: bool,
}

impl Default for GpuCapabilities {
    fn default() -> Self {
        Self {
            max_vertex_attributes: 16,
            max_texture_units: 16,
            max_vertex_texture_units: 4,
            max_texture_size: 4096,
            float_textures: true,
            standard_derivatives: true,
        }
    }
}

/// GL-style graphics context
///
/// Implementations are bound to the thread that owns the context. Methods
/// that can fail at the API level return `Err` with the driver's message;
/// everything else is fire-and-forget, as with the underlying API.
pub trait GpuContext {
    /// Limits of the context, `Err` if the context is unusable (lost or missing)
    fn capabilities(&self) -> Result<GpuCapabilities, String>;

    /// Create an empty buffer
    fn create_buffer(&mut self) -> BufferHandle;

    /// Replace a buffer's contents
    fn upload_buffer(&mut self, target: BufferTarget, buffer: BufferHandle, data: &[u8], usage: BufferUsage);

    /// Delete a buffer
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Compile and link a program, `Err` carries the info log
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<ProgramHandle, String>;

    /// Delete a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Location of a named uniform, `None` if inactive
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Location of a named attribute, `None` if inactive
    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32>;

    /// Set a uniform of the current program
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    /// Enable an attribute array
    fn enable_vertex_attribute(&mut self, location: u32);

    /// Disable an attribute array
    fn disable_vertex_attribute(&mut self, location: u32);

    /// Point an attribute at a float buffer with `components` per vertex
    fn bind_vertex_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32);

    /// Bind a 16-bit index buffer
    fn bind_index_buffer(&mut self, buffer: BufferHandle);

    /// Indexed draw from the bound 16-bit index buffer
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, offset: u32);

    /// Non-indexed draw
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);

    /// Toggle blending
    fn set_blend_enabled(&mut self, enabled: bool);

    /// Set the blend equation
    fn set_blend_equation(&mut self, equation: BlendEquation);

    /// Set the blend factors
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Toggle depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Toggle depth writes
    fn set_depth_write(&mut self, enabled: bool);

    /// Set or disable polygon offset `(factor, units)`
    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>);

    /// Set or disable face culling
    fn set_cull_face(&mut self, cull: Option<CullFace>);

    /// Set the front face winding
    fn set_front_face(&mut self, front: FrontFace);

    /// Set the rasterized line width
    fn set_line_width(&mut self, width: f32);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Set or disable the scissor rectangle
    fn set_scissor(&mut self, rect: Option<(i32, i32, u32, u32)>);

    /// Set the clear color
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Clear the selected buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags);

    /// Create an empty texture
    fn create_texture(&mut self) -> TextureHandle;

    /// Upload texture pixels
    fn upload_texture(&mut self, texture: TextureHandle, width: u32, height: u32, pixels: &[u8]);

    /// Bind a texture to a unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Delete a texture
    fn delete_texture(&mut self, texture: TextureHandle);

    /// Create a framebuffer with color, and optionally depth and stencil attachments
    fn create_framebuffer(&mut self, width: u32, height: u32, depth: bool, stencil: bool) -> Result<FramebufferHandle, String>;

    /// Bind a framebuffer, `None` for the default one
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Delete a framebuffer
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
}
