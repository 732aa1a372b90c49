//! # Rendering System
//!
//! Turns a [`Scene`](crate::scene::Scene) into GPU draw calls through a
//! [`GpuContext`](gpu::GpuContext).
//!
//! ## Architecture
//!
//! - **Renderer**: frame orchestration and the public API
//! - **Registry**: which scene objects the renderer knows, and their shared
//!   geometry buffers
//! - **Chunker / Buffers**: 16-bit index safe groups and dirty-flag uploads
//! - **Program**: shader templates, permutation keys, linked program cache
//! - **Render List / State**: culling, depth ordering and state diffing
//! - **Plugins / Targets**: extra passes and off-screen framebuffers

pub mod buffers;
pub mod chunker;
pub mod error;
pub mod frame_uniforms;
pub mod gpu;
pub mod info;
pub mod lights;
pub mod plugin;
pub mod program;
pub mod registry;
pub mod render_list;
pub mod renderer;
pub mod state;
pub mod target;

pub use buffers::{BufferLayout, BufferSynchronizer, GroupBuffers};
pub use chunker::{GeometryChunker, GeometryGroup, GroupKind, MAX_GROUP_VERTICES};
pub use error::{RenderError, RenderResult};
pub use gpu::{GpuCapabilities, GpuCommand, GpuContext, RecordingContext};
pub use info::{MemoryCounters, RenderCounters, RenderInfo};
pub use lights::LightUniforms;
pub use plugin::{PluginFrame, RenderPlugin};
pub use program::{ProgramCache, ProgramError, ShaderId, ShaderLibrary, ShaderTemplate, TemplateCatalog};
pub use registry::{GeometryKey, Registration, RegistrationState, Registry};
pub use render_list::{RenderList, RenderListEntry};
pub use renderer::Renderer;
pub use state::GpuStateCache;
pub use target::RenderTarget;
