//! # Rust Renderer
//!
//! A retained-mode 3D scene renderer. The host builds a scene graph of
//! meshes, lines, points and lights; the renderer keeps GPU buffers and
//! shader programs in sync with it and issues the draw calls of each frame
//! through a [`GpuContext`](render::gpu::GpuContext).
//!
//! ## Features
//!
//! - **Scene Graph**: arena-backed hierarchy with world matrix propagation
//! - **Geometry Groups**: faces split into 16-bit index safe chunks
//! - **Dirty Tracking**: only changed vertex data is re-uploaded
//! - **Program Cache**: shader permutations linked once and shared
//! - **Ordered Passes**: front-to-back opaque, back-to-front transparent
//! - **Headless Context**: [`RecordingContext`](render::gpu::RecordingContext)
//!   records every call for tests and inspection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut renderer = Renderer::new(RecordingContext::new(), RendererConfig::default())?;
//!     renderer.set_size(800, 600);
//!
//!     let mut scene = Scene::new();
//!     let geometry = Geometry::from_parts(
//!         vec![Vec3::zeros(), Vec3::x(), Vec3::y()],
//!         vec![Face::triangle(0, 1, 2)],
//!     )
//!     .into_shared();
//!     let material = Material::basic(Color::WHITE).into_shared();
//!     scene.add(SceneNode::mesh(geometry, material).with_position(Vec3::new(0.0, 0.0, -5.0)));
//!
//!     let mut camera = Camera::perspective(60.0, 800.0 / 600.0, 0.1, 100.0);
//!     renderer.render(&mut scene, &mut camera, None, false)?;
//!     println!("{} draw calls", renderer.info().render.calls);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, RendererConfig},
        foundation::math::{Color, Mat4, Quat, Transform, Vec3},
        render::{
            gpu::{GpuContext, RecordingContext},
            RenderError, RenderInfo, RenderPlugin, RenderTarget, Renderer, ShaderLibrary, ShaderTemplate,
            TemplateCatalog,
        },
        scene::{
            Blending, Camera, DirtyFlags, Face, Fog, Geometry, Light, Material, MaterialRef, NodeId, Scene,
            SceneNode, Side, Texture,
        },
    };
}
