//! Render plugins
//!
//! Plugins draw outside the render list, before it (shadow maps, sky) or
//! after it (sprites, lens flares). They talk to the context directly, so
//! the renderer forgets its cached GPU state around every plugin call.

use crate::render::gpu::GpuContext;
use crate::scene::camera::Camera;
use crate::scene::graph::Scene;

/// What a plugin gets to see during a frame
pub struct PluginFrame<'a> {
    /// Scene being rendered
    pub scene: &'a Scene,
    /// Camera of the frame
    pub camera: &'a Camera,
    /// Current viewport `(x, y, width, height)`
    pub viewport: (i32, i32, u32, u32),
    /// Graphics context
    pub ctx: &'a mut dyn GpuContext,
}

/// Extra pass run around the main render list
pub trait RenderPlugin {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Called once when the plugin is added
    fn init(&mut self, _ctx: &mut dyn GpuContext) {}

    /// Draw the plugin's pass
    fn render(&mut self, frame: &mut PluginFrame<'_>);
}
