//! Off-screen render targets

use crate::foundation::ids::{IdAllocator, RenderTargetId};
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{FramebufferHandle, GpuContext};

/// Framebuffer the renderer can draw into instead of the screen
///
/// The GPU framebuffer is created on first use and recreated after a
/// resize.
#[derive(Debug)]
pub struct RenderTarget {
    id: RenderTargetId,
    width: u32,
    height: u32,
    /// Attach a depth buffer
    pub depth_buffer: bool,
    /// Attach a stencil buffer
    pub stencil_buffer: bool,
    framebuffer: Option<FramebufferHandle>,
    stale: Option<FramebufferHandle>,
}

impl RenderTarget {
    /// Target with depth and no stencil buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: IdAllocator::render_target(),
            width,
            height,
            depth_buffer: true,
            stencil_buffer: false,
            framebuffer: None,
            stale: None,
        }
    }

    /// Target id
    pub fn id(&self) -> RenderTargetId {
        self.id
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize; the framebuffer is rebuilt on next use
    pub fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(old) = self.framebuffer.take() {
            self.stale = Some(old);
        }
    }

    /// Framebuffer handle, if created
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    /// Create the framebuffer if needed
    pub(crate) fn ensure(&mut self, ctx: &mut dyn GpuContext) -> RenderResult<FramebufferHandle> {
        if let Some(stale) = self.stale.take() {
            ctx.delete_framebuffer(stale);
        }
        if let Some(handle) = self.framebuffer {
            return Ok(handle);
        }
        let handle = ctx
            .create_framebuffer(self.width, self.height, self.depth_buffer, self.stencil_buffer)
            .map_err(|reason| RenderError::RenderTargetFailed { width: self.width, height: self.height, reason })?;
        log::debug!("[TARGET] Created {} ({}x{})", self.id, self.width, self.height);
        self.framebuffer = Some(handle);
        Ok(handle)
    }

    /// Delete the framebuffer
    pub fn dispose(&mut self, ctx: &mut dyn GpuContext) {
        for handle in [self.framebuffer.take(), self.stale.take()].into_iter().flatten() {
            ctx.delete_framebuffer(handle);
        }
    }
}
