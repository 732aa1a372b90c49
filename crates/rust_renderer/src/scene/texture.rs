//! Opaque texture resources
//!
//! Decoding happens elsewhere; the renderer only sees dimensions, a pixel
//! payload and the `needs_update` flag.

use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::ids::{IdAllocator, TextureId};

/// Shared, single-threaded handle to a texture
pub type TextureRef = Rc<RefCell<Texture>>;

/// Texture handed to the GPU as-is
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Decoded pixels, format agreed between loader and context
    pub pixels: Rc<[u8]>,
    /// Pixels changed and must be re-uploaded
    pub needs_update: bool,
}

impl Texture {
    /// Texture with a fresh id, pending first upload
    pub fn new(width: u32, height: u32, pixels: impl Into<Rc<[u8]>>) -> Self {
        Self {
            id: IdAllocator::texture(),
            width,
            height,
            pixels: pixels.into(),
            needs_update: true,
        }
    }

    /// Wrap in a shared handle
    pub fn into_shared(self) -> TextureRef {
        Rc::new(RefCell::new(self))
    }

    /// Texture id
    pub fn id(&self) -> TextureId {
        self.id
    }
}
