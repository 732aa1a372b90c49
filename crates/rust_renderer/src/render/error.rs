//! Renderer error types

use thiserror::Error;

use crate::config::ConfigError;
use crate::foundation::ids::{GeometryId, GroupId};
use crate::render::program::ProgramError;

/// Errors raised by the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// The context could not be queried or is unusable
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A capability the renderer relies on is missing
    #[error("Missing GPU capability: {0}")]
    MissingCapability(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The render target could not be created
    #[error("Render target {width}x{height} failed: {reason}")]
    RenderTargetFailed {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Driver message
        reason: String,
    },

    /// Geometry changed shape after its buffers were sized
    #[error("Geometry {geometry} changed structure after upload ({what}: {expected} -> {actual})")]
    GeometryStructureChanged {
        /// Geometry that changed
        geometry: GeometryId,
        /// Which part changed
        what: &'static str,
        /// Size at buffer creation
        expected: usize,
        /// Size now
        actual: usize,
    },

    /// A group exceeds the 16-bit index range
    #[error("Geometry group {group} holds {vertices} vertices, more than 16-bit indices address")]
    GroupOverflow {
        /// Offending group
        group: GroupId,
        /// Its vertex count
        vertices: usize,
    },

    /// Program acquisition failed
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
