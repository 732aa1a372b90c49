//! Process-wide monotonic id allocation
//!
//! Every id family (scene objects, geometries, materials, geometry groups,
//! programs, textures, shader sources) has its own counter. Counters start
//! at 1 when the process starts and are never reset or reused, so keys that
//! combine ids from different families (for example a geometry group id
//! paired with a program id) stay unique for the whole session.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

id_type!(
    /// Stable id of a scene object, used as the render-order tie breaker
    ObjectId
);
id_type!(
    /// Id of a geometry
    GeometryId
);
id_type!(
    /// Id of a material
    MaterialId
);
id_type!(
    /// Id of a geometry group (GPU chunk)
    GroupId
);
id_type!(
    /// Id of a linked GPU program
    ProgramId
);
id_type!(
    /// Id of a texture
    TextureId
);
id_type!(
    /// Id of a custom shader template
    ShaderSourceId
);
id_type!(
    /// Id of an off-screen render target
    RenderTargetId
);

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);
static NEXT_GEOMETRY: AtomicU64 = AtomicU64::new(1);
static NEXT_MATERIAL: AtomicU64 = AtomicU64::new(1);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);
static NEXT_PROGRAM: AtomicU64 = AtomicU64::new(1);
static NEXT_TEXTURE: AtomicU64 = AtomicU64::new(1);
static NEXT_SHADER_SOURCE: AtomicU64 = AtomicU64::new(1);
static NEXT_RENDER_TARGET: AtomicU64 = AtomicU64::new(1);

/// Allocator service for every id family
///
/// Stateless handle over the process-wide counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdAllocator;

impl IdAllocator {
    /// Next scene object id
    pub fn object() -> ObjectId {
        ObjectId(NEXT_OBJECT.fetch_add(1, Ordering::Relaxed))
    }

    /// Next geometry id
    pub fn geometry() -> GeometryId {
        GeometryId(NEXT_GEOMETRY.fetch_add(1, Ordering::Relaxed))
    }

    /// Next material id
    pub fn material() -> MaterialId {
        MaterialId(NEXT_MATERIAL.fetch_add(1, Ordering::Relaxed))
    }

    /// Next geometry group id
    pub fn group() -> GroupId {
        GroupId(NEXT_GROUP.fetch_add(1, Ordering::Relaxed))
    }

    /// Next program id
    pub fn program() -> ProgramId {
        ProgramId(NEXT_PROGRAM.fetch_add(1, Ordering::Relaxed))
    }

    /// Next texture id
    pub fn texture() -> TextureId {
        TextureId(NEXT_TEXTURE.fetch_add(1, Ordering::Relaxed))
    }

    /// Next shader source id
    pub fn shader_source() -> ShaderSourceId {
        ShaderSourceId(NEXT_SHADER_SOURCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Next render target id
    pub fn render_target() -> RenderTargetId {
        RenderTargetId(NEXT_RENDER_TARGET.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = IdAllocator::group();
        let b = IdAllocator::group();
        let c = IdAllocator::group();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_families_are_independent() {
        let before = IdAllocator::program();
        let _ = IdAllocator::group();
        let _ = IdAllocator::group();
        let after = IdAllocator::program();
        assert!(after.0 > before.0);
    }
}
