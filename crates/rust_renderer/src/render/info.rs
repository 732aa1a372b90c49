//! Frame statistics

/// Counters reset at the start of every frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCounters {
    /// Draw calls issued
    pub calls: usize,
    /// Vertices submitted
    pub vertices: usize,
    /// Triangles submitted, two per quad
    pub faces: usize,
    /// Points submitted
    pub points: usize,
}

/// Resources currently resident on the GPU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    /// Linked programs
    pub programs: usize,
    /// Geometries with buffers
    pub geometries: usize,
    /// Uploaded textures
    pub textures: usize,
}

/// Read-only view of renderer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Per-frame counters
    pub render: RenderCounters,
    /// Resident resources
    pub memory: MemoryCounters,
}
