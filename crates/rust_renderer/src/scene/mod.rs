//! Scene description
//!
//! The retained scene the renderer draws from:
//!
//! ```text
//! Scene (arena + root)
//!   └── SceneNode (transform, visibility, NodeKind)
//!         ├── Mesh   → Geometry + Material(s)
//!         ├── Line   → Geometry + Material
//!         ├── Points → Geometry + Material
//!         └── Light
//! ```
//!
//! Geometry, materials and textures are shared between nodes through
//! `Rc<RefCell<_>>` handles; the whole scene is confined to one thread.

pub mod bounds;
pub mod camera;
pub mod frustum;
pub mod geometry;
pub mod graph;
pub mod light;
pub mod material;
pub mod node;
pub mod texture;

pub use bounds::{Aabb, BoundingSphere};
pub use camera::{Camera, Projection};
pub use frustum::{Frustum, Plane};
pub use geometry::{DirtyFlags, Face, FaceIndices, Geometry, GeometryRef};
pub use graph::{Fog, RemovedObject, Scene, SceneError, SceneLight};
pub use light::{Light, LightCounts, LightKind};
pub use material::{Blending, Material, MaterialKind, MaterialRef, MeshMaterial, Shading, Side, VertexColors};
pub use node::{DrawKind, LineMode, NodeId, NodeKind, SceneNode};
pub use texture::{Texture, TextureRef};
