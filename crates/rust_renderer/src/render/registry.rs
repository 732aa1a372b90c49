//! Object registrations
//!
//! A scene node becomes drawable once the renderer has registered it. Every
//! registration walks one way through
//! `Unregistered -> Initialized -> Active -> Removed`:
//!
//! - **Initialized**: geometry groups exist (partitioned on the geometry's
//!   first registration, shared afterwards)
//! - **Active**: the geometry's buffers uploaded successfully at least once
//! - **Removed**: the node left the scene; the record is handed back and
//!   never revived. Re-adding the node yields a new object id and a new
//!   registration.
//!
//! Geometry buffers are reference counted by the registrations using them
//! and released with the last one.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::foundation::ids::{GeometryId, ObjectId};
use crate::foundation::math::Color;
use crate::render::buffers::{BufferLayout, BufferSynchronizer};
use crate::render::chunker::{GeometryChunker, GeometryGroup, GroupKind};
use crate::render::gpu::GpuContext;
use crate::scene::geometry::GeometryRef;
use crate::scene::graph::Scene;
use crate::scene::material::Material;
use crate::scene::node::{DrawKind, NodeId, SceneNode};

/// Shared geometry buffers are keyed by geometry and stream kind
pub type GeometryKey = (GeometryId, GroupKind);

/// Lifecycle of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationState {
    /// Not known to the renderer
    Unregistered,
    /// Groups prepared, nothing uploaded yet
    Initialized,
    /// Buffers uploaded, drawable
    Active,
    /// Left the scene
    Removed,
}

/// A registered scene object
#[derive(Debug, Clone)]
pub struct Registration {
    /// Arena key of the node
    pub node: NodeId,
    /// Stable id of the node
    pub object_id: ObjectId,
    /// Geometry buffers drawn
    pub geometry: GeometryKey,
    /// Primitive drawn
    pub draw_kind: DrawKind,
    state: RegistrationState,
    sequence: u64,
}

impl Registration {
    /// Current state
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Registration order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// GPU-side state of one geometry
#[derive(Debug)]
pub struct GeometryBuffers {
    /// Geometry the groups were cut from
    pub geometry: GeometryRef,
    /// Groups in creation order
    pub groups: Vec<GeometryGroup>,
    /// Attribute layout, fixed at first registration
    pub layout: BufferLayout,
    users: usize,
}

impl GeometryBuffers {
    fn prepare(geometry: &GeometryRef, kind: GroupKind, node: &SceneNode) -> Self {
        let shared = geometry.borrow();
        let (groups, layout) = match kind {
            GroupKind::Faces => {
                let layout = match node.kind.materials().first() {
                    Some(material) => BufferLayout::for_faces(&shared, &material.borrow()),
                    None => BufferLayout::for_faces(&shared, &Material::basic(Color::WHITE)),
                };
                (GeometryChunker::partition(&shared), layout)
            }
            GroupKind::VertexStream => {
                (vec![GeometryChunker::vertex_stream(&shared)], BufferLayout::for_vertex_stream(&shared))
            }
        };
        Self { geometry: Rc::clone(geometry), groups, layout, users: 0 }
    }

    /// Registrations sharing these buffers
    pub fn users(&self) -> usize {
        self.users
    }
}

/// Registered objects and their shared geometry buffers
#[derive(Debug, Default)]
pub struct Registry {
    objects: HashMap<ObjectId, Registration>,
    order: BTreeMap<u64, ObjectId>,
    geometries: HashMap<GeometryKey, GeometryBuffers>,
    next_sequence: u64,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node that draws geometry
    ///
    /// Returns `false` for nodes without geometry or an object id, and for
    /// nodes registered already.
    pub fn register(&mut self, node_id: NodeId, node: &SceneNode) -> bool {
        let (Some(object_id), Some(geometry), Some(draw_kind)) =
            (node.object_id(), node.kind.geometry(), node.kind.draw_kind())
        else {
            return false;
        };
        if self.objects.contains_key(&object_id) {
            log::warn!("[REGISTRY] {} is already registered", object_id);
            return false;
        }

        let kind = match draw_kind {
            DrawKind::Triangles => GroupKind::Faces,
            DrawKind::LineStrip | DrawKind::LinePieces | DrawKind::Points => GroupKind::VertexStream,
        };
        let key = (geometry.borrow().id(), kind);

        let buffers = self
            .geometries
            .entry(key)
            .or_insert_with(|| GeometryBuffers::prepare(geometry, kind, node));
        buffers.users += 1;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, object_id);
        self.objects.insert(
            object_id,
            Registration {
                node: node_id,
                object_id,
                geometry: key,
                draw_kind,
                state: RegistrationState::Initialized,
                sequence,
            },
        );
        log::debug!("[REGISTRY] Registered {} ({:?})", object_id, draw_kind);
        true
    }

    /// Remove a registration, releasing geometry buffers nobody else uses
    ///
    /// The returned record is in the `Removed` state.
    pub fn unregister(&mut self, object_id: ObjectId, ctx: &mut dyn GpuContext) -> Option<Registration> {
        let mut registration = self.objects.remove(&object_id)?;
        self.order.remove(&registration.sequence);
        registration.state = RegistrationState::Removed;

        let release = match self.geometries.get_mut(&registration.geometry) {
            Some(buffers) => {
                buffers.users -= 1;
                buffers.users == 0
            }
            None => false,
        };
        if release {
            self.release_geometry(registration.geometry, ctx);
        }
        log::debug!("[REGISTRY] Unregistered {}", object_id);
        Some(registration)
    }

    /// Drop the buffers of a geometry regardless of users
    ///
    /// Registrations drawing it keep their state; their groups are
    /// partitioned again on the next [`Registry::reinitialize`].
    pub fn release_geometry(&mut self, key: GeometryKey, ctx: &mut dyn GpuContext) -> bool {
        let Some(mut buffers) = self.geometries.remove(&key) else {
            return false;
        };
        for group in &mut buffers.groups {
            BufferSynchronizer::release(group, ctx);
        }
        log::debug!("[REGISTRY] Released buffers of {}", key.0);
        true
    }

    /// Rebuild groups for registrations whose geometry was released
    pub fn reinitialize(&mut self, scene: &Scene) {
        let orphaned: Vec<(ObjectId, NodeId, GeometryKey)> = self
            .objects
            .values()
            .filter(|r| !self.geometries.contains_key(&r.geometry))
            .map(|r| (r.object_id, r.node, r.geometry))
            .collect();
        for (object_id, node_id, key) in orphaned {
            let Some(node) = scene.get(node_id) else {
                continue;
            };
            let Some(geometry) = node.kind.geometry() else {
                continue;
            };
            let buffers = self
                .geometries
                .entry(key)
                .or_insert_with(|| GeometryBuffers::prepare(geometry, key.1, node));
            buffers.users += 1;
            log::debug!("[REGISTRY] Rebuilt groups of {} for {}", key.0, object_id);
        }
    }

    /// Mark every registration drawing `key` as active
    pub fn activate(&mut self, key: GeometryKey) {
        for registration in self.objects.values_mut() {
            if registration.geometry == key && registration.state == RegistrationState::Initialized {
                registration.state = RegistrationState::Active;
            }
        }
    }

    /// State of an object; unknown ids are `Unregistered`
    pub fn state(&self, object_id: ObjectId) -> RegistrationState {
        self.objects
            .get(&object_id)
            .map_or(RegistrationState::Unregistered, |r| r.state)
    }

    /// Registration of an object
    pub fn get(&self, object_id: ObjectId) -> Option<&Registration> {
        self.objects.get(&object_id)
    }

    /// Registrations in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.order.values().filter_map(|id| self.objects.get(id))
    }

    /// Geometry buffers by key
    pub fn geometry(&self, key: GeometryKey) -> Option<&GeometryBuffers> {
        self.geometries.get(&key)
    }

    /// Mutable geometry buffers by key
    pub fn geometry_mut(&mut self, key: GeometryKey) -> Option<&mut GeometryBuffers> {
        self.geometries.get_mut(&key)
    }

    /// Keys of every geometry with buffers
    pub fn geometry_keys(&self) -> Vec<GeometryKey> {
        self.geometries.keys().copied().collect()
    }

    /// Keys of every geometry built from `id`
    pub fn keys_for(&self, id: GeometryId) -> Vec<GeometryKey> {
        self.geometries.keys().filter(|k| k.0 == id).copied().collect()
    }

    /// Registered objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Geometries with live buffers
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::gpu::{GpuCommand, RecordingContext};
    use crate::scene::geometry::{Face, Geometry};

    fn mesh_node(scene: &mut Scene, geometry: &GeometryRef) -> NodeId {
        let material = Material::basic(Color::WHITE).into_shared();
        scene.add(SceneNode::mesh(Rc::clone(geometry), material))
    }

    fn triangle() -> GeometryRef {
        Geometry::from_parts(vec![Vec3::zeros(), Vec3::x(), Vec3::y()], vec![Face::triangle(0, 1, 2)]).into_shared()
    }

    #[test]
    fn test_lifecycle_runs_one_way() {
        let mut scene = Scene::new();
        let geometry = triangle();
        let node = mesh_node(&mut scene, &geometry);
        let object_id = scene.get(node).and_then(SceneNode::object_id).unwrap();
        let mut registry = Registry::new();
        let mut ctx = RecordingContext::new();

        assert_eq!(registry.state(object_id), RegistrationState::Unregistered);
        assert!(registry.register(node, scene.get(node).unwrap()));
        assert_eq!(registry.state(object_id), RegistrationState::Initialized);

        let key = registry.get(object_id).unwrap().geometry;
        registry.activate(key);
        assert_eq!(registry.state(object_id), RegistrationState::Active);

        let removed = registry.unregister(object_id, &mut ctx).unwrap();
        assert_eq!(removed.state(), RegistrationState::Removed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shared_geometry_is_partitioned_once() {
        let mut scene = Scene::new();
        let geometry = triangle();
        let a = mesh_node(&mut scene, &geometry);
        let b = mesh_node(&mut scene, &geometry);
        let mut registry = Registry::new();

        registry.register(a, scene.get(a).unwrap());
        registry.register(b, scene.get(b).unwrap());

        assert_eq!(registry.geometry_count(), 1);
        let key = registry.geometry_keys()[0];
        assert_eq!(registry.geometry(key).unwrap().users(), 2);
    }

    #[test]
    fn test_last_user_releases_buffers() {
        let mut scene = Scene::new();
        let geometry = triangle();
        let a = mesh_node(&mut scene, &geometry);
        let b = mesh_node(&mut scene, &geometry);
        let mut registry = Registry::new();
        let mut ctx = RecordingContext::new();
        registry.register(a, scene.get(a).unwrap());
        registry.register(b, scene.get(b).unwrap());

        let key = registry.geometry_keys()[0];
        let buffers = registry.geometry_mut(key).unwrap();
        let (groups, shared, layout) = (&mut buffers.groups, &buffers.geometry, buffers.layout);
        BufferSynchronizer::upload(groups, &mut shared.borrow_mut(), &layout, &mut ctx).unwrap();

        let a_id = scene.get(a).and_then(SceneNode::object_id).unwrap();
        let b_id = scene.get(b).and_then(SceneNode::object_id).unwrap();
        registry.unregister(a_id, &mut ctx);
        assert_eq!(registry.geometry_count(), 1);
        assert_eq!(ctx.count(|c| matches!(c, GpuCommand::DeleteBuffer(_))), 0);

        registry.unregister(b_id, &mut ctx);
        assert_eq!(registry.geometry_count(), 0);
        assert!(ctx.count(|c| matches!(c, GpuCommand::DeleteBuffer(_))) > 0);
    }

    #[test]
    fn test_nodes_without_geometry_are_not_registered() {
        let mut scene = Scene::new();
        let group = scene.add(SceneNode::group());
        let mut registry = Registry::new();
        assert!(!registry.register(group, scene.get(group).unwrap()));
    }

    #[test]
    fn test_released_geometry_is_rebuilt_for_remaining_users() {
        let mut scene = Scene::new();
        let geometry = triangle();
        let node = mesh_node(&mut scene, &geometry);
        let mut registry = Registry::new();
        let mut ctx = RecordingContext::new();
        registry.register(node, scene.get(node).unwrap());
        let key = registry.geometry_keys()[0];

        assert!(registry.release_geometry(key, &mut ctx));
        assert_eq!(registry.geometry_count(), 0);
        registry.reinitialize(&scene);
        assert_eq!(registry.geometry(key).unwrap().users(), 1);
    }
}
