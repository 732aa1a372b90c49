//! # Render List
//!
//! Collects the drawable work of one frame and orders it for submission.
//!
//! ## Architecture
//!
//! - **RenderListEntry**: one geometry group of one registered node, with
//!   the material resolved for the group and the camera-space depth
//! - **RenderList**: opaque and transparent entries kept apart
//!
//! ## Ordering
//!
//! Opaque entries are drawn front to back so early depth rejection kicks
//! in; transparent entries back to front so blending composites. Equal
//! depths are broken by the lower object id (then group id), which keeps
//! the order identical from frame to frame. With sorting disabled entries
//! stay in registration order.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::foundation::ids::{GroupId, ObjectId};
use crate::render::registry::{GeometryKey, Registry};
use crate::scene::camera::Camera;
use crate::scene::frustum::Frustum;
use crate::scene::graph::Scene;
use crate::scene::material::MaterialRef;
use crate::scene::node::{DrawKind, NodeId};

/// One draw call's worth of work
#[derive(Debug, Clone)]
pub struct RenderListEntry {
    /// Node drawn
    pub node: NodeId,
    /// Stable id of the node, the ordering tie breaker
    pub object_id: ObjectId,
    /// Geometry buffers drawn from
    pub geometry: GeometryKey,
    /// Index of the group inside the geometry's buffers
    pub group_index: usize,
    /// Id of the group
    pub group: GroupId,
    /// Primitive drawn
    pub draw_kind: DrawKind,
    /// Material when the entry is drawn in the opaque pass
    pub opaque: Option<MaterialRef>,
    /// Material when the entry is drawn in the transparent pass
    pub transparent: Option<MaterialRef>,
    /// Camera-space depth, larger is farther
    pub z: f32,
    sequence: u64,
}

impl RenderListEntry {
    /// Material of the pass the entry belongs to
    pub fn material(&self) -> Option<&MaterialRef> {
        self.opaque.as_ref().or(self.transparent.as_ref())
    }
}

/// Per-frame draw list
#[derive(Debug, Default)]
pub struct RenderList {
    opaque: Vec<RenderListEntry>,
    transparent: Vec<RenderListEntry>,
}

impl RenderList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the list for `camera`
    ///
    /// Only registrations whose node is visible along its whole ancestor
    /// chain are considered. Runs before any buffer upload, so groups may
    /// still be waiting for their first sync.
    pub fn build(scene: &Scene, camera: &Camera, frustum: &Frustum, registry: &Registry, sort: bool) -> Self {
        let visible: HashSet<NodeId> = scene.visible_nodes().into_iter().collect();
        let mut list = Self::new();

        for registration in registry.iter() {
            if !visible.contains(&registration.node) {
                continue;
            }
            let (Some(node), Some(buffers)) = (scene.get(registration.node), registry.geometry(registration.geometry))
            else {
                continue;
            };

            let world = node.world_matrix();
            let sphere = buffers.geometry.borrow_mut().bounding_sphere().transformed(world);
            let cullable = node.kind.is_cullable() && node.frustum_culled;
            if cullable && !frustum.intersects_sphere(sphere.center, sphere.radius) {
                continue;
            }
            let z = node.render_depth.unwrap_or_else(|| camera.view_depth(&sphere.center));

            for (group_index, group) in buffers.groups.iter().enumerate() {
                let Some(material) = node.kind.material_for(group.material_index()) else {
                    continue;
                };
                let (shown, transparent) = {
                    let m = material.borrow();
                    (m.visible, m.transparent)
                };
                if !shown {
                    continue;
                }
                let entry = RenderListEntry {
                    node: registration.node,
                    object_id: registration.object_id,
                    geometry: registration.geometry,
                    group_index,
                    group: group.id(),
                    draw_kind: registration.draw_kind,
                    opaque: (!transparent).then(|| material.clone()),
                    transparent: transparent.then(|| material.clone()),
                    z,
                    sequence: registration.sequence(),
                };
                if transparent {
                    list.transparent.push(entry);
                } else {
                    list.opaque.push(entry);
                }
            }
        }

        if sort {
            list.sort();
        }
        list
    }

    /// Order both lists
    pub fn sort(&mut self) {
        self.opaque.sort_by(|a, b| a.z.total_cmp(&b.z).then_with(|| tie_break(a, b)));
        self.transparent.sort_by(|a, b| b.z.total_cmp(&a.z).then_with(|| tie_break(a, b)));
    }

    /// Drop every entry drawing from one of `geometries`
    pub fn drop_geometries(&mut self, geometries: &HashSet<GeometryKey>) {
        if geometries.is_empty() {
            return;
        }
        self.opaque.retain(|e| !geometries.contains(&e.geometry));
        self.transparent.retain(|e| !geometries.contains(&e.geometry));
    }

    /// Every entry, opaque first
    pub fn entries(&self) -> impl Iterator<Item = &RenderListEntry> {
        self.opaque.iter().chain(&self.transparent)
    }

    /// Opaque entries in draw order
    pub fn opaque(&self) -> &[RenderListEntry] {
        &self.opaque
    }

    /// Transparent entries in draw order
    pub fn transparent(&self) -> &[RenderListEntry] {
        &self.transparent
    }

    /// Total entries
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// Whether nothing will be drawn
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

fn tie_break(a: &RenderListEntry, b: &RenderListEntry) -> Ordering {
    a.object_id
        .cmp(&b.object_id)
        .then_with(|| a.group.cmp(&b.group))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Color, Vec3};
    use crate::scene::geometry::{Face, Geometry, GeometryRef};
    use crate::scene::material::Material;
    use crate::scene::node::SceneNode;

    struct Fixture {
        scene: Scene,
        camera: Camera,
        registry: Registry,
    }

    impl Fixture {
        fn new() -> Self {
            let mut camera = Camera::perspective(90.0, 1.0, 0.1, 100.0);
            camera.update_world_matrix(None);
            Self { scene: Scene::new(), camera, registry: Registry::new() }
        }

        fn add(&mut self, geometry: &GeometryRef, material: Material, position: Vec3) -> NodeId {
            let node = SceneNode::mesh(geometry.clone(), material.into_shared()).with_position(position);
            let id = self.scene.add(node);
            if let Some(node) = self.scene.get(id) {
                self.registry.register(id, node);
            }
            id
        }

        fn build(&mut self, sort: bool) -> RenderList {
            self.scene.update_world_matrices();
            let frustum = Frustum::from_matrix(&self.camera.view_projection());
            RenderList::build(&self.scene, &self.camera, &frustum, &self.registry, sort)
        }
    }

    fn triangle() -> GeometryRef {
        Geometry::from_parts(vec![Vec3::zeros(), Vec3::x() * 0.1, Vec3::y() * 0.1], vec![Face::triangle(0, 1, 2)])
            .into_shared()
    }

    fn glass() -> Material {
        Material::basic(Color::WHITE).with_opacity(0.5)
    }

    #[test]
    fn test_transparent_entries_sort_back_to_front() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        for depth in [5.0, 1.0, 3.0] {
            fx.add(&geometry, glass(), Vec3::new(0.0, 0.0, -depth));
        }
        let list = fx.build(true);
        let depths: Vec<f32> = list.transparent().iter().map(|e| e.z.round()).collect();
        assert_eq!(depths, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_opaque_entries_sort_front_to_back() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        for depth in [5.0, 1.0, 3.0] {
            fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -depth));
        }
        let list = fx.build(true);
        let depths: Vec<f32> = list.opaque().iter().map(|e| e.z.round()).collect();
        assert_eq!(depths, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_equal_depths_keep_lower_id_first_across_builds() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        let nodes: Vec<NodeId> = (0..4).map(|_| fx.add(&geometry, glass(), Vec3::new(0.0, 0.0, -2.0))).collect();
        for node in &nodes {
            fx.scene.get_mut(*node).unwrap().render_depth = Some(2.0);
        }

        let first: Vec<ObjectId> = fx.build(true).transparent().iter().map(|e| e.object_id).collect();
        let second: Vec<ObjectId> = fx.build(true).transparent().iter().map(|e| e.object_id).collect();
        let mut ascending = first.clone();
        ascending.sort();
        assert_eq!(first, ascending);
        assert_eq!(first, second);
    }

    #[test]
    fn test_culled_and_hidden_nodes_are_skipped() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -2.0));
        fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, 10.0));
        let hidden = fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -3.0));
        fx.scene.get_mut(hidden).unwrap().visible = false;

        assert_eq!(fx.build(true).len(), 1);
    }

    #[test]
    fn test_frustum_culling_can_be_disabled_per_node() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        let behind = fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, 10.0));
        fx.scene.get_mut(behind).unwrap().frustum_culled = false;

        assert_eq!(fx.build(true).len(), 1);
    }

    #[test]
    fn test_unsorted_list_keeps_registration_order() {
        let mut fx = Fixture::new();
        let geometry = triangle();
        let far = fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -9.0));
        let near = fx.add(&geometry, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -1.0));

        let list = fx.build(false);
        let order: Vec<NodeId> = list.opaque().iter().map(|e| e.node).collect();
        assert_eq!(order, vec![far, near]);
    }

    #[test]
    fn test_dropped_geometries_leave_the_list() {
        let mut fx = Fixture::new();
        let kept = triangle();
        let failed = triangle();
        fx.add(&kept, Material::basic(Color::WHITE), Vec3::new(0.0, 0.0, -2.0));
        fx.add(&failed, glass(), Vec3::new(0.0, 0.0, -3.0));
        let failed_id = failed.borrow().id();

        let mut list = fx.build(true);
        let skip: HashSet<GeometryKey> = fx.registry.keys_for(failed_id).into_iter().collect();
        list.drop_geometries(&skip);

        assert_eq!(list.len(), 1);
        assert!(list.entries().all(|e| e.geometry.0 != failed_id));
    }
}
