//! Scene graph
//!
//! Nodes live in a `slotmap` arena owned by the [`Scene`]. Children are
//! owned through the parent's ordered child list; the parent link is a
//! non-owning key. The scene root is a fixed key, so finding the root never
//! walks parent links.
//!
//! The scene queues insertions and removals so the renderer can pick them
//! up at the start of the next frame and create or release GPU state.

use slotmap::SlotMap;
use thiserror::Error;

use crate::foundation::ids::{IdAllocator, ObjectId};
use crate::foundation::math::{utils, Color, Mat4, Vec3};
use crate::scene::light::Light;
use crate::scene::material::MaterialRef;
use crate::scene::node::{NodeId, SceneNode};

/// Scene graph errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// The key does not resolve to a live node
    #[error("node {0:?} is not part of this scene")]
    MissingNode(NodeId),
}

/// Scene fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fog {
    /// Linear fog between two distances
    Linear {
        /// Fog color
        color: Color,
        /// Fog start
        near: f32,
        /// Full fog
        far: f32,
    },
    /// Exponential squared fog
    Exp2 {
        /// Fog color
        color: Color,
        /// Density
        density: f32,
    },
}

/// A node removed from the scene since the renderer last looked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedObject {
    /// Arena key the node had
    pub node: NodeId,
    /// Stable id the node had
    pub object_id: ObjectId,
}

/// A light together with its world position
#[derive(Debug, Clone)]
pub struct SceneLight<'a> {
    /// Node carrying the light
    pub node: NodeId,
    /// Light parameters
    pub light: &'a Light,
    /// World position of the node
    pub position: Vec3,
}

/// Scene graph root container
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    /// Scene fog
    pub fog: Option<Fog>,
    /// Draw every object with this material instead of its own
    pub override_material: Option<MaterialRef>,
    added: Vec<NodeId>,
    removed: Vec<RemovedObject>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Scene holding only its root group
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root_node = SceneNode::group().with_name("root");
        root_node.object_id = Some(IdAllocator::object());
        let root = nodes.insert(root_node);
        Self {
            nodes,
            root,
            fog: None,
            override_material: None,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Root key
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Node by key
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Mutable node by key
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Whether the key resolves to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every node, in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Insert a node under the root
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let root = self.root;
        self.insert_under(root, node)
    }

    /// Insert a node under `parent`
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::MissingNode(parent));
        }
        Ok(self.insert_under(parent, node))
    }

    fn insert_under(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        // A node coming back from `remove` is a fresh instance
        node.object_id = Some(IdAllocator::object());
        node.parent = Some(parent);
        node.children.clear();
        node.world_matrix_dirty = true;

        let id = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        self.added.push(id);
        log::trace!("[SCENE] added {:?} under {:?}", id, parent);
        id
    }

    /// Move `child` under `new_parent`
    ///
    /// Rejects self-parenting and parenting under a descendant with a warning
    /// and leaves the graph unchanged. Returns whether the move happened.
    pub fn attach(&mut self, child: NodeId, new_parent: NodeId) -> bool {
        if child == new_parent {
            log::warn!("[SCENE] {:?} cannot be its own parent, ignored", child);
            return false;
        }
        if child == self.root {
            log::warn!("[SCENE] the scene root cannot be re-parented, ignored");
            return false;
        }
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(new_parent) {
            log::warn!("[SCENE] attach of {:?} to {:?} references a missing node, ignored", child, new_parent);
            return false;
        }
        if self.is_ancestor(child, new_parent) {
            log::warn!("[SCENE] {:?} cannot be parented under its own descendant {:?}, ignored", child, new_parent);
            return false;
        }

        self.detach_from_parent(child);
        if let Some(p) = self.nodes.get_mut(new_parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(new_parent);
            c.world_matrix_dirty = true;
        }
        true
    }

    /// Whether `ancestor` is on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    fn detach_from_parent(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            if let Some(pos) = p.children.iter().position(|&c| c == child) {
                p.children.remove(pos);
            }
        }
    }

    /// Remove a node and its whole subtree
    ///
    /// Returns the removed node with its parent and child links severed.
    /// Descendants are dropped. Every removed node is queued for the
    /// renderer to release its GPU registration.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        if id == self.root {
            log::warn!("[SCENE] the scene root cannot be removed, ignored");
            return None;
        }
        if !self.nodes.contains_key(id) {
            return None;
        }
        self.detach_from_parent(id);

        let mut stack = vec![id];
        let mut top = None;
        while let Some(current) = stack.pop() {
            let Some(mut node) = self.nodes.remove(current) else {
                continue;
            };
            stack.extend(node.children.drain(..));
            node.parent = None;
            if let Some(object_id) = node.object_id {
                self.removed.push(RemovedObject { node: current, object_id });
            }
            // A node added and removed within the same frame was never seen
            self.added.retain(|&a| a != current);
            if current == id {
                top = Some(node);
            }
        }
        top
    }

    /// Recompute world matrices below and including `id`
    ///
    /// The world matrix of a node is recomputed when it is dirty or when
    /// `force` is set; children of a recomputed node are always recomputed.
    pub fn update_world_matrix(&mut self, id: NodeId, force: bool) {
        let parent_world = self
            .nodes
            .get(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(p))
            .map(|p| p.world_matrix);

        let mut stack = vec![(id, parent_world, force)];
        while let Some((current, parent_world, force)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.update_local_matrix();

            let recomputed = node.world_matrix_dirty || force;
            if recomputed {
                node.world_matrix = match parent_world {
                    Some(parent) => parent * node.local_matrix(),
                    None => *node.local_matrix(),
                };
                node.world_matrix_dirty = false;
            }

            let world = node.world_matrix;
            stack.extend(node.children.iter().rev().map(|&c| (c, Some(world), recomputed)));
        }
    }

    /// One propagation pass over the whole graph
    pub fn update_world_matrices(&mut self) {
        let root = self.root;
        self.update_world_matrix(root, false);
    }

    /// Nodes whose whole ancestor chain is visible, depth first, children in order
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Visible lights with their world positions
    pub fn lights(&self) -> Vec<SceneLight<'_>> {
        self.visible_nodes()
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(id)?;
                let light = node.kind.light()?;
                Some(SceneLight {
                    node: id,
                    light,
                    position: utils::translation_of(node.world_matrix()),
                })
            })
            .collect()
    }

    /// World matrix of a node
    pub fn world_matrix(&self, id: NodeId) -> Option<&Mat4> {
        self.nodes.get(id).map(SceneNode::world_matrix)
    }

    /// Drain nodes inserted since the last call
    pub(crate) fn take_added(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.added)
    }

    /// Drain nodes removed since the last call
    pub(crate) fn take_removed(&mut self) -> Vec<RemovedObject> {
        std::mem::take(&mut self.removed)
    }
}
