//! Scene container
//!
//! Owns the node arena, the root list and the mesh/material pools, and
//! implements everything that needs the whole hierarchy: attach/detach,
//! dirty-mark propagation, the per-frame geometric refresh and the
//! traversal entry points.
//!
//! # Ownership model
//!
//! Group nodes exclusively own their child lists; each child holds a
//! non-owning back-reference (an arena key) to its parent for upward
//! dirty propagation and ancestor-chain lookups. The arena is the single
//! owner of every node, so back-references never extend lifetimes.
//!
//! # Refresh ordering
//!
//! Transform refresh is strictly top-down (a parent's world matrix is
//! final before any child composes against it); render-state resolution
//! walks the same pre-order with an ancestor-first per-category stack.
//! Both passes use explicit work stacks so deep hierarchies cannot
//! overflow the call stack.

use glam::Affine3A;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::errors::{MercuryError, Result};
use crate::render::bucket::BucketKind;
use crate::render::state::{RenderStateRef, StateCategory, STATE_CATEGORY_COUNT};
use crate::resources::{Material, MaterialKey, Mesh, MeshKey};
use crate::scene::camera::RenderLayer;
use crate::scene::environment::{EnvironmentBag, EnvironmentElement, ResolutionMode};
use crate::scene::node::{DirtyFlags, NodeKind, SceneNode};
use crate::scene::transform::Transform;
use crate::scene::NodeKey;

/// Visiting order for [`Scene::visit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Parents before children.
    PreOrder,
    /// Children before parents.
    PostOrder,
}

pub struct Scene {
    pub(crate) nodes: SlotMap<NodeKey, SceneNode>,
    pub root_nodes: Vec<NodeKey>,

    // === Resource pools ===
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub materials: SlotMap<MaterialKey, Material>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            meshes: SlotMap::with_key(),
            materials: SlotMap::with_key(),
        }
    }

    // ========================================================================
    // Node creation & removal
    // ========================================================================

    /// Inserts a detached node as a new root.
    pub fn add_node(&mut self, node: SceneNode) -> NodeKey {
        let key = self.nodes.insert(node);
        self.root_nodes.push(key);
        key
    }

    /// Creates a group node at the root.
    pub fn create_group(&mut self, name: &str) -> Result<NodeKey> {
        let node = SceneNode::group(name)?;
        Ok(self.add_node(node))
    }

    /// Creates a leaf node at the root, taking ownership of its mesh and
    /// material.
    pub fn create_leaf(&mut self, name: &str, mesh: Mesh, material: Material) -> Result<NodeKey> {
        let mesh_key = self.meshes.insert(mesh);
        let material_key = self.materials.insert(material);
        match SceneNode::leaf(name, mesh_key, material_key) {
            Ok(node) => Ok(self.add_node(node)),
            Err(e) => {
                self.meshes.remove(mesh_key);
                self.materials.remove(material_key);
                Err(e)
            }
        }
    }

    /// Removes a node and its entire subtree, releasing leaf resources.
    pub fn remove_node(&mut self, key: NodeKey) {
        let children: Vec<NodeKey> = match self.nodes.get(key) {
            Some(node) => node.children().to_vec(),
            None => return,
        };

        for child in children {
            self.remove_node(child);
        }

        let parent = self.nodes.get(key).and_then(SceneNode::parent);
        if let Some(parent_key) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent_key) {
                if let NodeKind::Group { children } = &mut parent_node.kind {
                    children.retain(|&c| c != key);
                }
            }
        } else {
            self.root_nodes.retain(|&k| k != key);
        }

        if let Some(node) = self.nodes.get(key) {
            if let Some((mesh, material)) = node.geometry() {
                self.meshes.remove(mesh);
                self.materials.remove(material);
            }
        }

        self.nodes.remove(key);
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub(crate) fn try_node(&self, key: NodeKey) -> Result<&SceneNode> {
        self.nodes.get(key).ok_or(MercuryError::NodeNotFound(key))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &SceneNode)> {
        self.nodes.iter()
    }

    /// First node with the given name, in arena order.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name() == name)
            .map(|(key, _)| key)
    }

    pub fn set_name(&mut self, key: NodeKey, name: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or(MercuryError::NodeNotFound(key))?;
        node.set_name(name)
    }

    /// The node's cached world matrix.
    ///
    /// Fails fast while the node or any ancestor carries a TRANSFORM
    /// dirty mark. An ancestor can be dirtied by an edit in a sibling
    /// subtree (upward propagation) without this node's cache going
    /// stale; the read is still rejected until the chain is refreshed.
    pub fn world_transform(&self, key: NodeKey) -> Result<&Affine3A> {
        let mut current = self.try_node(key)?.parent();
        while let Some(k) = current {
            let node = self.try_node(k)?;
            if node.dirty.contains(DirtyFlags::TRANSFORM) {
                return Err(MercuryError::StaleWorldTransform(node.name().to_owned()));
            }
            current = node.parent();
        }
        self.try_node(key)?.world_transform()
    }

    // ========================================================================
    // Mutation entry points (these own dirty propagation)
    // ========================================================================

    /// Mutable access to a node's local transform.
    ///
    /// Marks the node transform-dirty (with full up/down propagation)
    /// before handing out the reference, so the stale-read guard engages
    /// immediately.
    pub fn transform_mut(&mut self, key: NodeKey) -> Option<&mut Transform> {
        self.nodes.get(key)?;
        self.mark_dirty(key, DirtyFlags::TRANSFORM);
        self.nodes.get_mut(key).map(|node| &mut node.transform)
    }

    /// Mutable access to a node's environment bag. Environment data does
    /// not participate in dirty tracking: lookups resolve lazily.
    pub fn node_environment_mut(&mut self, key: NodeKey) -> Option<&mut EnvironmentBag> {
        self.nodes.get_mut(key).map(|node| &mut node.environment)
    }

    pub fn set_bucket(&mut self, key: NodeKey, bucket: BucketKind) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.bucket = bucket;
        }
    }

    pub fn set_layer(&mut self, key: NodeKey, layer: Option<RenderLayer>) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.layer = layer;
        }
    }

    /// Installs a local render-state override (replacing any previous
    /// override of the same category) and re-dirties the subtree.
    pub fn set_render_state(&mut self, key: NodeKey, state: RenderStateRef) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.set_state_override(state);
            self.mark_dirty(key, DirtyFlags::RENDER_STATE);
        }
    }

    pub fn clear_render_state(&mut self, key: NodeKey, category: StateCategory) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.clear_state_override(category);
            self.mark_dirty(key, DirtyFlags::RENDER_STATE);
        }
    }

    // ========================================================================
    // Hierarchy: attach / detach
    // ========================================================================

    /// Whether `ancestor` appears on `node`'s parent chain.
    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = self.nodes.get(node).and_then(SceneNode::parent);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(SceneNode::parent);
        }
        false
    }

    /// Attaches `child` under `parent`, detaching it from any previous
    /// parent first. A node has exactly one parent at a time.
    ///
    /// Rejected (warning logged, tree untouched) when:
    /// - `child == parent`, or `parent` lies inside `child`'s subtree
    ///   (either would create a cycle)
    /// - `parent` is a leaf
    /// - either key is dead
    ///
    /// Returns whether the attachment happened.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> bool {
        if child == parent {
            log::warn!("Cannot attach a node to itself");
            return false;
        }
        if self.nodes.get(child).is_none() || self.nodes.get(parent).is_none() {
            log::warn!("Attach with a dead node key ignored");
            return false;
        }
        if self.is_ancestor_of(child, parent) {
            log::warn!("Cannot attach a node to its own descendant");
            return false;
        }
        if self.nodes[parent].is_leaf() {
            log::warn!("Cannot attach children to leaf node '{}'", self.nodes[parent].name());
            return false;
        }

        // 1. Detach from the old parent (or the root list).
        let old_parent = self.nodes[child].parent;
        if let Some(op) = old_parent {
            if let Some(old) = self.nodes.get_mut(op) {
                if let NodeKind::Group { children } = &mut old.kind {
                    children.retain(|&c| c != child);
                }
            }
        } else {
            self.root_nodes.retain(|&k| k != child);
        }

        // 2. Attach to the new parent.
        if let NodeKind::Group { children } = &mut self.nodes[parent].kind {
            children.push(child);
        }
        let child_node = &mut self.nodes[child];
        child_node.parent = Some(parent);
        child_node.transform.mark_dirty();

        // The new ancestor chain invalidates the whole moved subtree.
        self.mark_dirty(child, DirtyFlags::TRANSFORM | DirtyFlags::RENDER_STATE);
        true
    }

    /// Detaches a node from its parent, returning it to the root list.
    /// Returns whether the node had a parent.
    pub fn detach(&mut self, key: NodeKey) -> bool {
        let Some(parent) = self.nodes.get(key).and_then(SceneNode::parent) else {
            return false;
        };

        if let Some(parent_node) = self.nodes.get_mut(parent) {
            if let NodeKind::Group { children } = &mut parent_node.kind {
                children.retain(|&c| c != key);
            }
        }

        let node = &mut self.nodes[key];
        node.parent = None;
        node.transform.mark_dirty();
        self.root_nodes.push(key);

        self.mark_dirty(key, DirtyFlags::TRANSFORM | DirtyFlags::RENDER_STATE);
        true
    }

    // ========================================================================
    // Dirty marks
    // ========================================================================

    /// Marks `key` dirty.
    ///
    /// TRANSFORM propagates to every descendant (their cached world
    /// matrices compose against this node's) and to every ancestor (their
    /// derived data, e.g. queue distances, reads down the chain).
    /// RENDER_STATE propagates to descendants only: a local override never
    /// affects what is above it.
    pub fn mark_dirty(&mut self, key: NodeKey, flags: DirtyFlags) {
        if flags.is_empty() || self.nodes.get(key).is_none() {
            return;
        }

        // Downward: the whole subtree.
        let mut stack: SmallVec<[NodeKey; 16]> = SmallVec::new();
        stack.push(key);
        while let Some(k) = stack.pop() {
            let Some(node) = self.nodes.get_mut(k) else {
                continue;
            };
            node.dirty.insert(flags);
            stack.extend(node.children().iter().copied());
        }

        // Upward: transform dirt only.
        if flags.contains(DirtyFlags::TRANSFORM) {
            let mut current = self.nodes.get(key).and_then(SceneNode::parent);
            while let Some(k) = current {
                let Some(node) = self.nodes.get_mut(k) else {
                    break;
                };
                node.dirty.insert(DirtyFlags::TRANSFORM);
                current = node.parent;
            }
        }
    }

    #[must_use]
    pub fn is_dirty(&self, key: NodeKey, flags: DirtyFlags) -> bool {
        self.nodes
            .get(key)
            .is_some_and(|node| node.dirty.intersects(flags))
    }

    // ========================================================================
    // Geometric refresh
    // ========================================================================

    /// Refreshes the whole scene: resolves every dirty world matrix and
    /// bakes effective render states, clearing the marks.
    ///
    /// This is the once-per-frame entry point the renderer calls before
    /// filling buckets.
    pub fn update_geometric_state(&mut self) {
        let roots = self.root_nodes.clone();
        for root in roots {
            // Roots have no parent, so the top-down precondition holds.
            self.update_subtree_inner(root);
        }
    }

    /// Refreshes a single subtree.
    ///
    /// The subtree's parent must already be clean: refresh is top-down,
    /// and composing against a stale parent world matrix would clear the
    /// dirty marks while caching wrong data. A transform-dirty parent is
    /// rejected with [`MercuryError::StaleWorldTransform`] before
    /// anything is touched.
    ///
    /// Clean nodes are skipped cheaply, but the walk always continues
    /// downward: a child can be dirty independently of its parent
    /// (render-state dirt never propagates upward).
    pub fn update_subtree(&mut self, key: NodeKey) -> Result<()> {
        if let Some(parent) = self.try_node(key)?.parent() {
            let parent_node = &self.nodes[parent];
            if parent_node.dirty.contains(DirtyFlags::TRANSFORM) {
                return Err(MercuryError::StaleWorldTransform(
                    parent_node.name().to_owned(),
                ));
            }
        }
        self.update_subtree_inner(key);
        Ok(())
    }

    /// The walk behind [`Self::update_subtree`]. Callers must have
    /// established the top-down precondition; inner nodes satisfy it by
    /// construction (a dirty parent refreshes its whole subtree before
    /// its children are revisited).
    fn update_subtree_inner(&mut self, key: NodeKey) {
        let mut stack: Vec<NodeKey> = vec![key];
        while let Some(k) = stack.pop() {
            let Some(node) = self.nodes.get(k) else {
                continue;
            };
            let dirty = node.dirty;

            if dirty.contains(DirtyFlags::TRANSFORM) {
                self.refresh_transforms(k);
            }
            if dirty.contains(DirtyFlags::RENDER_STATE) {
                self.resolve_render_states(k);
            }

            if let Some(node) = self.nodes.get(k) {
                stack.extend(node.children().iter().copied());
            }
        }
    }

    /// Pre-order transform refresh over one subtree.
    ///
    /// The parent of `start` must already be clean: refresh is top-down
    /// by construction, which is what makes composing against the
    /// parent's world matrix sound.
    fn refresh_transforms(&mut self, start: NodeKey) {
        let parent_world = match self.nodes.get(start).and_then(SceneNode::parent) {
            Some(parent) => {
                let parent_node = &self.nodes[parent];
                debug_assert!(
                    !parent_node.dirty.contains(DirtyFlags::TRANSFORM),
                    "transform refresh must proceed top-down: parent '{}' is still dirty",
                    parent_node.name()
                );
                parent_node.world_matrix
            }
            None => Affine3A::IDENTITY,
        };

        let mut stack: Vec<(NodeKey, Affine3A)> = vec![(start, parent_world)];
        while let Some((k, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(k) else {
                continue;
            };
            node.transform.update_local_matrix();
            node.world_matrix = parent_world * *node.transform.local_matrix();
            node.dirty.remove(DirtyFlags::TRANSFORM);

            let world = node.world_matrix;
            let children: SmallVec<[NodeKey; 8]> = node.children().iter().copied().collect();
            for child in children {
                stack.push((child, world));
            }
        }
    }

    /// Pre-order render-state resolution over one subtree.
    ///
    /// Maintains one stack per category. Ancestor overrides are seeded
    /// first (outermost at the bottom), each visited node pushes its own
    /// overrides, bakes the stack tops as its effective states, and pops
    /// on the way back up, so the nearest override on the path wins.
    fn resolve_render_states(&mut self, start: NodeKey) {
        let mut category_stacks: [Vec<RenderStateRef>; STATE_CATEGORY_COUNT] = Default::default();

        // Seed from the ancestor chain, root first.
        let mut chain: SmallVec<[NodeKey; 8]> = SmallVec::new();
        let mut current = self.nodes.get(start).and_then(SceneNode::parent);
        while let Some(k) = current {
            chain.push(k);
            current = self.nodes.get(k).and_then(SceneNode::parent);
        }
        for &ancestor in chain.iter().rev() {
            if let Some(node) = self.nodes.get(ancestor) {
                for state in &node.state_overrides {
                    category_stacks[state.category().index()].push(state.clone());
                }
            }
        }

        enum Frame {
            Enter(NodeKey),
            Exit(SmallVec<[StateCategory; 2]>),
        }

        let mut stack: Vec<Frame> = vec![Frame::Enter(start)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(k) => {
                    let Some(node) = self.nodes.get_mut(k) else {
                        continue;
                    };

                    let mut pushed: SmallVec<[StateCategory; 2]> = SmallVec::new();
                    for state in &node.state_overrides {
                        category_stacks[state.category().index()].push(state.clone());
                        pushed.push(state.category());
                    }

                    for category in StateCategory::ALL {
                        node.resolved_states[category.index()] =
                            category_stacks[category.index()].last().cloned();
                    }
                    node.dirty.remove(DirtyFlags::RENDER_STATE);

                    let children: SmallVec<[NodeKey; 8]> =
                        node.children().iter().copied().collect();
                    stack.push(Frame::Exit(pushed));
                    for &child in children.iter().rev() {
                        stack.push(Frame::Enter(child));
                    }
                }
                Frame::Exit(pushed) => {
                    for category in pushed {
                        category_stacks[category.index()].pop();
                    }
                }
            }
        }
    }

    // ========================================================================
    // Inherited classification
    // ========================================================================

    /// Resolves the bucket classification through the ancestor chain:
    /// nearest explicit assignment wins, defaulting to `Opaque` when the
    /// whole chain inherits.
    #[must_use]
    pub fn resolved_bucket(&self, key: NodeKey) -> BucketKind {
        let mut current = Some(key);
        while let Some(k) = current {
            let Some(node) = self.nodes.get(k) else {
                break;
            };
            if node.bucket != BucketKind::Inherit {
                return node.bucket;
            }
            current = node.parent;
        }
        BucketKind::Opaque
    }

    /// Resolves the render layer the same way, defaulting to
    /// [`RenderLayer::DEFAULT`].
    #[must_use]
    pub fn resolved_layer(&self, key: NodeKey) -> RenderLayer {
        let mut current = Some(key);
        while let Some(k) = current {
            let Some(node) = self.nodes.get(k) else {
                break;
            };
            if let Some(layer) = node.layer {
                return layer;
            }
            current = node.parent;
        }
        RenderLayer::DEFAULT
    }

    /// Resolves a named environment element against the ancestor chain.
    #[must_use]
    pub fn resolve_environment(
        &self,
        key: NodeKey,
        name: &str,
        mode: ResolutionMode,
    ) -> Option<&EnvironmentElement> {
        let local = self.nodes.get(key)?.environment.get(name);
        match mode {
            ResolutionMode::LocalOnly => local,
            ResolutionMode::LocalPriority => {
                if local.is_some() {
                    return local;
                }
                let mut current = self.nodes.get(key).and_then(SceneNode::parent);
                while let Some(k) = current {
                    let node = self.nodes.get(k)?;
                    if let Some(element) = node.environment.get(name) {
                        return Some(element);
                    }
                    current = node.parent;
                }
                None
            }
            ResolutionMode::AncestorPriority => {
                // Outermost ancestor wins; the local bag is the fallback.
                let mut chain: SmallVec<[NodeKey; 8]> = SmallVec::new();
                let mut current = self.nodes.get(key).and_then(SceneNode::parent);
                while let Some(k) = current {
                    chain.push(k);
                    current = self.nodes.get(k).and_then(SceneNode::parent);
                }
                for &ancestor in chain.iter().rev() {
                    if let Some(element) = self.nodes.get(ancestor)?.environment.get(name) {
                        return Some(element);
                    }
                }
                local
            }
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Visits a subtree in the given order, passing each node to `f`.
    pub fn visit<F>(&self, root: NodeKey, order: TraversalOrder, mut f: F)
    where
        F: FnMut(NodeKey, &SceneNode),
    {
        match order {
            TraversalOrder::PreOrder => {
                let mut stack = vec![root];
                while let Some(k) = stack.pop() {
                    let Some(node) = self.nodes.get(k) else {
                        continue;
                    };
                    f(k, node);
                    for &child in node.children().iter().rev() {
                        stack.push(child);
                    }
                }
            }
            TraversalOrder::PostOrder => {
                let mut stack = vec![(root, false)];
                while let Some((k, expanded)) = stack.pop() {
                    let Some(node) = self.nodes.get(k) else {
                        continue;
                    };
                    if expanded {
                        f(k, node);
                    } else {
                        stack.push((k, true));
                        for &child in node.children().iter().rev() {
                            stack.push((child, false));
                        }
                    }
                }
            }
        }
    }
}
