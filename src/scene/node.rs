//! Scene node
//!
//! A node is either a group (owning an ordered list of children) or a
//! leaf (owning exactly one mesh and one material). The distinction is a
//! closed tagged variant, so traversal and bucket fill switch on
//! [`NodeKind`] instead of runtime type tests.
//!
//! # Dirty marks
//!
//! Every node tracks two marks:
//! - `TRANSFORM`: the cached world matrix is stale. Reading it in this
//!   state is a usage error and fails fast.
//! - `RENDER_STATE`: the baked effective render states are stale.
//!
//! Both marks are set at construction; propagation across the tree is the
//! job of [`crate::scene::Scene`], which owns the hierarchy.

use bitflags::bitflags;
use glam::Affine3A;
use smallvec::SmallVec;

use crate::errors::{MercuryError, Result};
use crate::render::bucket::BucketKind;
use crate::render::state::{RenderStateRef, StateCategory, STATE_CATEGORY_COUNT};
use crate::resources::{MaterialKey, MeshKey};
use crate::scene::camera::RenderLayer;
use crate::scene::environment::EnvironmentBag;
use crate::scene::transform::Transform;
use crate::scene::NodeKey;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        const TRANSFORM    = 1 << 0;
        const RENDER_STATE = 1 << 1;
    }
}

/// Group/leaf tagged variant.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Group { children: Vec<NodeKey> },
    Leaf { mesh: MeshKey, material: MaterialKey },
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    name: String,

    // === Core hierarchy ===
    pub(crate) parent: Option<NodeKey>,
    pub(crate) kind: NodeKind,

    // === Core spatial data ===
    pub(crate) transform: Transform,
    pub(crate) world_matrix: Affine3A,
    pub(crate) dirty: DirtyFlags,

    // === Render classification ===
    /// `Inherit` defers to the nearest ancestor with an explicit kind,
    /// bottoming out at `Opaque`.
    pub(crate) bucket: BucketKind,
    /// `None` defers to the nearest ancestor with an explicit layer,
    /// bottoming out at [`RenderLayer::DEFAULT`].
    pub(crate) layer: Option<RenderLayer>,

    // === Render state ===
    /// Local overrides, at most one per category.
    pub(crate) state_overrides: SmallVec<[RenderStateRef; 2]>,
    /// Effective state per category, baked during the geometric refresh.
    /// `None` means "machine default".
    pub(crate) resolved_states: [Option<RenderStateRef>; STATE_CATEGORY_COUNT],

    // === Environment ===
    pub environment: EnvironmentBag,
}

impl SceneNode {
    fn new(name: &str, kind: NodeKind) -> Result<Self> {
        if name.is_empty() {
            return Err(MercuryError::EmptyName);
        }
        Ok(Self {
            name: name.to_owned(),
            parent: None,
            kind,
            transform: Transform::new(),
            world_matrix: Affine3A::IDENTITY,
            dirty: DirtyFlags::all(),
            bucket: BucketKind::Inherit,
            layer: None,
            state_overrides: SmallVec::new(),
            resolved_states: [const { None }; STATE_CATEGORY_COUNT],
            environment: EnvironmentBag::new(),
        })
    }

    /// Creates a detached group node.
    pub fn group(name: &str) -> Result<Self> {
        Self::new(
            name,
            NodeKind::Group {
                children: Vec::new(),
            },
        )
    }

    /// Creates a detached leaf node owning one mesh and one material.
    pub fn leaf(name: &str, mesh: MeshKey, material: MaterialKey) -> Result<Self> {
        Self::new(name, NodeKind::Leaf { mesh, material })
    }

    // ========================================================================
    // Identity & hierarchy
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the node; empty names are rejected without mutation.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(MercuryError::EmptyName);
        }
        self.name = name.to_owned();
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Child keys; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        match &self.kind {
            NodeKind::Group { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Mesh and material keys for a leaf.
    #[must_use]
    pub fn geometry(&self) -> Option<(MeshKey, MaterialKey)> {
        match self.kind {
            NodeKind::Leaf { mesh, material } => Some((mesh, material)),
            NodeKind::Group { .. } => None,
        }
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Read-only view of the local transform.
    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The cached world matrix.
    ///
    /// Fails when the node itself carries a TRANSFORM dirty mark.
    /// Downward propagation marks every descendant at edit time, so a
    /// clean node never holds a stale matrix. An ancestor dirtied only
    /// by upward propagation (a sibling subtree edit) is not visible
    /// here; [`crate::scene::Scene::world_transform`] performs the
    /// chain-wide check.
    pub fn world_transform(&self) -> Result<&Affine3A> {
        if self.dirty.contains(DirtyFlags::TRANSFORM) {
            return Err(MercuryError::StaleWorldTransform(self.name.clone()));
        }
        Ok(&self.world_matrix)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self, flags: DirtyFlags) -> bool {
        self.dirty.intersects(flags)
    }

    // ========================================================================
    // Render classification
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn bucket(&self) -> BucketKind {
        self.bucket
    }

    /// The locally assigned layer, `None` when inheriting.
    #[inline]
    #[must_use]
    pub fn layer(&self) -> Option<RenderLayer> {
        self.layer
    }

    /// Local override for a category, if any.
    #[must_use]
    pub fn local_state(&self, category: StateCategory) -> Option<&RenderStateRef> {
        self.state_overrides
            .iter()
            .find(|s| s.category() == category)
    }

    /// Effective state for a category as baked by the last geometric
    /// refresh; `None` falls through to the state machine's default.
    #[must_use]
    pub fn resolved_state(&self, category: StateCategory) -> Option<&RenderStateRef> {
        self.resolved_states[category.index()].as_ref()
    }

    /// Installs a local override, replacing any previous override of the
    /// same category. Dirty propagation is handled by the scene.
    pub(crate) fn set_state_override(&mut self, state: RenderStateRef) {
        let category = state.category();
        self.state_overrides.retain(|s| s.category() != category);
        self.state_overrides.push(state);
    }

    pub(crate) fn clear_state_override(&mut self, category: StateCategory) {
        self.state_overrides.retain(|s| s.category() != category);
    }
}
