//! Distance-sorted render buckets
//!
//! A bucket collects leaf keys during the fill walk, sorts them by
//! camera distance, and is flushed at the end of every frame whether or
//! not it was drawn. Distances are squared (ordering is all that
//! matters) and live in a side table owned by the bucket, keyed by node:
//! absence simply means "not computed this frame".

use std::cmp::Ordering;

use glam::Vec3;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::errors::{MercuryError, Result};
use crate::render::renderer::RenderBackend;
use crate::render::state::{StateCategory, STATE_CATEGORY_COUNT};
use crate::render::state_machine::StateMachine;
use crate::scene::{Camera, NodeKey, Scene};

/// Bucket classification carried by scene nodes.
///
/// `Inherit` and `None` are sentinels: `Inherit` defers the decision to
/// the ancestor chain and `None` opts a subtree out of rendering. Neither
/// may be registered as an actual bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Inherit,
    None,
    Opaque,
    Transparent,
}

impl BucketKind {
    /// The order buckets are drained in each frame. Opaque geometry first
    /// so the depth buffer is populated before blending.
    pub const DRAIN_ORDER: [BucketKind; 2] = [BucketKind::Opaque, BucketKind::Transparent];

    #[inline]
    #[must_use]
    pub fn is_sentinel(self) -> bool {
        matches!(self, BucketKind::Inherit | BucketKind::None)
    }
}

/// Sorting direction relative to the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Nearest first. The usual choice for opaque geometry (early-z).
    FrontToBack,
    /// Farthest first. Required for correct alpha blending.
    BackToFront,
}

pub struct RenderBucket {
    kind: BucketKind,
    order: SortOrder,
    nodes: Vec<NodeKey>,
    /// Squared camera distances for the current frame. Rebuilt by
    /// [`Self::sort`]; a missing entry means the distance was never
    /// computed (dead key or stale transform) and sorts last.
    distances: SecondaryMap<NodeKey, f32>,
}

impl RenderBucket {
    /// Creates a bucket for a concrete kind; sentinels are rejected.
    pub fn new(kind: BucketKind, order: SortOrder) -> Result<Self> {
        if kind.is_sentinel() {
            return Err(MercuryError::SentinelBucket(kind));
        }
        Ok(Self {
            kind,
            order,
            nodes: Vec::new(),
            distances: SecondaryMap::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Creates a bucket with pre-allocated room for `capacity` entries.
    pub fn with_capacity(kind: BucketKind, order: SortOrder, capacity: usize) -> Result<Self> {
        let mut bucket = Self::new(kind, order)?;
        bucket.nodes.reserve(capacity);
        Ok(bucket)
    }

    pub fn add(&mut self, key: NodeKey) {
        // Any distance cached for this key belongs to a previous cycle.
        self.distances.remove(key);
        self.nodes.push(key);
    }

    /// Appends another bucket's contents.
    pub fn merge(&mut self, other: &RenderBucket) {
        for &key in other.nodes() {
            self.add(key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains(&key)
    }

    /// Keys in current (post-sort: draw) order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Squared camera distance computed by the last [`Self::sort`].
    #[must_use]
    pub fn distance_sq(&self, key: NodeKey) -> Option<f32> {
        self.distances.get(key).copied()
    }

    /// Recomputes distances against the camera and sorts the contents.
    ///
    /// Requires a prior geometric refresh: entries whose world transform
    /// is still stale (or whose key is dead) get no distance and sort to
    /// the end in either direction. Entries at equal distance keep no
    /// particular relative order.
    pub fn sort(&mut self, scene: &Scene, camera: &Camera) {
        if self.nodes.len() < 2 {
            return;
        }
        self.distances.clear();
        for &key in &self.nodes {
            let Some(node) = scene.node(key) else {
                continue;
            };
            let Ok(world) = node.world_transform() else {
                log::warn!(
                    "Bucket {:?}: node '{}' has a stale transform at sort time",
                    self.kind,
                    node.name()
                );
                continue;
            };
            let position = Vec3::from(world.translation);
            self.distances
                .insert(key, camera.position.distance_squared(position));
        }

        let distances = &self.distances;
        let order = self.order;
        self.nodes.sort_unstable_by(|&a, &b| {
            let da = distances.get(a).copied().unwrap_or(f32::MAX);
            let db = distances.get(b).copied().unwrap_or(f32::MAX);
            let cmp = match order {
                SortOrder::FrontToBack => da.partial_cmp(&db),
                SortOrder::BackToFront => db.partial_cmp(&da),
            };
            cmp.unwrap_or(Ordering::Equal)
        });
    }

    /// Draws the contents in current order, bracketing each leaf's draw
    /// call with its baked effective render states.
    ///
    /// Only categories whose push actually applied are restored (an
    /// elided push leaves no stack entry to pop). Cached distances are
    /// dropped afterward so a re-render within the same frame recomputes
    /// them.
    pub fn render(
        &mut self,
        scene: &Scene,
        machine: &mut StateMachine,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        for &key in &self.nodes {
            let Some(node) = scene.node(key) else {
                continue;
            };
            let Some((mesh_key, material_key)) = node.geometry() else {
                return Err(MercuryError::NotRenderable(node.name().to_owned()));
            };
            let world = node.world_transform()?;
            let mesh = scene
                .meshes
                .get(mesh_key)
                .ok_or_else(|| MercuryError::NotRenderable(node.name().to_owned()))?;
            let material = scene
                .materials
                .get(material_key)
                .ok_or_else(|| MercuryError::NotRenderable(node.name().to_owned()))?;

            let mut pushed: SmallVec<[StateCategory; STATE_CATEGORY_COUNT]> = SmallVec::new();
            for category in StateCategory::ALL {
                if let Some(state) = node.resolved_state(category) {
                    if machine.push_and_apply(state.clone()) {
                        pushed.push(category);
                    }
                }
            }
            for applied in machine.take_applied() {
                backend.apply_state(&applied);
            }

            backend.draw_leaf(key, mesh, material, world);

            for &category in pushed.iter().rev() {
                machine.restore(category)?;
            }
            for applied in machine.take_applied() {
                backend.apply_state(&applied);
            }
        }
        self.distances.clear();
        Ok(())
    }

    /// Empties the bucket for the next frame. Runs unconditionally at
    /// frame end, drawn or not, so nothing leaks across frames.
    pub fn flush(&mut self) {
        self.nodes.clear();
        self.distances.clear();
    }
}
