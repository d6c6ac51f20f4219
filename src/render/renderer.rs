//! Frame orchestration
//!
//! Owns the registered buckets and the state stack machine, and drives
//! the per-frame cycle: geometric refresh, post-order bucket fill, sorted
//! drain in a fixed bucket order, then an unconditional flush of every
//! bucket. Actual GPU work goes through the [`RenderBackend`] trait so
//! the whole pipeline stays testable without a device.

use glam::Affine3A;
use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::render::bucket::{BucketKind, RenderBucket, SortOrder};
use crate::render::state_machine::{AppliedState, StateMachine};
use crate::resources::{Material, Mesh};
use crate::scene::{Camera, NodeKey, Scene, TraversalOrder};

/// The device-facing seam. The renderer feeds it the de-duplicated state
/// application sequence and one draw call per visible leaf.
pub trait RenderBackend {
    fn apply_state(&mut self, state: &AppliedState);
    fn draw_leaf(&mut self, key: NodeKey, mesh: &Mesh, material: &Material, world: &Affine3A);
}

pub struct Renderer {
    state: StateMachine,
    buckets: FxHashMap<BucketKind, RenderBucket>,
}

impl Renderer {
    /// A renderer with the standard buckets registered: opaque geometry
    /// front-to-back, transparent geometry back-to-front.
    #[must_use]
    pub fn new() -> Self {
        let mut renderer = Self::empty();
        // Both kinds are concrete, so registration cannot fail.
        let _ = renderer.register_bucket(BucketKind::Opaque, SortOrder::FrontToBack);
        let _ = renderer.register_bucket(BucketKind::Transparent, SortOrder::BackToFront);
        renderer
    }

    /// A renderer with no buckets registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            state: StateMachine::new(),
            buckets: FxHashMap::default(),
        }
    }

    /// Registers (or replaces) the bucket for a concrete kind.
    pub fn register_bucket(&mut self, kind: BucketKind, order: SortOrder) -> Result<()> {
        let bucket = RenderBucket::new(kind, order)?;
        self.buckets.insert(kind, bucket);
        Ok(())
    }

    #[must_use]
    pub fn bucket(&self, kind: BucketKind) -> Option<&RenderBucket> {
        self.buckets.get(&kind)
    }

    #[must_use]
    pub fn state_machine(&self) -> &StateMachine {
        &self.state
    }

    /// Runs one full frame.
    ///
    /// 1. Refreshes the scene's geometric state.
    /// 2. Fills buckets from a post-order walk of every root, resolving
    ///    each leaf's bucket kind and layer through its ancestor chain.
    ///    Leaves resolving to `None`, failing the camera's layer check,
    ///    or targeting an unregistered bucket (warned) are dropped.
    /// 3. Drains buckets in [`BucketKind::DRAIN_ORDER`]: sort, then draw
    ///    each leaf between a push and a restore of its effective states.
    /// 4. Flushes every bucket, drawn or not.
    pub fn render_scene(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        scene.update_geometric_state();

        // Initial defaults (and anything else pending) reach the device
        // before the first draw.
        for applied in self.state.take_applied() {
            backend.apply_state(&applied);
        }

        self.fill_buckets(scene, camera);

        let result = self.drain_buckets(scene, camera, backend);

        for bucket in self.buckets.values_mut() {
            bucket.flush();
        }
        result
    }

    fn fill_buckets(&mut self, scene: &Scene, camera: &Camera) {
        let buckets = &mut self.buckets;
        for &root in &scene.root_nodes {
            scene.visit(root, TraversalOrder::PostOrder, |key, node| {
                if !node.is_leaf() {
                    return;
                }
                let kind = scene.resolved_bucket(key);
                if kind == BucketKind::None {
                    return;
                }
                if !camera.check_layer(scene.resolved_layer(key)) {
                    return;
                }
                match buckets.get_mut(&kind) {
                    Some(bucket) => bucket.add(key),
                    None => log::warn!(
                        "No bucket registered for {:?}; dropping leaf '{}'",
                        kind,
                        node.name()
                    ),
                }
            });
        }
    }

    fn drain_buckets(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let Self { state, buckets } = self;
        for kind in BucketKind::DRAIN_ORDER {
            if let Some(bucket) = buckets.get_mut(&kind) {
                bucket.sort(scene, camera);
                bucket.render(scene, state, backend)?;
            }
        }
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
