//! Scene Integration Tests
//!
//! Tests for:
//! - Scene: create/remove nodes, attach/detach hierarchy
//! - Dirty propagation: transform dirt up and down, render-state dirt down
//! - Geometric refresh: stale-read guard, world matrix composition
//! - Classification: bucket/layer inheritance through the ancestor chain
//! - Environment elements and their resolution modes

use glam::Vec3;
use mercury::scene::{
    EnvironmentElement, EnvironmentValue, NodeKey, ResolutionMode, Scene, TraversalOrder,
};
use mercury::{
    BucketKind, DirtyFlags, Material, Mesh, PolygonMode, RenderLayer, RenderState, StateCategory,
    StateValue,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn leaf(scene: &mut Scene, name: &str) -> NodeKey {
    scene
        .create_leaf(name, Mesh::new(name, 3, 3), Material::new(name, "unlit"))
        .unwrap()
}

// ============================================================================
// Node Creation & Removal
// ============================================================================

#[test]
fn scene_create_group() {
    let mut scene = Scene::new();
    let key = scene.create_group("Group").unwrap();
    assert!(scene.node(key).is_some());
    assert!(scene.root_nodes.contains(&key));
}

#[test]
fn scene_empty_name_rejected() {
    let mut scene = Scene::new();
    assert!(scene.create_group("").is_err());
    assert!(scene.create_leaf("", Mesh::new("m", 3, 3), Material::new("m", "s")).is_err());
    // The rejected leaf must not leak resources into the pools.
    assert!(scene.meshes.is_empty());
    assert!(scene.materials.is_empty());
}

#[test]
fn scene_set_name_rejects_empty_without_mutation() {
    let mut scene = Scene::new();
    let key = scene.create_group("Original").unwrap();
    assert!(scene.set_name(key, "").is_err());
    assert_eq!(scene.node(key).unwrap().name(), "Original");

    scene.set_name(key, "Renamed").unwrap();
    assert_eq!(scene.node(key).unwrap().name(), "Renamed");
}

#[test]
fn scene_remove_node_removes_subtree_and_resources() {
    let mut scene = Scene::new();
    let parent = scene.create_group("Parent").unwrap();
    let child = scene.create_group("Child").unwrap();
    let grandchild = leaf(&mut scene, "Grandchild");

    assert!(scene.attach(child, parent));
    assert!(scene.attach(grandchild, child));
    assert_eq!(scene.meshes.len(), 1);

    scene.remove_node(parent);

    assert!(scene.node(parent).is_none());
    assert!(scene.node(child).is_none());
    assert!(scene.node(grandchild).is_none());
    assert!(scene.meshes.is_empty());
    assert!(scene.materials.is_empty());
}

#[test]
fn scene_find_by_name() {
    let mut scene = Scene::new();
    let key = scene.create_group("Target").unwrap();
    scene.create_group("Other").unwrap();

    assert_eq!(scene.find_by_name("Target"), Some(key));
    assert_eq!(scene.find_by_name("Missing"), None);
}

// ============================================================================
// Hierarchy: Attach / Detach
// ============================================================================

#[test]
fn scene_attach_sets_parent_and_child() {
    let mut scene = Scene::new();
    let parent = scene.create_group("Parent").unwrap();
    let child = scene.create_group("Child").unwrap();

    assert!(scene.attach(child, parent));

    assert_eq!(scene.node(child).unwrap().parent(), Some(parent));
    assert!(scene.node(parent).unwrap().children().contains(&child));
    assert!(!scene.root_nodes.contains(&child));
}

#[test]
fn scene_attach_moves_between_parents() {
    let mut scene = Scene::new();
    let first = scene.create_group("First").unwrap();
    let second = scene.create_group("Second").unwrap();
    let child = scene.create_group("Child").unwrap();

    assert!(scene.attach(child, first));
    assert!(scene.attach(child, second));

    assert!(!scene.node(first).unwrap().children().contains(&child));
    assert!(scene.node(second).unwrap().children().contains(&child));
    assert_eq!(scene.node(child).unwrap().parent(), Some(second));
}

#[test]
fn scene_attach_rejects_cycles() {
    init_logs();
    let mut scene = Scene::new();
    let a = scene.create_group("A").unwrap();
    let b = scene.create_group("B").unwrap();
    assert!(scene.attach(b, a));

    // Self-attach and attach-to-descendant both leave the tree untouched.
    assert!(!scene.attach(a, a));
    assert!(!scene.attach(a, b));
    assert_eq!(scene.node(b).unwrap().parent(), Some(a));
    assert_eq!(scene.node(a).unwrap().parent(), None);
}

#[test]
fn scene_attach_rejects_leaf_parent() {
    let mut scene = Scene::new();
    let l = leaf(&mut scene, "Leaf");
    let child = scene.create_group("Child").unwrap();

    assert!(!scene.attach(child, l));
    assert_eq!(scene.node(child).unwrap().parent(), None);
}

#[test]
fn scene_detach_returns_node_to_roots() {
    let mut scene = Scene::new();
    let parent = scene.create_group("Parent").unwrap();
    let child = scene.create_group("Child").unwrap();
    assert!(scene.attach(child, parent));

    assert!(scene.detach(child));
    assert_eq!(scene.node(child).unwrap().parent(), None);
    assert!(scene.root_nodes.contains(&child));

    // Detaching a root is a no-op.
    assert!(!scene.detach(child));
}

// ============================================================================
// Dirty Propagation
// ============================================================================

#[test]
fn new_nodes_start_fully_dirty() {
    let mut scene = Scene::new();
    let key = scene.create_group("Fresh").unwrap();
    assert!(scene.is_dirty(key, DirtyFlags::TRANSFORM));
    assert!(scene.is_dirty(key, DirtyFlags::RENDER_STATE));
}

#[test]
fn transform_dirt_propagates_down_and_up() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let mid = scene.create_group("Mid").unwrap();
    let deep = scene.create_group("Deep").unwrap();
    let sibling = scene.create_group("Sibling").unwrap();
    scene.attach(mid, root);
    scene.attach(deep, mid);
    scene.attach(sibling, root);
    scene.update_geometric_state();
    assert!(!scene.is_dirty(deep, DirtyFlags::TRANSFORM));

    scene.transform_mut(mid).unwrap().position = Vec3::X;

    // Descendants and ancestors are marked.
    assert!(scene.is_dirty(mid, DirtyFlags::TRANSFORM));
    assert!(scene.is_dirty(deep, DirtyFlags::TRANSFORM));
    assert!(scene.is_dirty(root, DirtyFlags::TRANSFORM));
    // Render-state dirt is untouched by a transform edit.
    assert!(!scene.is_dirty(mid, DirtyFlags::RENDER_STATE));
}

#[test]
fn subtree_update_under_a_dirty_parent_is_rejected() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let child = scene.create_group("Child").unwrap();
    scene.attach(child, root);
    scene.update_geometric_state();

    scene.transform_mut(root).unwrap().position = Vec3::new(100.0, 0.0, 0.0);

    // Refreshing only the child would compose against the root's stale
    // world matrix; the call must fail and leave the marks in place.
    assert!(scene.update_subtree(child).is_err());
    assert!(scene.is_dirty(child, DirtyFlags::TRANSFORM));
    assert!(scene.world_transform(child).is_err());

    scene.update_subtree(root).unwrap();
    assert_eq!(
        Vec3::from(scene.world_transform(child).unwrap().translation),
        Vec3::new(100.0, 0.0, 0.0)
    );
}

#[test]
fn ancestor_dirtied_by_a_sibling_edit_blocks_the_read() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let moved = scene.create_group("Moved").unwrap();
    let other = scene.create_group("Other").unwrap();
    scene.attach(moved, root);
    scene.attach(other, root);
    scene.update_geometric_state();

    // Upward propagation dirties the root; the untouched sibling's own
    // cache stays valid, but the chain-wide read is rejected anyway.
    scene.transform_mut(moved).unwrap().position = Vec3::X;
    assert!(!scene.is_dirty(other, DirtyFlags::TRANSFORM));
    assert!(scene.world_transform(other).is_err());

    scene.update_geometric_state();
    assert!(scene.world_transform(other).is_ok());
}

#[test]
fn stale_world_transform_read_fails_fast() {
    let mut scene = Scene::new();
    let key = scene.create_group("Node").unwrap();

    // Never refreshed: the cached matrix must not be handed out.
    assert!(scene.world_transform(key).is_err());

    scene.update_geometric_state();
    assert!(scene.world_transform(key).is_ok());

    scene.transform_mut(key).unwrap().position = Vec3::Y;
    assert!(scene.world_transform(key).is_err());
}

#[test]
fn update_reaches_dirty_descendants_of_clean_parents() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let child = scene.create_group("Child").unwrap();
    scene.attach(child, root);
    scene.update_geometric_state();

    // Render-state dirt never propagates upward: the root stays clean
    // while the child needs resolution, and the walk must still reach it.
    let state = RenderState::shared(StateValue::Fill {
        mode: PolygonMode::Line,
    });
    scene.set_render_state(child, state);
    assert!(!scene.is_dirty(root, DirtyFlags::RENDER_STATE));
    assert!(scene.is_dirty(child, DirtyFlags::RENDER_STATE));

    scene.update_geometric_state();
    assert!(!scene.is_dirty(child, DirtyFlags::RENDER_STATE));
    assert!(scene
        .node(child)
        .unwrap()
        .resolved_state(StateCategory::FillMode)
        .is_some());
}

// ============================================================================
// World Matrix Composition
// ============================================================================

#[test]
fn world_transforms_compose_down_the_chain() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let mid = scene.create_group("Mid").unwrap();
    let deep = scene.create_group("Deep").unwrap();
    scene.attach(mid, root);
    scene.attach(deep, mid);

    scene.transform_mut(root).unwrap().position = Vec3::new(1.0, 0.0, 0.0);
    scene.transform_mut(mid).unwrap().position = Vec3::new(0.0, 2.0, 0.0);
    scene.transform_mut(deep).unwrap().position = Vec3::new(0.0, 0.0, 3.0);

    scene.update_geometric_state();

    let world = scene.world_transform(deep).unwrap();
    let translation = Vec3::from(world.translation);
    assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
}

#[test]
fn reattach_recomposes_against_new_parent() {
    let mut scene = Scene::new();
    let a = scene.create_group("A").unwrap();
    let b = scene.create_group("B").unwrap();
    let child = scene.create_group("Child").unwrap();
    scene.transform_mut(a).unwrap().position = Vec3::new(10.0, 0.0, 0.0);
    scene.transform_mut(b).unwrap().position = Vec3::new(0.0, 10.0, 0.0);
    scene.attach(child, a);
    scene.update_geometric_state();

    assert_eq!(
        Vec3::from(scene.world_transform(child).unwrap().translation),
        Vec3::new(10.0, 0.0, 0.0)
    );

    scene.attach(child, b);
    // The move dirtied the child; reading now must fail.
    assert!(scene.world_transform(child).is_err());

    scene.update_geometric_state();
    assert_eq!(
        Vec3::from(scene.world_transform(child).unwrap().translation),
        Vec3::new(0.0, 10.0, 0.0)
    );
}

// ============================================================================
// Bucket & Layer Inheritance
// ============================================================================

#[test]
fn bucket_resolution_walks_ancestors_and_defaults_to_opaque() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let child = scene.create_group("Child").unwrap();
    let grandchild = leaf(&mut scene, "Leaf");
    scene.attach(child, root);
    scene.attach(grandchild, child);

    // Whole chain inherits.
    assert_eq!(scene.resolved_bucket(grandchild), BucketKind::Opaque);

    // Nearest explicit assignment wins.
    scene.set_bucket(root, BucketKind::Transparent);
    assert_eq!(scene.resolved_bucket(grandchild), BucketKind::Transparent);
    scene.set_bucket(child, BucketKind::None);
    assert_eq!(scene.resolved_bucket(grandchild), BucketKind::None);
    scene.set_bucket(grandchild, BucketKind::Opaque);
    assert_eq!(scene.resolved_bucket(grandchild), BucketKind::Opaque);
}

#[test]
fn layer_resolution_walks_ancestors_and_defaults() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let child = scene.create_group("Child").unwrap();
    scene.attach(child, root);

    assert_eq!(scene.resolved_layer(child), RenderLayer::DEFAULT);

    scene.set_layer(root, Some(RenderLayer::GUI));
    assert_eq!(scene.resolved_layer(child), RenderLayer::GUI);

    scene.set_layer(child, Some(RenderLayer::BACKGROUND));
    assert_eq!(scene.resolved_layer(child), RenderLayer::BACKGROUND);
}

// ============================================================================
// Environment Elements
// ============================================================================

#[test]
fn environment_resolution_modes() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let mid = scene.create_group("Mid").unwrap();
    let node = scene.create_group("Node").unwrap();
    scene.attach(mid, root);
    scene.attach(node, mid);

    let ambient = |v: f32| {
        EnvironmentElement::new("ambient", true, EnvironmentValue::AmbientLight(Vec3::splat(v)))
    };

    // Populate root and local; leave mid empty.
    scene.node_environment_mut(root).unwrap().insert(ambient(0.1));
    scene.node_environment_mut(node).unwrap().insert(ambient(0.9));

    let value = |mode| {
        scene
            .resolve_environment(node, "ambient", mode)
            .map(|e| e.value.clone())
    };

    assert_eq!(
        value(ResolutionMode::LocalOnly),
        Some(EnvironmentValue::AmbientLight(Vec3::splat(0.9)))
    );
    assert_eq!(
        value(ResolutionMode::LocalPriority),
        Some(EnvironmentValue::AmbientLight(Vec3::splat(0.9)))
    );
    // Outermost ancestor wins.
    assert_eq!(
        value(ResolutionMode::AncestorPriority),
        Some(EnvironmentValue::AmbientLight(Vec3::splat(0.1)))
    );

    // LocalOnly finds nothing on a bare node; LocalPriority falls through.
    assert!(scene
        .resolve_environment(mid, "ambient", ResolutionMode::LocalOnly)
        .is_none());
    assert_eq!(
        scene
            .resolve_environment(mid, "ambient", ResolutionMode::LocalPriority)
            .map(|e| e.value.clone()),
        Some(EnvironmentValue::AmbientLight(Vec3::splat(0.1)))
    );
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn visit_orders() {
    let mut scene = Scene::new();
    let root = scene.create_group("Root").unwrap();
    let a = scene.create_group("A").unwrap();
    let b = scene.create_group("B").unwrap();
    let a1 = scene.create_group("A1").unwrap();
    scene.attach(a, root);
    scene.attach(b, root);
    scene.attach(a1, a);

    let mut pre = Vec::new();
    scene.visit(root, TraversalOrder::PreOrder, |_, node| {
        pre.push(node.name().to_owned());
    });
    assert_eq!(pre, ["Root", "A", "A1", "B"]);

    let mut post = Vec::new();
    scene.visit(root, TraversalOrder::PostOrder, |_, node| {
        post.push(node.name().to_owned());
    });
    assert_eq!(post, ["A1", "A", "B", "Root"]);
}
