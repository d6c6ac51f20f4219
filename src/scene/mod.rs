//! Scene graph module
//!
//! Manages the hierarchical scene structure and its per-frame refresh:
//! - `SceneNode`: a node in the tree, either a group or a renderable leaf
//! - `Transform`: TRS component with shadow-state dirty checking
//! - `Scene`: arena-backed container owning the tree and its resources
//! - `Camera`: the read-only contract the core consumes from a camera
//! - `EnvironmentBag`: named environment elements with inheritance modes

pub mod camera;
pub mod environment;
pub mod graph;
pub mod node;
pub mod transform;

pub use camera::{Camera, RenderLayer};
pub use environment::{EnvironmentBag, EnvironmentElement, EnvironmentValue, ResolutionMode};
pub use graph::{Scene, TraversalOrder};
pub use node::{DirtyFlags, NodeKind, SceneNode};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
}
