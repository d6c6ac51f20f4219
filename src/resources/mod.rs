//! Opaque renderable resources
//!
//! The scene-graph core never looks inside a mesh or a material; it only
//! tracks ownership (a leaf node owns exactly one of each) and hands them
//! to the render backend at draw time. Upload, binding and shader wiring
//! live behind the [`crate::render::RenderBackend`] boundary.

pub mod material;
pub mod mesh;

pub use material::Material;
pub use mesh::Mesh;

use slotmap::new_key_type;

new_key_type! {
    pub struct MeshKey;
    pub struct MaterialKey;
}
