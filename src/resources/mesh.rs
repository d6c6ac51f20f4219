//! Mesh resource
//!
//! A [`Mesh`] is opaque to the core: geometry upload and vertex layout are
//! backend concerns. The core only needs a name for diagnostics and the
//! counts the backend reports for its draw call.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    pub name: String,
    /// Number of vertices the backend uploaded for this mesh.
    pub vertex_count: u32,
    /// Number of indices, zero for non-indexed geometry.
    pub index_count: u32,
}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<String>, vertex_count: u32, index_count: u32) -> Self {
        Self {
            name: name.into(),
            vertex_count,
            index_count,
        }
    }
}
