//! Material resource
//!
//! Opaque to the core: the shader name and any uniform data bindings are
//! interpreted by the render backend at draw time.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub name: String,
    /// Name of the shader program the backend binds for this material.
    pub shader: String,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>, shader: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: shader.into(),
        }
    }
}
