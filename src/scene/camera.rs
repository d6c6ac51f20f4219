//! Camera contract
//!
//! The core never mutates a camera. It consumes exactly two things from
//! it: a world position for distance sorting, and a layer mask deciding
//! which parts of the scene the camera draws at all.

use bitflags::bitflags;
use glam::Vec3;

bitflags! {
    /// Render layer tags.
    ///
    /// A node carries at most one layer bit (inheriting from its nearest
    /// ancestor when unset); a camera carries a mask of every layer it is
    /// willing to draw.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RenderLayer: u32 {
        const DEFAULT       = 1 << 0;
        const BACKGROUND    = 1 << 1;
        const GUI           = 1 << 2;
        const DEBUG_OVERLAY = 1 << 3;
    }
}

impl Default for RenderLayer {
    fn default() -> Self {
        RenderLayer::DEFAULT
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub name: String,
    /// World-space position, maintained by the owning framework.
    pub position: Vec3,
    /// Mask of layers this camera draws.
    pub layers: RenderLayer,
}

impl Camera {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            layers: RenderLayer::all(),
        }
    }

    #[must_use]
    pub fn at(name: impl Into<String>, position: Vec3) -> Self {
        let mut cam = Self::new(name);
        cam.position = position;
        cam
    }

    /// Whether this camera draws nodes tagged with `layer`.
    #[inline]
    #[must_use]
    pub fn check_layer(&self, layer: RenderLayer) -> bool {
        self.layers.intersects(layer)
    }
}
