//! Error Types
//!
//! This module defines the error types used throughout the engine core.
//!
//! # Overview
//!
//! The main error type [`MercuryError`] covers the failure modes of the
//! scene-graph and render-queue core:
//! - Boundary validation errors (rejected before any state changes)
//! - Traversal-time invariant violations (abort the current frame)
//!
//! Configuration gaps (for example submitting a leaf to a bucket kind no
//! bucket is registered for) are deliberately *not* errors: they are
//! reported through `log::warn!` and the frame completes.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, MercuryError>`.

use thiserror::Error;

use crate::render::{BucketKind, StateCategory};
use crate::scene::NodeKey;

/// The main error type for the Mercury engine core.
#[derive(Error, Debug)]
pub enum MercuryError {
    // ========================================================================
    // Boundary Validation
    // ========================================================================
    /// Scene node names are required to be non-empty.
    #[error("Scene node name must not be empty")]
    EmptyName,

    // ========================================================================
    // Scene Graph Invariants
    // ========================================================================
    /// A world transform was read while its node (or an ancestor) still
    /// carries a TRANSFORM dirty mark. The cached matrix is stale and must
    /// never be handed out silently.
    #[error("World transform of node '{0}' has not been refreshed yet")]
    StaleWorldTransform(String),

    /// A node key did not resolve to a live node in the scene arena.
    #[error("Node {0:?} does not exist in this scene")]
    NodeNotFound(NodeKey),

    /// A bucket or draw operation received a node without renderable
    /// geometry (a group where a leaf was required).
    #[error("Node '{0}' has no renderable geometry")]
    NotRenderable(String),

    // ========================================================================
    // Render State Machine Invariants
    // ========================================================================
    /// `restore` was called more often than `push_and_apply` for this
    /// category; the seeded default at the bottom of the stack is never
    /// popped.
    #[error("Render state stack underflow for category {0:?}")]
    StateStackUnderflow(StateCategory),

    // ========================================================================
    // Renderer Configuration
    // ========================================================================
    /// The sentinel bucket kinds ([`BucketKind::Inherit`] and
    /// [`BucketKind::None`]) only classify nodes; registering or draining
    /// a bucket for them is a configuration bug.
    #[error("Bucket kind {0:?} is a sentinel and cannot back a render bucket")]
    SentinelBucket(BucketKind),
}

/// Alias for `Result<T, MercuryError>`.
pub type Result<T> = std::result::Result<T, MercuryError>;
