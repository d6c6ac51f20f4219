#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod render;
pub mod resources;
pub mod scene;

pub use errors::{MercuryError, Result};
pub use render::{
    BlendFactor, BucketKind, CompareFunc, Face, PolygonMode, RenderBackend, RenderBucket,
    RenderState, Renderer, SortOrder, StateCategory, StateMachine, StateValue,
};
pub use resources::{Material, Mesh};
pub use scene::{
    Camera, DirtyFlags, NodeKey, NodeKind, RenderLayer, ResolutionMode, Scene, SceneNode,
    Transform, TraversalOrder,
};
