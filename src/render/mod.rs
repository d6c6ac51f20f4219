pub mod bucket;
pub mod renderer;
pub mod state;
pub mod state_machine;

pub use bucket::{BucketKind, RenderBucket, SortOrder};
pub use renderer::{RenderBackend, Renderer};
pub use state::{
    BlendFactor, CompareFunc, Face, PolygonMode, RenderState, RenderStateRef, StateCategory,
    StateValue,
};
pub use state_machine::{AppliedState, StateMachine};
