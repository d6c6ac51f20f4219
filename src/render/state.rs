//! GPU render states
//!
//! A closed set of pipeline state categories: face culling, polygon fill
//! mode, depth testing and blending. Each [`RenderState`] instance belongs
//! to exactly one category, carries a process-unique id used for identity
//! comparison on the state stacks, and a needs-update flag forcing a
//! re-apply on the next push even when the identity matches.
//!
//! Instances are shared as [`RenderStateRef`] (`Rc`): the scene graph and
//! the state machine are single-threaded by contract, and the id plus the
//! shared needs-update cell is what makes "same instance pushed twice"
//! observable without any GPU round trip.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_RENDER_STATE_ID: AtomicU32 = AtomicU32::new(1);

pub const STATE_CATEGORY_COUNT: usize = 4;

/// The closed set of GPU state categories.
///
/// Extending this enum (and [`StateValue`]) is the only way to add a new
/// category; there is no open registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateCategory {
    CullFace,
    FillMode,
    DepthTest,
    Blend,
}

impl StateCategory {
    pub const ALL: [StateCategory; STATE_CATEGORY_COUNT] = [
        StateCategory::CullFace,
        StateCategory::FillMode,
        StateCategory::DepthTest,
        StateCategory::Blend,
    ];

    /// Stable index into per-category arrays.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StateCategory::CullFace => 0,
            StateCategory::FillMode => 1,
            StateCategory::DepthTest => 2,
            StateCategory::Blend => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Face {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    Point,
    Line,
    #[default]
    Fill,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// The concrete settings of one render state, tagged by category.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    Cull {
        enabled: bool,
        face: Face,
    },
    Fill {
        mode: PolygonMode,
    },
    Depth {
        test: bool,
        write: bool,
        func: CompareFunc,
    },
    Blend {
        enabled: bool,
        src: BlendFactor,
        dst: BlendFactor,
    },
}

impl StateValue {
    #[must_use]
    pub fn category(&self) -> StateCategory {
        match self {
            StateValue::Cull { .. } => StateCategory::CullFace,
            StateValue::Fill { .. } => StateCategory::FillMode,
            StateValue::Depth { .. } => StateCategory::DepthTest,
            StateValue::Blend { .. } => StateCategory::Blend,
        }
    }

    /// The baseline settings for a category, used to seed the bottom of
    /// each state stack.
    #[must_use]
    pub fn default_for(category: StateCategory) -> StateValue {
        match category {
            StateCategory::CullFace => StateValue::Cull {
                enabled: true,
                face: Face::Back,
            },
            StateCategory::FillMode => StateValue::Fill {
                mode: PolygonMode::Fill,
            },
            StateCategory::DepthTest => StateValue::Depth {
                test: true,
                write: true,
                func: CompareFunc::Less,
            },
            StateCategory::Blend => StateValue::Blend {
                enabled: false,
                src: BlendFactor::One,
                dst: BlendFactor::Zero,
            },
        }
    }
}

/// Shared handle to a render state instance.
pub type RenderStateRef = Rc<RenderState>;

#[derive(Debug)]
pub struct RenderState {
    id: u32,
    needs_update: Cell<bool>,
    value: StateValue,
}

impl RenderState {
    /// A fresh state starts with needs-update set: it has never been
    /// applied to the GPU.
    #[must_use]
    pub fn new(value: StateValue) -> Self {
        Self {
            id: NEXT_RENDER_STATE_ID.fetch_add(1, Ordering::Relaxed),
            needs_update: Cell::new(true),
            value,
        }
    }

    /// Convenience constructor returning the shared handle directly.
    #[must_use]
    pub fn shared(value: StateValue) -> RenderStateRef {
        Rc::new(Self::new(value))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn category(&self) -> StateCategory {
        self.value.category()
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &StateValue {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update.get()
    }

    /// Forces the next push of this instance to re-apply it even when it
    /// is already on top of its stack.
    pub fn mark_needs_update(&self) {
        self.needs_update.set(true);
    }

    pub(crate) fn clear_needs_update(&self) {
        self.needs_update.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = RenderState::new(StateValue::default_for(StateCategory::Blend));
        let b = RenderState::new(StateValue::default_for(StateCategory::Blend));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn value_category_matches() {
        for category in StateCategory::ALL {
            let state = RenderState::new(StateValue::default_for(category));
            assert_eq!(state.category(), category);
        }
    }
}
