//! Render-state stack machine
//!
//! One stack per state category, each seeded with that category's default
//! settings. Traversal pushes a node's effective states on the way in and
//! restores them on the way out, and the machine turns that into the
//! minimal sequence of GPU applications: a push of the instance already on
//! top is a no-op unless that instance asked for a forced re-apply.
//!
//! Redundant-change elimination is identity-based (instance ids), not
//! value-based: two distinct instances with equal settings still count as
//! a change. Equality on GPU state is cheap to get wrong and identity is
//! what the traversal actually maintains.

use crate::errors::{MercuryError, Result};
use crate::render::state::{
    RenderState, RenderStateRef, StateCategory, StateValue, STATE_CATEGORY_COUNT,
};

/// One observed state application, for backends and tests that want the
/// exact GPU-facing sequence.
#[derive(Clone, Debug)]
pub struct AppliedState {
    pub category: StateCategory,
    pub value: StateValue,
}

pub struct StateMachine {
    stacks: [Vec<RenderStateRef>; STATE_CATEGORY_COUNT],
    /// Everything applied since the last [`Self::take_applied`], in order.
    applied: Vec<AppliedState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// A fresh machine with every stack holding its category default.
    /// The defaults are applied immediately: the GPU baseline is known
    /// from the start, never inherited from whoever ran before.
    #[must_use]
    pub fn new() -> Self {
        let mut machine = Self {
            stacks: Default::default(),
            applied: Vec::new(),
        };
        for category in StateCategory::ALL {
            let default = RenderState::shared(StateValue::default_for(category));
            machine.record(&default);
            machine.stacks[category.index()].push(default);
        }
        machine
    }

    fn record(&mut self, state: &RenderStateRef) {
        self.applied.push(AppliedState {
            category: state.category(),
            value: state.value().clone(),
        });
        state.clear_needs_update();
    }

    /// Pushes a state onto its category stack.
    ///
    /// Applies it (and returns `true`) unless the very same instance is
    /// already on top with no pending forced update, in which case the
    /// push is elided entirely and the caller must not pair it with a
    /// [`Self::restore`].
    pub fn push_and_apply(&mut self, state: RenderStateRef) -> bool {
        let stack = &mut self.stacks[state.category().index()];
        if let Some(top) = stack.last() {
            if top.id() == state.id() && !state.needs_update() {
                return false;
            }
        }
        self.record(&state);
        self.stacks[state.category().index()].push(state);
        true
    }

    /// Re-applies the seeded default for a category through the regular
    /// push path, forcing a known baseline. A no-op when the default is
    /// already on top.
    pub fn apply_default(&mut self, category: StateCategory) {
        let default = self.stacks[category.index()][0].clone();
        self.push_and_apply(default);
    }

    /// Pops the top of a category stack and re-applies the state exposed
    /// beneath it, unless the exposed state is the very same instance as
    /// the popped one with no pending forced update. Popping the seeded
    /// default is an error: restores must pair with successful pushes.
    pub fn restore(&mut self, category: StateCategory) -> Result<()> {
        let stack = &mut self.stacks[category.index()];
        if stack.len() <= 1 {
            return Err(MercuryError::StateStackUnderflow(category));
        }
        let popped = stack.pop().ok_or(MercuryError::StateStackUnderflow(category))?;
        let exposed = stack
            .last()
            .cloned()
            .ok_or(MercuryError::StateStackUnderflow(category))?;
        if exposed.id() != popped.id() || exposed.needs_update() {
            self.record(&exposed);
        }
        Ok(())
    }

    /// The state currently on top of a category stack.
    #[must_use]
    pub fn current(&self, category: StateCategory) -> &RenderStateRef {
        // Every stack keeps its seeded default at the bottom, so the top
        // always exists.
        let stack = &self.stacks[category.index()];
        &stack[stack.len() - 1]
    }

    /// Stack depth for a category, counting the seeded default.
    #[must_use]
    pub fn depth(&self, category: StateCategory) -> usize {
        self.stacks[category.index()].len()
    }

    /// Drains the recorded application sequence.
    pub fn take_applied(&mut self) -> Vec<AppliedState> {
        std::mem::take(&mut self.applied)
    }

    /// Number of applications recorded since the last drain.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}
