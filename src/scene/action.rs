// Copyright (c) 2024-present Ember Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Actions: the cooperative per-node state machine.
//!
//! A node holds at most one running action plus one staged replacement. The
//! scheduler performs the swap at the tick phase: the old action exits, the
//! new one enters and immediately steps. Actions never loop internally; they
//! return control after every step.

use crate::{scene::node::BehaviorContext, stage::StageId};

/// The capability set of an action. All hooks are optional.
pub trait Action: 'static {
    /// Called once right after the action became the node's current action.
    fn on_enter(&mut self, #[allow(unused_variables)] ctx: &mut BehaviorContext) {}

    /// Called every gameplay tick while the action is current.
    fn on_step(&mut self, #[allow(unused_variables)] ctx: &mut BehaviorContext) {}

    /// Called once when the action is replaced or its node is removed. An
    /// action exits exactly once; it is never re-entered.
    fn on_exit(&mut self, #[allow(unused_variables)] ctx: &mut BehaviorContext) {}

    /// An action may answer the scheduler's stage poll with a stage id to
    /// request a transition.
    fn query_next_stage(&self) -> Option<StageId> {
        None
    }
}

/// The "current action, next action" pair of a node.
#[derive(Default)]
pub(crate) struct ActionSlots {
    pub current: Option<Box<dyn Action>>,
    pub next: Option<Box<dyn Action>>,
    // A staged `None` is a request to clear, so the request itself is a
    // separate bit.
    pub swap_requested: bool,
    // When set, the staged action skips the upcoming tick and is promoted on
    // the following frame.
    pub defer_promotion: bool,
}

impl ActionSlots {
    /// Stages a replacement (or a clear, with `None`). With `update_now` the
    /// swap happens at the next tick phase; without it the staged action
    /// sits out one full frame.
    pub fn stage(&mut self, action: Option<Box<dyn Action>>, update_now: bool) {
        self.next = action;
        self.swap_requested = true;
        self.defer_promotion = !update_now;
    }
}

impl std::fmt::Debug for ActionSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSlots")
            .field("current", &self.current.is_some())
            .field("next", &self.next.is_some())
            .field("swap_requested", &self.swap_requested)
            .field("defer_promotion", &self.defer_promotion)
            .finish()
    }
}
