//! Runs an ordered action list as one phase and reports when every action finished.

use std::collections::BTreeSet;
use std::fmt;

use questline_core::ActionType;
use tracing::{debug, trace, warn};

use crate::action::{ActionContext, ActionHandle, MissionAction, PhaseAddress};
use crate::registry::Registry;

/// Result of driving a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseProgress {
    /// Some actions are still running
    Pending,
    /// The last action just finished. Reported exactly once per phase.
    Complete,
    /// The call had no effect on the phase
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutorState {
    Idle,
    Running,
    Complete,
}

/// One phase of a mission or objective.
pub struct ActionExecutor {
    address: PhaseAddress,
    actions: Vec<Box<dyn MissionAction>>,
    pending: BTreeSet<usize>,
    state: ExecutorState,
}

impl ActionExecutor {
    /// Instantiate every action of a phase. Empty and unknown keys are skipped.
    pub fn initialize(address: PhaseAddress, keys: &[ActionType], registry: &Registry) -> Self {
        let actions = keys
            .iter()
            .filter_map(|key| registry.create_action(key))
            .collect();
        Self::from_actions(address, actions)
    }

    /// Build a phase from already instantiated actions.
    pub fn from_actions(address: PhaseAddress, actions: Vec<Box<dyn MissionAction>>) -> Self {
        Self {
            address,
            actions,
            pending: BTreeSet::new(),
            state: ExecutorState::Idle,
        }
    }

    /// Run every action of the phase.
    ///
    /// The pending set is filled before the first action runs, so an action finishing
    /// synchronously never completes the phase early. Actions run from last to first.
    pub fn execute(&mut self) -> PhaseProgress {
        if self.state != ExecutorState::Idle {
            warn!(phase = ?self.address.phase, "Phase executed twice");
            return PhaseProgress::Ignored;
        }

        if self.actions.is_empty() {
            self.state = ExecutorState::Complete;
            return PhaseProgress::Complete;
        }

        self.state = ExecutorState::Running;
        self.pending = (0..self.actions.len()).collect();

        for index in (0..self.actions.len()).rev() {
            let mut ctx = ActionContext::new(self.address.handle(index));
            trace!(index, phase = ?self.address.phase, "Execute action");
            self.actions[index].execute(&mut ctx);

            if ctx.is_finished() && self.finish(index) == PhaseProgress::Complete {
                return PhaseProgress::Complete;
            }
        }

        PhaseProgress::Pending
    }

    /// Report that the action at `index` finished.
    pub fn finish(&mut self, index: usize) -> PhaseProgress {
        if self.state != ExecutorState::Running {
            debug!(index, phase = ?self.address.phase, "Action finished outside a running phase");
            return PhaseProgress::Ignored;
        }

        if !self.pending.remove(&index) {
            protocol_violation!(
                "Action finished twice or was never pending",
                index,
                phase = ?self.address.phase
            );
            return PhaseProgress::Ignored;
        }

        if self.pending.is_empty() {
            self.state = ExecutorState::Complete;
            return PhaseProgress::Complete;
        }

        PhaseProgress::Pending
    }

    /// Tell every pending action its owner was cancelled.
    pub fn notify_cancelled(&mut self) {
        for index in &self.pending {
            self.actions[*index].cancel();
        }
    }

    /// Phase address.
    pub fn address(&self) -> PhaseAddress {
        self.address
    }

    /// Number of instantiated actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the phase has no action.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether the phase started and is waiting on actions.
    pub fn is_running(&self) -> bool {
        self.state == ExecutorState::Running
    }

    /// Whether the phase completed.
    pub fn is_complete(&self) -> bool {
        self.state == ExecutorState::Complete
    }

    /// Handles of the actions still running.
    pub fn pending_handles(&self) -> Vec<ActionHandle> {
        self.pending
            .iter()
            .map(|index| self.address.handle(*index))
            .collect()
    }
}

impl fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("address", &self.address)
            .field("actions", &self.actions.len())
            .field("pending", &self.pending)
            .field("state", &self.state)
            .finish()
    }
}
