//! Action capability.
//!
//! An action is the leaf side effect of a mission. It is executed once, inside one
//! phase of its owner, and reports completion exactly once: either synchronously by
//! calling [`ActionContext::finish`] from `execute`, or later by handing its
//! [`ActionHandle`] back to the orchestrator.

use questline_core::{MissionId, ObjectiveId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a mission or objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Runs before the owner does its work
    Start,
    /// Runs once the owner ended
    End,
}

/// Owner of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "owner", content = "objective", rename_all = "snake_case")]
pub enum PhaseOwner {
    /// The mission itself
    Mission,
    /// One of the mission's objectives
    Objective(ObjectiveId),
}

/// Address of one phase of one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseAddress {
    /// Mission the phase belongs to
    pub mission: MissionId,
    /// Mission or objective running the phase
    pub owner: PhaseOwner,
    /// Start or end
    pub phase: Phase,
}

impl PhaseAddress {
    /// Address of a mission phase.
    pub fn mission(mission: MissionId, phase: Phase) -> Self {
        Self {
            mission,
            owner: PhaseOwner::Mission,
            phase,
        }
    }

    /// Address of an objective phase.
    pub fn objective(mission: MissionId, objective: ObjectiveId, phase: Phase) -> Self {
        Self {
            mission,
            owner: PhaseOwner::Objective(objective),
            phase,
        }
    }

    /// Handle of the action at `index` in this phase.
    pub fn handle(&self, index: usize) -> ActionHandle {
        ActionHandle {
            address: *self,
            index,
        }
    }
}

/// Identifies one running action, so its completion can be delivered later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionHandle {
    /// Phase running the action
    pub address: PhaseAddress,
    /// Declaration index inside the phase
    pub index: usize,
}

impl ActionHandle {
    /// Mission the action belongs to.
    pub fn mission(&self) -> MissionId {
        self.address.mission
    }
}

impl fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address.owner {
            PhaseOwner::Mission => write!(
                f,
                "{}/{:?}#{}",
                self.address.mission, self.address.phase, self.index
            ),
            PhaseOwner::Objective(objective) => write!(
                f,
                "{}/{}/{:?}#{}",
                self.address.mission, objective, self.address.phase, self.index
            ),
        }
    }
}

/// Passed to [`MissionAction::execute`].
#[derive(Debug)]
pub struct ActionContext {
    handle: ActionHandle,
    finished: bool,
}

impl ActionContext {
    pub(crate) fn new(handle: ActionHandle) -> Self {
        Self {
            handle,
            finished: false,
        }
    }

    /// Handle to keep when completion happens later.
    pub fn handle(&self) -> ActionHandle {
        self.handle
    }

    /// Report completion synchronously.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A leaf side effect run during a phase.
pub trait MissionAction {
    /// Start the side effect. Call `ctx.finish()` to complete synchronously, or keep
    /// `ctx.handle()` and deliver it to the orchestrator when done.
    fn execute(&mut self, ctx: &mut ActionContext);

    /// The owning mission or objective was cancelled while this action was pending.
    ///
    /// Informational only: the phase still waits for the action to finish. Rolling back
    /// whatever the action started is up to the implementation.
    fn cancel(&mut self) {}
}

/// Built-in action that completes as soon as it runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FinishImmediately;

impl MissionAction for FinishImmediately {
    fn execute(&mut self, ctx: &mut ActionContext) {
        ctx.finish();
    }
}
