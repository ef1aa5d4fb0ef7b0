//! Missions: a sequence of objectives bracketed by a start and an end phase.
//!
//! A mission owns its objectives and both phases. It reports what happened through
//! [`MissionSignal`]s pushed into the [`MissionContext`] of the call, and never holds a
//! reference to whoever drives it. The orchestrator is the usual driver; tests drive
//! missions directly.
//!
//! Objectives are instantiated lazily, one at a time, in declaration order. Dispatch is
//! a loop rather than a recursion, so a long run of skipped or synchronously completing
//! objectives does not grow the stack.

use std::fmt;
use std::sync::Arc;

use questline_core::{MissionDefinition, MissionId, ObjectiveDefinition, ObjectiveId};
use tracing::{debug, info, trace, warn};

use crate::action::{ActionHandle, Phase, PhaseAddress, PhaseOwner};
use crate::executor::{ActionExecutor, PhaseProgress};
use crate::filter::ObjectiveFilter;
use crate::objective::{Objective, ObjectiveSignal};
use crate::registry::Registry;

/// Lifecycle of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissionState {
    /// Created, `start` not called yet
    NotStarted,
    /// Start phase running
    Starting,
    /// Dispatching objectives
    Running,
    /// End phase running
    Ending,
    /// Ended was reported
    Ended {
        /// Whether the mission was cancelled
        cancelled: bool,
    },
}

/// Transition reported by a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionSignal {
    /// An objective is about to execute
    ObjectiveStarted(ObjectiveId),
    /// An objective reported its end
    ObjectiveEnded {
        /// Objective identity
        objective: ObjectiveId,
        /// Whether it was cancelled
        cancelled: bool,
    },
    /// The mission ended. Reported exactly once.
    Ended {
        /// Whether the mission was cancelled
        cancelled: bool,
    },
}

/// Collaborators and signal sink for one call into a [`Mission`].
pub struct MissionContext<'a> {
    registry: &'a Registry,
    filter: &'a dyn ObjectiveFilter,
    signals: Vec<MissionSignal>,
}

impl<'a> MissionContext<'a> {
    pub fn new(registry: &'a Registry, filter: &'a dyn ObjectiveFilter) -> Self {
        Self {
            registry,
            filter,
            signals: Vec::new(),
        }
    }

    /// Signals reported so far.
    pub fn signals(&self) -> &[MissionSignal] {
        &self.signals
    }

    /// Drain the signals reported so far.
    pub fn take_signals(&mut self) -> Vec<MissionSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn into_signals(self) -> Vec<MissionSignal> {
        self.signals
    }

    fn emit(&mut self, signal: MissionSignal) {
        self.signals.push(signal);
    }
}

struct ObjectiveEntry {
    objective: Objective,
    /// Cleared once the objective's end was handled, so a late duplicate is ignored.
    listening: bool,
}

/// Runtime instance of a [`MissionDefinition`].
pub struct Mission {
    definition: Arc<MissionDefinition>,
    /// Objectives not dispatched yet. The next one is at the end.
    pending: Vec<Arc<ObjectiveDefinition>>,
    objectives: Vec<ObjectiveEntry>,
    active: Option<usize>,
    start_actions: ActionExecutor,
    end_actions: ActionExecutor,
    state: MissionState,
    started: bool,
    cancelled: bool,
    skipping: bool,
}

impl Mission {
    /// Instantiate a mission and both of its phases. Objectives are instantiated on dispatch.
    pub fn new(definition: Arc<MissionDefinition>, registry: &Registry) -> Self {
        let id = definition.id;
        let mut pending: Vec<_> = definition.enabled_objectives().cloned().collect();
        pending.reverse();

        let start_actions = ActionExecutor::initialize(
            PhaseAddress::mission(id, Phase::Start),
            &definition.start_actions,
            registry,
        );
        let end_actions = ActionExecutor::initialize(
            PhaseAddress::mission(id, Phase::End),
            &definition.end_actions,
            registry,
        );

        Self {
            definition,
            pending,
            objectives: Vec::new(),
            active: None,
            start_actions,
            end_actions,
            state: MissionState::NotStarted,
            started: false,
            cancelled: false,
            skipping: false,
        }
    }

    /// Run the start phase. Objectives are dispatched once it finishes.
    pub fn start(&mut self, ctx: &mut MissionContext<'_>) {
        if self.state != MissionState::NotStarted {
            debug!(mission_id = %self.id(), state = ?self.state, "Mission already started");
            return;
        }

        trace!(mission_id = %self.id(), "Run mission start phase");
        self.state = MissionState::Starting;

        if self.start_actions.execute() == PhaseProgress::Complete {
            self.try_start(ctx);
        }
    }

    /// Skip the mission: complete the active objective and every objective dispatched
    /// after it.
    ///
    /// Returns false when nothing was completed: the mission is ending, or it is stalled
    /// on an objective that already ended.
    pub fn complete(&mut self, ctx: &mut MissionContext<'_>) -> bool {
        if self.cancelled || matches!(self.state, MissionState::Ending | MissionState::Ended { .. }) {
            return false;
        }

        info!(mission = %self.definition.display_name(), "Completing mission");
        self.skipping = true;

        match self.active {
            Some(slot) => self.complete_slot(slot, ctx),
            // Applies once the start phase finished.
            None => matches!(self.state, MissionState::NotStarted | MissionState::Starting),
        }
    }

    /// Cancel the mission and its active objective.
    ///
    /// An active objective whose end phase is still pending is reported as ended right
    /// away. A mission already running its end phase keeps waiting for it and then ends
    /// as cancelled. Returns whether the cancellation was applied.
    pub fn cancel(&mut self, ctx: &mut MissionContext<'_>) -> bool {
        if self.cancelled || matches!(self.state, MissionState::Ended { .. }) {
            debug!(mission_id = %self.id(), state = ?self.state, "Cancel ignored");
            return false;
        }

        info!(mission = %self.definition.display_name(), "Cancelling mission");
        self.cancelled = true;

        if self.state == MissionState::Ending {
            self.end_actions.notify_cancelled();
            return true;
        }

        self.start_actions.notify_cancelled();

        if let Some(slot) = self.active {
            let mut signals = Vec::new();
            self.objectives[slot].objective.cancel(&mut signals);
            self.apply_objective_signals(slot, signals, ctx);
        }

        if let Some(slot) = self.active {
            let mut signals = Vec::new();
            self.objectives[slot].objective.abandon(&mut signals);
            self.apply_objective_signals(slot, signals, ctx);
        }

        self.state = MissionState::Ending;
        if self.definition.run_end_actions_on_cancel {
            if self.end_actions.execute() == PhaseProgress::Complete {
                self.finish(ctx);
            }
        } else {
            self.finish(ctx);
        }
        true
    }

    /// Complete the active objective if it is `objective`.
    pub fn complete_objective(&mut self, objective: ObjectiveId, ctx: &mut MissionContext<'_>) -> bool {
        match self.active_slot_of(objective) {
            Some(slot) => self.complete_slot(slot, ctx),
            None => false,
        }
    }

    /// Cancel the active objective if it is `objective`. The mission stops dispatching.
    pub fn cancel_objective(&mut self, objective: ObjectiveId, ctx: &mut MissionContext<'_>) -> bool {
        let Some(slot) = self.active_slot_of(objective) else {
            return false;
        };

        let mut signals = Vec::new();
        if !self.objectives[slot].objective.cancel(&mut signals) {
            return false;
        }
        self.apply_objective_signals(slot, signals, ctx);
        true
    }

    /// Deliver a late action completion. Returns false when the action was not pending.
    pub fn finish_action(&mut self, handle: ActionHandle, ctx: &mut MissionContext<'_>) -> bool {
        let address = handle.address;
        if address.mission != self.id() {
            return false;
        }

        match (address.owner, address.phase) {
            (PhaseOwner::Mission, Phase::Start) => match self.start_actions.finish(handle.index) {
                PhaseProgress::Ignored => false,
                PhaseProgress::Pending => true,
                PhaseProgress::Complete => {
                    self.try_start(ctx);
                    true
                }
            },
            (PhaseOwner::Mission, Phase::End) => match self.end_actions.finish(handle.index) {
                PhaseProgress::Ignored => false,
                PhaseProgress::Pending => true,
                PhaseProgress::Complete => {
                    self.finish(ctx);
                    true
                }
            },
            (PhaseOwner::Objective(objective), phase) => {
                // Latest instance wins if a definition appears twice.
                let Some(slot) = self
                    .objectives
                    .iter()
                    .rposition(|entry| entry.objective.id() == objective)
                else {
                    return false;
                };

                let mut signals = Vec::new();
                let accepted =
                    self.objectives[slot]
                        .objective
                        .finish_action(phase, handle.index, &mut signals);

                if self.apply_objective_signals(slot, signals, ctx) {
                    self.execute_next_objective(ctx);
                }
                accepted
            }
        }
    }

    fn try_start(&mut self, ctx: &mut MissionContext<'_>) {
        if self.started || self.cancelled {
            return;
        }

        self.started = true;
        self.state = MissionState::Running;
        self.execute_next_objective(ctx);
    }

    fn complete_slot(&mut self, slot: usize, ctx: &mut MissionContext<'_>) -> bool {
        let mut signals = Vec::new();
        if !self.objectives[slot].objective.complete(&mut signals) {
            return false;
        }

        if self.apply_objective_signals(slot, signals, ctx) {
            self.execute_next_objective(ctx);
        }
        true
    }

    fn execute_next_objective(&mut self, ctx: &mut MissionContext<'_>) {
        loop {
            if self.cancelled {
                return;
            }

            let Some(definition) = self.pending.pop() else {
                self.try_end(ctx);
                return;
            };

            if ctx.filter.should_skip(&definition) {
                debug!(objective_id = %definition.id, name = %definition.name, "Skipping objective");
                continue;
            }

            let Some(objective) = Objective::new(Arc::clone(&definition), self.id(), ctx.registry)
            else {
                warn!(objective_id = %definition.id, "Objective could not be instantiated");
                continue;
            };

            let slot = self.objectives.len();
            self.objectives.push(ObjectiveEntry {
                objective,
                listening: true,
            });
            self.active = Some(slot);

            debug!(mission_id = %self.id(), objective_id = %definition.id, "Execute objective");
            ctx.emit(MissionSignal::ObjectiveStarted(definition.id));

            let mut signals = Vec::new();
            let objective = &mut self.objectives[slot].objective;
            objective.execute(&mut signals);
            if self.skipping {
                objective.complete(&mut signals);
            }

            if !self.apply_objective_signals(slot, signals, ctx) {
                return;
            }
        }
    }

    /// Returns true when the mission should dispatch its next objective.
    fn apply_objective_signals(
        &mut self,
        slot: usize,
        signals: Vec<ObjectiveSignal>,
        ctx: &mut MissionContext<'_>,
    ) -> bool {
        let mut advance = false;

        for signal in signals {
            // Started was announced before the objective executed.
            let ObjectiveSignal::Ended { cancelled } = signal else {
                continue;
            };

            let entry = &mut self.objectives[slot];
            if !entry.listening {
                continue;
            }
            entry.listening = false;
            let objective = entry.objective.id();

            if self.active == Some(slot) {
                self.active = None;
            }

            if !self.started {
                continue;
            }

            ctx.emit(MissionSignal::ObjectiveEnded {
                objective,
                cancelled,
            });

            if !self.cancelled && !cancelled {
                advance = true;
            }
        }

        advance
    }

    fn try_end(&mut self, ctx: &mut MissionContext<'_>) {
        if self.state != MissionState::Running || !self.is_complete() {
            return;
        }

        trace!(mission_id = %self.id(), "Run mission end phase");
        self.state = MissionState::Ending;

        if self.end_actions.execute() == PhaseProgress::Complete {
            self.finish(ctx);
        }
    }

    fn finish(&mut self, ctx: &mut MissionContext<'_>) {
        if matches!(self.state, MissionState::Ended { .. }) {
            return;
        }

        self.state = MissionState::Ended {
            cancelled: self.cancelled,
        };
        ctx.emit(MissionSignal::Ended {
            cancelled: self.cancelled,
        });
    }

    fn active_slot_of(&self, objective: ObjectiveId) -> Option<usize> {
        self.active
            .filter(|slot| self.objectives[*slot].objective.id() == objective)
    }

    /// Mission identity.
    pub fn id(&self) -> MissionId {
        self.definition.id
    }

    /// Read-only definition.
    pub fn definition(&self) -> &Arc<MissionDefinition> {
        &self.definition
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    /// Whether the start phase finished and objectives are being dispatched.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, MissionState::Ended { .. })
    }

    /// Whether every objective was dispatched and every dispatched one completed
    /// normally. Skipped objectives count as done.
    pub fn is_complete(&self) -> bool {
        self.started
            && self.pending.is_empty()
            && self
                .objectives
                .iter()
                .all(|entry| entry.objective.is_completed() && entry.objective.has_ended())
    }

    /// Objectives instantiated so far, in dispatch order.
    pub fn objectives(&self) -> impl Iterator<Item = &Objective> {
        self.objectives.iter().map(|entry| &entry.objective)
    }

    /// The objective currently running, if any.
    pub fn active_objective(&self) -> Option<&Objective> {
        self.active.map(|slot| &self.objectives[slot].objective)
    }

    /// Number of objectives not dispatched yet.
    pub fn pending_objective_count(&self) -> usize {
        self.pending.len()
    }

    pub fn start_actions(&self) -> &ActionExecutor {
        &self.start_actions
    }

    pub fn end_actions(&self) -> &ActionExecutor {
        &self.end_actions
    }

    /// Every action of this mission still waiting to finish.
    pub fn pending_action_handles(&self) -> Vec<ActionHandle> {
        let mut handles = self.start_actions.pending_handles();
        for entry in &self.objectives {
            handles.extend(entry.objective.start_actions().pending_handles());
            handles.extend(entry.objective.end_actions().pending_handles());
        }
        handles.extend(self.end_actions.pending_handles());
        handles
    }
}

impl fmt::Debug for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mission")
            .field("id", &self.id())
            .field("state", &self.state)
            .field("cancelled", &self.cancelled)
            .field("objectives", &self.objectives.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
