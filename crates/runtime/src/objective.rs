//! Objectives: one unit of progress inside a mission.
//!
//! An objective runs its start phase, then hands control to its behavior. Once it is
//! completed or cancelled it runs its end phase and reports `Ended` exactly once.
//! Objectives never call back into their mission; every transition pushes
//! [`ObjectiveSignal`]s into a sink the caller interprets.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use questline_core::{MissionId, ObjectiveDefinition, ObjectiveId};
use tracing::{debug, trace};

use crate::action::{Phase, PhaseAddress};
use crate::executor::{ActionExecutor, PhaseProgress};
use crate::registry::Registry;

/// Lifecycle of an objective. Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveState {
    /// Created, not executed yet
    NotStarted,
    /// Executing
    Running,
    /// Ended normally
    Completed,
    /// Ended by cancellation
    Cancelled,
}

impl ObjectiveState {
    /// Whether the objective ended, either way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ObjectiveState::Completed | ObjectiveState::Cancelled)
    }
}

/// Transition reported by an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSignal {
    /// `execute` was called
    Started,
    /// The end phase finished
    Ended {
        /// Whether the objective was cancelled
        cancelled: bool,
    },
}

/// What a behavior asked for while it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Complete,
    Cancel,
}

/// Passed to [`ObjectiveBehavior::execute`].
#[derive(Debug)]
pub struct ObjectiveContext {
    mission: MissionId,
    objective: ObjectiveId,
    request: Option<Request>,
}

impl ObjectiveContext {
    fn new(mission: MissionId, objective: ObjectiveId) -> Self {
        Self {
            mission,
            objective,
            request: None,
        }
    }

    /// Owning mission.
    pub fn mission(&self) -> MissionId {
        self.mission
    }

    /// Objective identity, to complete it later through the orchestrator.
    pub fn objective(&self) -> ObjectiveId {
        self.objective
    }

    /// Complete the objective as soon as the behavior returns.
    pub fn complete(&mut self) {
        self.request = Some(Request::Complete);
    }

    /// Cancel the objective as soon as the behavior returns.
    pub fn cancel(&mut self) {
        self.request = Some(Request::Cancel);
    }
}

/// User-supplied behavior of an objective.
pub trait ObjectiveBehavior {
    /// Runs once the start phase finished. Either decide through `ctx` right away or
    /// wait for the orchestrator to complete or cancel the objective later.
    fn execute(&mut self, ctx: &mut ObjectiveContext);

    /// The objective was completed or cancelled. Runs before the end phase.
    fn on_ended(&mut self, _cancelled: bool) {}
}

/// Built-in behavior waiting for an explicit completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualBehavior;

impl ObjectiveBehavior for ManualBehavior {
    fn execute(&mut self, _ctx: &mut ObjectiveContext) {}
}

/// Built-in behavior completing as soon as it runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoCompleteBehavior;

impl ObjectiveBehavior for AutoCompleteBehavior {
    fn execute(&mut self, ctx: &mut ObjectiveContext) {
        ctx.complete();
    }
}

/// Runtime instance of an [`ObjectiveDefinition`].
pub struct Objective {
    definition: Arc<ObjectiveDefinition>,
    mission: MissionId,
    behavior: Box<dyn ObjectiveBehavior>,
    start_actions: ActionExecutor,
    end_actions: ActionExecutor,
    state: ObjectiveState,
    ended: bool,
}

impl Objective {
    /// Instantiate an objective of `mission`. Fails when the behavior key is unknown.
    pub fn new(
        definition: Arc<ObjectiveDefinition>,
        mission: MissionId,
        registry: &Registry,
    ) -> Option<Self> {
        let behavior = registry.create_behavior(definition.behavior.as_ref())?;
        Some(Self::with_behavior(definition, mission, behavior, registry))
    }

    /// Instantiate an objective around an explicit behavior.
    pub fn with_behavior(
        definition: Arc<ObjectiveDefinition>,
        mission: MissionId,
        behavior: Box<dyn ObjectiveBehavior>,
        registry: &Registry,
    ) -> Self {
        let id = definition.id;
        let start_actions = ActionExecutor::initialize(
            PhaseAddress::objective(mission, id, Phase::Start),
            &definition.start_actions,
            registry,
        );
        let end_actions = ActionExecutor::initialize(
            PhaseAddress::objective(mission, id, Phase::End),
            &definition.end_actions,
            registry,
        );

        Self {
            definition,
            mission,
            behavior,
            start_actions,
            end_actions,
            state: ObjectiveState::NotStarted,
            ended: false,
        }
    }

    /// Run the start phase, then the behavior.
    pub fn execute(&mut self, signals: &mut Vec<ObjectiveSignal>) {
        if self.state != ObjectiveState::NotStarted {
            debug!(objective_id = %self.id(), state = ?self.state, "Objective already executed");
            return;
        }

        trace!(objective_id = %self.id(), "Execute objective");
        self.state = ObjectiveState::Running;
        signals.push(ObjectiveSignal::Started);

        if self.start_actions.execute() == PhaseProgress::Complete {
            self.run_behavior(signals);
        }
    }

    /// Complete the objective. Returns false when it already ended.
    pub fn complete(&mut self, signals: &mut Vec<ObjectiveSignal>) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        debug!(objective_id = %self.id(), "Objective completed");
        self.state = ObjectiveState::Completed;
        self.behavior.on_ended(false);
        self.run_end_phase(signals);
        true
    }

    /// Cancel the objective. Returns false when it already ended.
    ///
    /// The end phase only runs when the definition asks for it.
    pub fn cancel(&mut self, signals: &mut Vec<ObjectiveSignal>) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        debug!(objective_id = %self.id(), "Objective cancelled");
        self.state = ObjectiveState::Cancelled;
        self.start_actions.notify_cancelled();
        self.behavior.on_ended(true);

        if self.definition.run_end_actions_on_cancel {
            self.run_end_phase(signals);
        } else {
            self.emit_ended(signals);
        }
        true
    }

    /// Report the end without waiting for a pending end phase. Its actions are told
    /// about the cancellation and later completions change nothing.
    ///
    /// Used when the owning mission is cancelled. Returns false when nothing was pending.
    pub fn abandon(&mut self, signals: &mut Vec<ObjectiveSignal>) -> bool {
        if self.ended || !self.state.is_terminal() {
            return false;
        }

        debug!(objective_id = %self.id(), "Objective end phase abandoned");
        self.end_actions.notify_cancelled();
        self.emit_ended(signals);
        true
    }

    /// Deliver a late action completion. Returns false when the action was not pending.
    pub fn finish_action(
        &mut self,
        phase: Phase,
        index: usize,
        signals: &mut Vec<ObjectiveSignal>,
    ) -> bool {
        match phase {
            Phase::Start => match self.start_actions.finish(index) {
                PhaseProgress::Ignored => false,
                PhaseProgress::Pending => true,
                PhaseProgress::Complete => {
                    self.run_behavior(signals);
                    true
                }
            },
            Phase::End => match self.end_actions.finish(index) {
                PhaseProgress::Ignored => false,
                PhaseProgress::Pending => true,
                PhaseProgress::Complete => {
                    self.emit_ended(signals);
                    true
                }
            },
        }
    }

    fn run_behavior(&mut self, signals: &mut Vec<ObjectiveSignal>) {
        // Completed or cancelled while the start phase was pending.
        if self.state != ObjectiveState::Running {
            return;
        }

        let mut ctx = ObjectiveContext::new(self.mission, self.id());
        self.behavior.execute(&mut ctx);

        match ctx.request {
            Some(Request::Complete) => {
                self.complete(signals);
            }
            Some(Request::Cancel) => {
                self.cancel(signals);
            }
            None => {}
        }
    }

    fn run_end_phase(&mut self, signals: &mut Vec<ObjectiveSignal>) {
        if self.end_actions.execute() == PhaseProgress::Complete {
            self.emit_ended(signals);
        }
    }

    fn emit_ended(&mut self, signals: &mut Vec<ObjectiveSignal>) {
        if self.ended {
            return;
        }
        self.ended = true;
        signals.push(ObjectiveSignal::Ended {
            cancelled: self.state == ObjectiveState::Cancelled,
        });
    }

    /// Objective identity.
    pub fn id(&self) -> ObjectiveId {
        self.definition.id
    }

    /// Owning mission.
    pub fn mission(&self) -> MissionId {
        self.mission
    }

    /// Read-only definition.
    pub fn definition(&self) -> &Arc<ObjectiveDefinition> {
        &self.definition
    }

    /// Declared tags, for skip predicates.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.definition.tags
    }

    /// Current state.
    pub fn state(&self) -> ObjectiveState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ObjectiveState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == ObjectiveState::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == ObjectiveState::Cancelled
    }

    /// Whether `Ended` was reported.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Start phase.
    pub fn start_actions(&self) -> &ActionExecutor {
        &self.start_actions
    }

    /// End phase.
    pub fn end_actions(&self) -> &ActionExecutor {
        &self.end_actions
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective")
            .field("id", &self.id())
            .field("mission", &self.mission)
            .field("state", &self.state)
            .field("ended", &self.ended)
            .finish()
    }
}
