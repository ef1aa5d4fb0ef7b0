//! Mission orchestration.
//!
//! The [`Orchestrator`] owns the catalog, the history ledger and every active mission.
//! It is the only component that talks to the ledger: it reserves identities before a
//! mission is created, records objective and mission transitions as the missions report
//! them, and chains to next missions when one ends.
//!
//! Missions starting each other (chaining, disabled forwarding) go through a queue drained
//! before the public call returns, so chains of any length run without nesting calls.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use questline_core::{
    MissionCatalog, MissionDefinition, MissionHistory, MissionId, ObjectiveDefinition,
    ObjectiveId, OrchestratorConfig, RuntimeEvent, RuntimeEventKind,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::ActionHandle;
use crate::filter::{IgnoredTags, ObjectiveFilter};
use crate::mission::{Mission, MissionContext, MissionSignal};
use crate::observer::ObserverRegistry;
use crate::registry::Registry;

/// Why a mission was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("mission identity is invalid")]
    InvalidIdentity,

    #[error("mission is not in the catalog")]
    UnknownMission,

    #[error("mission is already active")]
    AlreadyActive,

    #[error("mission already completed")]
    AlreadyComplete,

    #[error("mission is already recorded in the history")]
    AlreadyRecorded,

    #[error("disabled mission was already forwarded during this call")]
    AlreadyForwarded,
}

/// Result of [`Orchestrator::start_mission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A mission instance was created and started. It may already have ended.
    Started,
    /// The mission is disabled; its next missions were started instead.
    Forwarded,
    /// Nothing was started.
    Rejected(StartRejection),
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

/// Result of [`Orchestrator::boot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Missions left active in the history were resumed
    Resumed(usize),
    /// The configured first mission was started
    FirstMission(StartOutcome),
    /// Nothing to resume and no first mission configured
    Idle,
}

/// Skip predicate used while dispatching one mission.
struct DispatchFilter<'a> {
    ignored: &'a IgnoredTags,
    custom: Option<&'a dyn ObjectiveFilter>,
    /// Set for resumed missions only.
    history: Option<&'a MissionHistory>,
}

impl ObjectiveFilter for DispatchFilter<'_> {
    fn should_skip(&self, objective: &ObjectiveDefinition) -> bool {
        if let Some(history) = self.history {
            if history.is_objective_terminal(&objective.id) {
                debug!(objective_id = %objective.id, "Objective already ended before resume");
                return true;
            }
        }

        self.ignored.should_skip(objective)
            || self.custom.map_or(false, |custom| custom.should_skip(objective))
    }
}

type Listener = Box<dyn FnMut(&RuntimeEvent)>;

/// Top-level registry of active missions.
pub struct Orchestrator {
    catalog: MissionCatalog,
    registry: Registry,
    history: MissionHistory,
    config: OrchestratorConfig,
    ignored_tags: IgnoredTags,
    filter: Option<Box<dyn ObjectiveFilter>>,
    /// Active missions in start order
    missions: Vec<Mission>,
    resumed: HashSet<MissionId>,
    chained: VecDeque<MissionId>,
    mission_started: ObserverRegistry<MissionId, ()>,
    mission_ended: ObserverRegistry<MissionId, bool>,
    objective_started: ObserverRegistry<ObjectiveId, ()>,
    objective_ended: ObserverRegistry<ObjectiveId, bool>,
    listeners: Vec<Listener>,
}

impl Orchestrator {
    /// Create an orchestrator. Catalog issues are logged, never fatal.
    pub fn new(
        catalog: MissionCatalog,
        registry: Registry,
        history: MissionHistory,
        config: OrchestratorConfig,
    ) -> Self {
        catalog.validate();

        let mut ignored_tags = IgnoredTags::new();
        ignored_tags.extend(config.ignored_objective_tags.iter().cloned());

        info!(
            missions = catalog.len(),
            recorded = history.len(),
            "Mission orchestrator created"
        );

        Self {
            catalog,
            registry,
            history,
            config,
            ignored_tags,
            filter: None,
            missions: Vec::new(),
            resumed: HashSet::new(),
            chained: VecDeque::new(),
            mission_started: ObserverRegistry::new(),
            mission_ended: ObserverRegistry::new(),
            objective_started: ObserverRegistry::new(),
            objective_ended: ObserverRegistry::new(),
            listeners: Vec::new(),
        }
    }

    /// An orchestrator with an empty history and default configuration.
    pub fn in_memory(catalog: MissionCatalog, registry: Registry) -> Self {
        Self::new(
            catalog,
            registry,
            MissionHistory::new(),
            OrchestratorConfig::default(),
        )
    }

    /// Resume what the history recorded, or start the configured first mission.
    pub fn boot(&mut self) -> BootOutcome {
        if self.config.resume_from_history && self.history.has_data() {
            return BootOutcome::Resumed(self.resume_from_history());
        }

        match self.config.first_mission {
            Some(first) => BootOutcome::FirstMission(self.start_mission(first)),
            None => {
                debug!("Nothing to boot");
                BootOutcome::Idle
            }
        }
    }

    /// Start a mission from the catalog.
    pub fn start_mission(&mut self, id: MissionId) -> StartOutcome {
        let mut forwarded = HashSet::new();
        let outcome = self.try_start_mission(id, &mut forwarded);
        self.drain_chained(&mut forwarded);
        outcome
    }

    /// Restart every mission the history lists as active. Objectives already ended are
    /// skipped. Returns the number of missions resumed.
    pub fn resume_from_history(&mut self) -> usize {
        let active = self.history.active_missions();
        let mut resumed = 0;

        for id in active {
            if self.is_running(id) || !self.history.is_active(&id) {
                continue;
            }

            let Some(definition) = self.catalog.get(&id).cloned() else {
                warn!(mission_id = %id, "Active mission is missing from the catalog");
                continue;
            };

            self.launch(definition, true);
            resumed += 1;
        }

        info!(resumed, "Missions resumed from history");
        self.drain_chained(&mut HashSet::new());
        resumed
    }

    /// Cancel an active mission.
    pub fn cancel_mission(&mut self, id: MissionId) -> bool {
        let cancelled = self
            .drive(id, |mission, ctx| mission.cancel(ctx))
            .unwrap_or(false);
        self.drain_chained(&mut HashSet::new());
        cancelled
    }

    /// Skip an active mission by completing its objectives.
    pub fn complete_mission(&mut self, id: MissionId) -> bool {
        let completed = self
            .drive(id, |mission, ctx| mission.complete(ctx))
            .unwrap_or(false);
        self.drain_chained(&mut HashSet::new());
        completed
    }

    /// Cancel every mission active at the time of the call.
    pub fn cancel_current_missions(&mut self) {
        for id in self.active_mission_ids() {
            self.drive(id, |mission, ctx| mission.cancel(ctx));
        }
        self.drain_chained(&mut HashSet::new());
    }

    /// Complete every mission active at the time of the call.
    pub fn complete_current_missions(&mut self) {
        for id in self.active_mission_ids() {
            self.drive(id, |mission, ctx| mission.complete(ctx));
        }
        self.drain_chained(&mut HashSet::new());
    }

    /// Complete the running objective of an active mission.
    pub fn complete_objective(&mut self, mission: MissionId, objective: ObjectiveId) -> bool {
        let completed = self
            .drive(mission, |mission, ctx| mission.complete_objective(objective, ctx))
            .unwrap_or(false);
        self.drain_chained(&mut HashSet::new());
        completed
    }

    /// Cancel the running objective of an active mission.
    pub fn cancel_objective(&mut self, mission: MissionId, objective: ObjectiveId) -> bool {
        let cancelled = self
            .drive(mission, |mission, ctx| mission.cancel_objective(objective, ctx))
            .unwrap_or(false);
        self.drain_chained(&mut HashSet::new());
        cancelled
    }

    /// Deliver the completion of an action that did not finish synchronously.
    pub fn finish_action(&mut self, handle: ActionHandle) -> bool {
        let Some(accepted) = self.drive(handle.mission(), |mission, ctx| {
            mission.finish_action(handle, ctx)
        }) else {
            debug!(action = %handle, "Action finished after its mission ended");
            return false;
        };

        self.drain_chained(&mut HashSet::new());
        accepted
    }

    /// Skip objectives whose tags contain any of `tags`. Running objectives that now
    /// match are completed.
    pub fn ignore_objectives_with_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_tags.extend(tags);

        let matching: Vec<(MissionId, ObjectiveId)> = self
            .missions
            .iter()
            .filter_map(|mission| {
                let objective = mission.active_objective()?;
                let matches = !objective.state().is_terminal()
                    && self.ignored_tags.should_skip(objective.definition());
                matches.then(|| (mission.id(), objective.id()))
            })
            .collect();

        for (mission, objective) in matching {
            debug!(mission_id = %mission, objective_id = %objective, "Completing ignored objective");
            self.drive(mission, |mission, ctx| mission.complete_objective(objective, ctx));
        }
        self.drain_chained(&mut HashSet::new());
    }

    pub fn clear_ignored_tags(&mut self) {
        self.ignored_tags.clear();
    }

    pub fn ignored_tags(&self) -> &IgnoredTags {
        &self.ignored_tags
    }

    /// Install an extra skip predicate, consulted after the ignored tags.
    pub fn set_objective_filter(&mut self, filter: impl ObjectiveFilter + 'static) {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_objective_filter(&mut self) {
        self.filter = None;
    }

    /// Receive every runtime event.
    pub fn add_listener(&mut self, listener: impl FnMut(&RuntimeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Call `callback` when the mission starts, or right away if it is active.
    pub fn when_mission_starts_or_is_active(
        &mut self,
        id: MissionId,
        callback: impl FnOnce(MissionId) + 'static,
    ) {
        if !id.is_valid() {
            warn!("Ignoring observer of an invalid mission identity");
            return;
        }

        if self.history.is_active(&id) {
            callback(id);
        } else {
            self.mission_started.register(id, move |id, ()| callback(id));
        }
    }

    /// Call `callback` when the mission ends, or right away if it already ended.
    pub fn when_mission_ends(
        &mut self,
        id: MissionId,
        callback: impl FnOnce(MissionId, bool) + 'static,
    ) {
        if !id.is_valid() {
            warn!("Ignoring observer of an invalid mission identity");
            return;
        }

        if self.history.is_terminal(&id) {
            callback(id, self.history.is_cancelled(&id));
        } else {
            self.mission_ended.register(id, callback);
        }
    }

    /// Call `callback` when the objective starts, or right away if it is active.
    pub fn when_objective_starts_or_is_active(
        &mut self,
        id: ObjectiveId,
        callback: impl FnOnce(ObjectiveId) + 'static,
    ) {
        if !id.is_valid() {
            warn!("Ignoring observer of an invalid objective identity");
            return;
        }

        if self.history.is_objective_active(&id) {
            callback(id);
        } else {
            self.objective_started.register(id, move |id, ()| callback(id));
        }
    }

    /// Call `callback` when the objective ends, or right away if it already ended.
    pub fn when_objective_ends(
        &mut self,
        id: ObjectiveId,
        callback: impl FnOnce(ObjectiveId, bool) + 'static,
    ) {
        if !id.is_valid() {
            warn!("Ignoring observer of an invalid objective identity");
            return;
        }

        if self.history.is_objective_terminal(&id) {
            callback(id, self.history.is_objective_cancelled(&id));
        } else {
            self.objective_ended.register(id, callback);
        }
    }

    fn try_start_mission(
        &mut self,
        id: MissionId,
        forwarded: &mut HashSet<MissionId>,
    ) -> StartOutcome {
        if !id.is_valid() {
            warn!("Refusing to start a mission with an invalid identity");
            return StartOutcome::Rejected(StartRejection::InvalidIdentity);
        }

        let Some(definition) = self.catalog.get(&id).cloned() else {
            warn!(mission_id = %id, "Refusing to start a mission missing from the catalog");
            return StartOutcome::Rejected(StartRejection::UnknownMission);
        };

        if self.history.is_active(&id) {
            debug!(mission = %definition.display_name(), "Mission is already active");
            return StartOutcome::Rejected(StartRejection::AlreadyActive);
        }

        if self.history.is_complete(&id) {
            debug!(mission = %definition.display_name(), "Mission already completed");
            return StartOutcome::Rejected(StartRejection::AlreadyComplete);
        }

        for target in &definition.missions_to_cancel {
            if self.drive(*target, |mission, ctx| mission.cancel(ctx)) == Some(true) {
                debug!(mission_id = %target, cancelled_by = %id, "Mission cancelled by a newer one");
            }
        }

        if !definition.enabled {
            if !forwarded.insert(id) {
                warn!(mission = %definition.display_name(), "Disabled missions forward in a cycle");
                return StartOutcome::Rejected(StartRejection::AlreadyForwarded);
            }

            info!(mission = %definition.display_name(), "Mission disabled, forwarding to next missions");
            self.chained.extend(definition.next_missions.iter().copied());
            return StartOutcome::Forwarded;
        }

        if !self.history.add_active(id) {
            warn!(mission = %definition.display_name(), "Mission is already recorded in the history");
            return StartOutcome::Rejected(StartRejection::AlreadyRecorded);
        }

        self.launch(definition, false);
        StartOutcome::Started
    }

    fn launch(&mut self, definition: Arc<MissionDefinition>, resumed: bool) {
        let id = definition.id;
        info!(mission = %definition.display_name(), mission_id = %id, resumed, "Starting mission");

        self.missions.push(Mission::new(definition, &self.registry));
        if resumed {
            self.resumed.insert(id);
        }

        self.publish(RuntimeEventKind::MissionStarted { mission: id });
        self.mission_started.fire(id, ());

        self.drive(id, |mission, ctx| mission.start(ctx));
    }

    /// Run `op` on an active mission, then apply whatever it reported.
    fn drive<R>(
        &mut self,
        id: MissionId,
        op: impl FnOnce(&mut Mission, &mut MissionContext<'_>) -> R,
    ) -> Option<R> {
        let index = self.missions.iter().position(|mission| mission.id() == id)?;

        let filter = DispatchFilter {
            ignored: &self.ignored_tags,
            custom: self.filter.as_deref(),
            history: self.resumed.contains(&id).then_some(&self.history),
        };
        let mut ctx = MissionContext::new(&self.registry, &filter);
        let result = op(&mut self.missions[index], &mut ctx);
        let signals = ctx.into_signals();

        for signal in signals {
            match signal {
                MissionSignal::ObjectiveStarted(objective) => {
                    self.on_objective_started(id, objective)
                }
                MissionSignal::ObjectiveEnded {
                    objective,
                    cancelled,
                } => self.on_objective_ended(id, objective, cancelled),
                MissionSignal::Ended { cancelled } => self.on_mission_ended(id, cancelled),
            }
        }

        Some(result)
    }

    fn drain_chained(&mut self, forwarded: &mut HashSet<MissionId>) {
        while let Some(id) = self.chained.pop_front() {
            let outcome = self.try_start_mission(id, forwarded);
            debug!(mission_id = %id, outcome = ?outcome, "Chained start");
        }
    }

    fn on_objective_started(&mut self, mission: MissionId, objective: ObjectiveId) {
        if !self.history.add_active_objective(objective) {
            if self.resumed.contains(&mission) && self.history.is_objective_active(&objective) {
                debug!(objective_id = %objective, "Resumed objective restarted");
            } else {
                warn!(objective_id = %objective, "Objective is already recorded in the history");
            }
        }

        self.publish(RuntimeEventKind::ObjectiveStarted { mission, objective });
        self.objective_started.fire(objective, ());
    }

    fn on_objective_ended(&mut self, mission: MissionId, objective: ObjectiveId, cancelled: bool) {
        if !self.history.set_objective_complete(objective, cancelled) {
            warn!(objective_id = %objective, "Objective end could not be recorded");
        }

        self.publish(RuntimeEventKind::ObjectiveEnded {
            mission,
            objective,
            cancelled,
        });
        self.objective_ended.fire(objective, cancelled);
    }

    fn on_mission_ended(&mut self, id: MissionId, cancelled: bool) {
        if !self.history.set_complete(id, cancelled) {
            protocol_violation!("Mission ended twice", mission_id = %id);
            return;
        }

        let Some(index) = self.missions.iter().position(|mission| mission.id() == id) else {
            protocol_violation!("Ended mission is not active", mission_id = %id);
            return;
        };
        let mission = self.missions.remove(index);
        self.resumed.remove(&id);

        let definition = mission.definition();
        info!(mission = %definition.display_name(), mission_id = %id, cancelled, "Mission ended");

        self.publish(RuntimeEventKind::MissionEnded {
            mission: id,
            cancelled,
        });
        self.mission_ended.fire(id, cancelled);

        if !cancelled || definition.chain_next_on_cancel {
            self.chained.extend(definition.next_missions.iter().copied());
        }
    }

    fn publish(&mut self, kind: RuntimeEventKind) {
        debug!(event_type = kind.event_type(), mission_id = %kind.mission(), "Runtime event");

        let event = RuntimeEvent::now(kind);
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    fn is_running(&self, id: MissionId) -> bool {
        self.missions.iter().any(|mission| mission.id() == id)
    }

    /// The runtime instance of an active mission.
    pub fn active_mission(&self, id: MissionId) -> Option<&Mission> {
        self.missions.iter().find(|mission| mission.id() == id)
    }

    /// Active missions in start order.
    pub fn active_missions(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter()
    }

    pub fn active_mission_ids(&self) -> Vec<MissionId> {
        self.missions.iter().map(Mission::id).collect()
    }

    pub fn is_mission_active(&self, id: MissionId) -> bool {
        self.history.is_active(&id)
    }

    pub fn is_mission_complete(&self, id: MissionId) -> bool {
        self.history.is_complete(&id)
    }

    pub fn is_mission_cancelled(&self, id: MissionId) -> bool {
        self.history.is_cancelled(&id)
    }

    pub fn is_objective_active(&self, id: ObjectiveId) -> bool {
        self.history.is_objective_active(&id)
    }

    pub fn is_objective_complete(&self, id: ObjectiveId) -> bool {
        self.history.is_objective_complete(&id)
    }

    /// Every action still waiting to finish, across active missions.
    pub fn pending_action_handles(&self) -> Vec<ActionHandle> {
        self.missions
            .iter()
            .flat_map(Mission::pending_action_handles)
            .collect()
    }

    pub fn history(&self) -> &MissionHistory {
        &self.history
    }

    /// Give the ledger back, typically to persist it.
    pub fn into_history(self) -> MissionHistory {
        self.history
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("catalog", &self.catalog.len())
            .field("active", &self.active_mission_ids())
            .field("history", &self.history.len())
            .field("ignored_tags", &self.ignored_tags)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
