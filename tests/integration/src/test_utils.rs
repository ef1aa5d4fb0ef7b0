//! Test utilities for mission runtime scenarios

use questline_core::{
    MissionCatalog, MissionDefinition, MissionHistory, MissionId, ObjectiveDefinition,
    ObjectiveId, OrchestratorConfig, RuntimeEventKind,
};
use questline_runtime::{
    ActionContext, ActionHandle, MissionAction, ObjectiveBehavior, ObjectiveContext,
    Orchestrator, Registry,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Labels of the journaling actions registered as `log_<label>`
pub const ACTION_LABELS: [&str; 3] = ["a", "b", "c"];

/// Ordered, shared record of what the fixtures did
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Handles of actions waiting for the test to finish them
#[derive(Debug, Clone, Default)]
pub struct HeldActions(Rc<RefCell<Vec<ActionHandle>>>);

impl HeldActions {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Oldest held handle
    pub fn take_first(&self) -> Option<ActionHandle> {
        let mut held = self.0.borrow_mut();
        if held.is_empty() {
            None
        } else {
            Some(held.remove(0))
        }
    }
}

/// Action finishing inside `execute`
struct JournalAction {
    label: &'static str,
    journal: Journal,
}

impl MissionAction for JournalAction {
    fn execute(&mut self, ctx: &mut ActionContext) {
        self.journal.push(format!("action {}", self.label));
        ctx.finish();
    }
}

/// Action finished later by the test through its handle
struct ManualFinish {
    journal: Journal,
    held: HeldActions,
}

impl MissionAction for ManualFinish {
    fn execute(&mut self, ctx: &mut ActionContext) {
        self.journal.push("hold");
        self.held.0.borrow_mut().push(ctx.handle());
    }

    fn cancel(&mut self) {
        self.journal.push("hold cancelled");
    }
}

/// Behavior journaling its lifecycle
struct JournalBehavior {
    auto_complete: bool,
    journal: Journal,
    objective: Option<ObjectiveId>,
}

impl ObjectiveBehavior for JournalBehavior {
    fn execute(&mut self, ctx: &mut ObjectiveContext) {
        self.objective = Some(ctx.objective());
        self.journal.push(format!("execute {}", ctx.objective()));
        if self.auto_complete {
            ctx.complete();
        }
    }

    fn on_ended(&mut self, cancelled: bool) {
        let objective = self.objective.unwrap_or_default();
        if cancelled {
            self.journal.push(format!("cancelled {}", objective));
        } else {
            self.journal.push(format!("completed {}", objective));
        }
    }
}

/// Shared recorders plus the registry wiring them in
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub journal: Journal,
    pub held: HeldActions,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-ins plus `log_a`..`log_c`, `manual_finish`, `journal_auto` and `journal_manual`
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::with_builtins();

        for label in ACTION_LABELS {
            let journal = self.journal.clone();
            registry.register_action(format!("log_{}", label).as_str(), move || JournalAction {
                label,
                journal: journal.clone(),
            });
        }

        let journal = self.journal.clone();
        let held = self.held.clone();
        registry.register_action("manual_finish", move || ManualFinish {
            journal: journal.clone(),
            held: held.clone(),
        });

        for (key, auto_complete) in [("journal_auto", true), ("journal_manual", false)] {
            let journal = self.journal.clone();
            registry.register_behavior(key, move || JournalBehavior {
                auto_complete,
                journal: journal.clone(),
                objective: None,
            });
        }

        registry
    }

    /// Orchestrator over `definitions` with an empty ledger
    pub fn orchestrator(&self, definitions: Vec<MissionDefinition>) -> Orchestrator {
        self.orchestrator_with_history(definitions, MissionHistory::new())
    }

    /// Orchestrator over `definitions` resuming from `history`
    pub fn orchestrator_with_history(
        &self,
        definitions: Vec<MissionDefinition>,
        history: MissionHistory,
    ) -> Orchestrator {
        let catalog = MissionCatalog::from_definitions(definitions).unwrap();
        Orchestrator::new(
            catalog,
            self.registry(),
            history,
            OrchestratorConfig::default(),
        )
    }

    /// Finish the oldest held action
    pub fn finish_next(&self, orchestrator: &mut Orchestrator) -> bool {
        let handle = self.held.take_first().expect("an action is held");
        orchestrator.finish_action(handle)
    }
}

pub fn mission_id(value: u128) -> MissionId {
    MissionId::from_u128(value)
}

pub fn objective_id(value: u128) -> ObjectiveId {
    ObjectiveId::from_u128(value)
}

pub fn mission(id: u128, name: &str) -> MissionDefinition {
    MissionDefinition::new(mission_id(id), name)
}

/// Objective completing as soon as it runs
pub fn auto_objective(id: u128) -> ObjectiveDefinition {
    ObjectiveDefinition::new(objective_id(id), format!("auto {}", id)).with_behavior("journal_auto")
}

/// Objective waiting for `complete_objective`
pub fn manual_objective(id: u128) -> ObjectiveDefinition {
    ObjectiveDefinition::new(objective_id(id), format!("manual {}", id))
        .with_behavior("journal_manual")
}

/// Collect every runtime event the orchestrator publishes
pub fn record_events(orchestrator: &mut Orchestrator) -> Rc<RefCell<Vec<RuntimeEventKind>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    orchestrator.add_listener(move |event| sink.borrow_mut().push(event.kind));
    events
}

/// Fresh SQLite path under the temp dir
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("questline_it_{}.db", uuid::Uuid::new_v4()))
}

/// Route runtime logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("questline=debug"))
        .with_test_writer()
        .try_init();
}
