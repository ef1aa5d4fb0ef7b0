//! Questline runtime - mission execution for the Questline mission system
//!
//! This crate runs the missions described by `questline-core` definitions:
//! - Action phases (`ActionExecutor`) that complete once every action finished
//! - Objectives with start and end phases and a user-supplied behavior
//! - Missions dispatching their objectives one at a time
//! - The `Orchestrator`, which records everything in the history ledger, chains
//!   missions and notifies observers
//!
//! # Architecture
//!
//! Execution is single-threaded and driven by completions:
//! 1. `Orchestrator::start_mission` reserves the mission in the ledger
//! 2. The mission runs its start phase, then dispatches its first objective
//! 3. Each objective runs its start phase, its behavior, then its end phase
//! 4. When the last objective ended, the mission runs its end phase and ends
//! 5. The orchestrator records the end, fires observers and starts next missions
//!
//! Actions that cannot finish inside `execute` keep their `ActionHandle` and hand it to
//! `Orchestrator::finish_action` later; objectives waiting on the outside world are
//! completed with `Orchestrator::complete_objective`.
//!
//! Components never call back into their owner. Objectives and missions report
//! transitions as signals that the caller applies once the call returned, which keeps
//! synchronous completion chains free of re-entrant borrows.
//!
//! # Examples
//!
//! ```
//! use questline_core::{MissionCatalog, MissionDefinition, MissionId, ObjectiveDefinition, ObjectiveId};
//! use questline_runtime::{Orchestrator, Registry};
//!
//! let intro = MissionId::from_u128(1);
//! let talk = ObjectiveId::from_u128(10);
//! let catalog = MissionCatalog::from_definitions([
//!     MissionDefinition::new(intro, "intro")
//!         .with_objective(ObjectiveDefinition::new(talk, "talk to the guard")),
//! ])
//! .unwrap();
//!
//! let mut orchestrator = Orchestrator::in_memory(catalog, Registry::with_builtins());
//! assert!(orchestrator.start_mission(intro).is_started());
//!
//! assert!(orchestrator.complete_objective(intro, talk));
//! assert!(orchestrator.is_mission_complete(intro));
//! ```

/// Log a broken internal protocol and fail loudly in debug builds.
macro_rules! protocol_violation {
    ($msg:literal $(, $($field:tt)+)?) => {{
        tracing::error!($($($field)+,)? $msg);
        debug_assert!(false, $msg);
    }};
}

pub mod action;
pub mod executor;
pub mod filter;
pub mod mission;
pub mod objective;
pub mod observer;
pub mod orchestrator;
pub mod registry;

pub use action::{
    ActionContext, ActionHandle, FinishImmediately, MissionAction, Phase, PhaseAddress,
    PhaseOwner,
};
pub use executor::{ActionExecutor, PhaseProgress};
pub use filter::{AllowAll, IgnoredTags, ObjectiveFilter};
pub use mission::{Mission, MissionContext, MissionSignal, MissionState};
pub use objective::{
    AutoCompleteBehavior, ManualBehavior, Objective, ObjectiveBehavior, ObjectiveContext,
    ObjectiveSignal, ObjectiveState,
};
pub use observer::ObserverRegistry;
pub use orchestrator::{BootOutcome, Orchestrator, StartOutcome, StartRejection};
pub use registry::{builtin, Registry};
