//! Core functionality for the Questline mission runtime.
//!
//! This crate provides the types shared by every part of the runtime:
//! - Stable identities and read-only mission definitions
//! - The mission history ledger and its persistence
//! - Runtime event schema
//! - Configuration and logging

pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod history;
#[cfg(feature = "sqlite")]
pub mod history_store;
pub mod identity;
pub mod logging;

pub use config::{HistoryConfig, LoggingConfig, OrchestratorConfig, QuestlineConfig};
pub use definition::{
    ActionType, BehaviorType, DefinitionError, DefinitionIssue, MissionCatalog,
    MissionDefinition, ObjectiveDefinition, ObjectiveSlot,
};
pub use error::{CoreError, Result};
pub use event::{RuntimeEvent, RuntimeEventKind};
pub use history::{HistoryError, HistorySnapshot, LifecycleState, MissionHistory};
#[cfg(feature = "sqlite")]
pub use history_store::HistoryStore;
pub use identity::{MissionId, ObjectiveId};
