//! Runtime events broadcast by the mission orchestrator.
//!
//! Every lifecycle transition the orchestrator observes is published as a
//! [`RuntimeEvent`]. Events are timestamped and serializable so listeners can forward
//! them to logs or other processes.

use serde::{Deserialize, Serialize};

use crate::identity::{MissionId, ObjectiveId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEventKind {
    /// A mission was created and is about to run its start actions
    MissionStarted {
        /// Mission identity
        mission: MissionId,
    },
    /// A mission ended
    MissionEnded {
        /// Mission identity
        mission: MissionId,
        /// Whether it ended by cancellation
        cancelled: bool,
    },
    /// An objective of an active mission started
    ObjectiveStarted {
        /// Owning mission
        mission: MissionId,
        /// Objective identity
        objective: ObjectiveId,
    },
    /// An objective of an active mission ended
    ObjectiveEnded {
        /// Owning mission
        mission: MissionId,
        /// Objective identity
        objective: ObjectiveId,
        /// Whether it ended by cancellation
        cancelled: bool,
    },
}

impl RuntimeEventKind {
    /// Mission the event belongs to.
    pub fn mission(&self) -> MissionId {
        match self {
            RuntimeEventKind::MissionStarted { mission }
            | RuntimeEventKind::MissionEnded { mission, .. }
            | RuntimeEventKind::ObjectiveStarted { mission, .. }
            | RuntimeEventKind::ObjectiveEnded { mission, .. } => *mission,
        }
    }

    /// Dotted event type, for log fields.
    pub fn event_type(&self) -> &'static str {
        match self {
            RuntimeEventKind::MissionStarted { .. } => event_types::MISSION_STARTED,
            RuntimeEventKind::MissionEnded { .. } => event_types::MISSION_ENDED,
            RuntimeEventKind::ObjectiveStarted { .. } => event_types::OBJECTIVE_STARTED,
            RuntimeEventKind::ObjectiveEnded { .. } => event_types::OBJECTIVE_ENDED,
        }
    }
}

/// A timestamped runtime event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    /// Timestamp (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Event payload
    #[serde(flatten)]
    pub kind: RuntimeEventKind,
}

impl RuntimeEvent {
    /// Stamp an event with the current time.
    pub fn now(kind: RuntimeEventKind) -> Self {
        Self {
            timestamp: current_timestamp(),
            kind,
        }
    }
}

/// Standard event type names.
pub mod event_types {
    pub const MISSION_STARTED: &str = "mission.started";
    pub const MISSION_ENDED: &str = "mission.ended";
    pub const OBJECTIVE_STARTED: &str = "objective.started";
    pub const OBJECTIVE_ENDED: &str = "objective.ended";
}

/// Get current timestamp in milliseconds.
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
