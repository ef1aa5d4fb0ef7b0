//! Mission History Ledger
//!
//! Durable identity -> lifecycle map used to refuse duplicate mission starts and to
//! resume interrupted missions after a restart.
//!
//! # Guarantees
//!
//! - An identity enters the ledger as `Active` exactly once
//! - `Active` moves to `Cancelled` or `Complete` exactly once and is never overwritten
//! - The active set lists every `Active` mission, in the order they were started
//! - Queries never fail: absent or invalid identities answer `false`
//!
//! The same rules apply to objective identities, which are tracked in a separate map.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::identity::{MissionId, ObjectiveId};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Lifecycle state of a recorded identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Started and not yet ended
    Active,
    /// Ended by cancellation
    Cancelled,
    /// Ended normally
    Complete,
}

impl LifecycleState {
    /// Check if state is terminal (complete or cancelled)
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Cancelled | LifecycleState::Complete)
    }

    /// Terminal state for an ending.
    pub fn ended(was_cancelled: bool) -> Self {
        if was_cancelled {
            LifecycleState::Cancelled
        } else {
            LifecycleState::Complete
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Cancelled => "cancelled",
            LifecycleState::Complete => "complete",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(LifecycleState::Active),
            "cancelled" => Some(LifecycleState::Cancelled),
            "complete" => Some(LifecycleState::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while persisting or restoring the ledger.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("History corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Lossless image of a [`MissionHistory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Format version
    pub version: u32,
    /// Mission states
    pub missions: BTreeMap<MissionId, LifecycleState>,
    /// Objective states
    pub objectives: BTreeMap<ObjectiveId, LifecycleState>,
    /// Active missions in start order
    pub active_missions: Vec<MissionId>,
}

impl HistorySnapshot {
    /// BLAKE3 digest of the canonical JSON body.
    pub fn digest(&self) -> Result<String> {
        let body = serde_json::to_vec(self)?;
        Ok(hex::encode(blake3::hash(&body).as_bytes()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    digest: String,
    snapshot: HistorySnapshot,
}

/// The mission history ledger.
///
/// Lookups and transitions are constant time. The active set keeps a start sequence per
/// mission so start order survives removals without shifting.
#[derive(Debug, Clone, Default)]
pub struct MissionHistory {
    missions: HashMap<MissionId, LifecycleState>,
    objectives: HashMap<ObjectiveId, LifecycleState>,
    active: HashMap<MissionId, u64>,
    next_sequence: u64,
}

impl PartialEq for MissionHistory {
    fn eq(&self, other: &Self) -> bool {
        self.missions == other.missions
            && self.objectives == other.objectives
            && self.active_missions() == other.active_missions()
    }
}

impl Eq for MissionHistory {}

impl MissionHistory {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything was ever recorded for a mission.
    pub fn has_data(&self) -> bool {
        !self.missions.is_empty()
    }

    /// Number of recorded missions.
    pub fn len(&self) -> usize {
        self.missions.len()
    }

    /// Whether no mission was ever recorded.
    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// Active missions, in the order they were started.
    pub fn active_missions(&self) -> Vec<MissionId> {
        let mut active: Vec<(u64, MissionId)> =
            self.active.iter().map(|(id, sequence)| (*sequence, *id)).collect();
        active.sort_unstable();
        active.into_iter().map(|(_, id)| id).collect()
    }

    /// Number of active missions.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Recorded state of a mission.
    pub fn state(&self, id: &MissionId) -> Option<LifecycleState> {
        if !id.is_valid() {
            return None;
        }
        self.missions.get(id).copied()
    }

    /// Whether the mission is running.
    pub fn is_active(&self, id: &MissionId) -> bool {
        self.state(id) == Some(LifecycleState::Active)
    }

    /// Whether the mission ended by cancellation.
    pub fn is_cancelled(&self, id: &MissionId) -> bool {
        self.state(id) == Some(LifecycleState::Cancelled)
    }

    /// Whether the mission ended normally.
    pub fn is_complete(&self, id: &MissionId) -> bool {
        self.state(id) == Some(LifecycleState::Complete)
    }

    /// Whether the mission ended, either way.
    pub fn is_terminal(&self, id: &MissionId) -> bool {
        self.state(id).map_or(false, |state| state.is_terminal())
    }

    /// Reserve a mission identity.
    ///
    /// Fails when the identity is invalid or already present in any state, which makes
    /// this single call both the "already active" and the "already ended" guard.
    pub fn add_active(&mut self, id: MissionId) -> bool {
        if !id.is_valid() {
            warn!("Refusing to record a mission with an invalid identity");
            return false;
        }

        if let Some(state) = self.missions.get(&id) {
            debug!(mission_id = %id, state = %state, "Mission already recorded");
            return false;
        }

        self.missions.insert(id, LifecycleState::Active);
        self.push_active(id);
        true
    }

    /// Move an active mission to its terminal state.
    ///
    /// Fails when the identity is absent or already terminal.
    pub fn set_complete(&mut self, id: MissionId, was_cancelled: bool) -> bool {
        match self.missions.get_mut(&id) {
            Some(state @ LifecycleState::Active) => {
                *state = LifecycleState::ended(was_cancelled);
                self.active.remove(&id);
                true
            }
            Some(state) => {
                error!(mission_id = %id, state = %state, "Mission already ended");
                false
            }
            None => {
                error!(mission_id = %id, "Ending a mission that was never recorded");
                false
            }
        }
    }

    /// Recorded state of an objective.
    pub fn objective_state(&self, id: &ObjectiveId) -> Option<LifecycleState> {
        if !id.is_valid() {
            return None;
        }
        self.objectives.get(id).copied()
    }

    /// Whether the objective is running.
    pub fn is_objective_active(&self, id: &ObjectiveId) -> bool {
        self.objective_state(id) == Some(LifecycleState::Active)
    }

    /// Whether the objective ended by cancellation.
    pub fn is_objective_cancelled(&self, id: &ObjectiveId) -> bool {
        self.objective_state(id) == Some(LifecycleState::Cancelled)
    }

    /// Whether the objective ended normally.
    pub fn is_objective_complete(&self, id: &ObjectiveId) -> bool {
        self.objective_state(id) == Some(LifecycleState::Complete)
    }

    /// Whether the objective ended, either way.
    pub fn is_objective_terminal(&self, id: &ObjectiveId) -> bool {
        self.objective_state(id).map_or(false, |state| state.is_terminal())
    }

    /// Record an objective as running. Same rules as [`Self::add_active`].
    pub fn add_active_objective(&mut self, id: ObjectiveId) -> bool {
        if !id.is_valid() || self.objectives.contains_key(&id) {
            return false;
        }

        self.objectives.insert(id, LifecycleState::Active);
        true
    }

    /// Move an active objective to its terminal state. Same rules as [`Self::set_complete`].
    pub fn set_objective_complete(&mut self, id: ObjectiveId, was_cancelled: bool) -> bool {
        match self.objectives.get_mut(&id) {
            Some(state @ LifecycleState::Active) => {
                *state = LifecycleState::ended(was_cancelled);
                true
            }
            _ => false,
        }
    }

    /// Lossless image of the ledger, with maps in identity order.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            version: SNAPSHOT_VERSION,
            missions: self.missions.iter().map(|(id, state)| (*id, *state)).collect(),
            objectives: self.objectives.iter().map(|(id, state)| (*id, *state)).collect(),
            active_missions: self.active_missions(),
        }
    }

    /// Rebuild a ledger from a snapshot, checking its consistency.
    pub fn from_snapshot(snapshot: HistorySnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(HistoryError::UnsupportedVersion(snapshot.version));
        }

        Self::from_parts(
            snapshot.missions,
            snapshot.objectives,
            snapshot.active_missions,
        )
    }

    /// Verify that the active set and the state map agree.
    pub fn check_consistency(&self) -> Result<()> {
        for id in self.active.keys() {
            match self.missions.get(id) {
                Some(LifecycleState::Active) => {}
                Some(state) => {
                    return Err(HistoryError::Corrupted(format!(
                        "active set lists mission {} which is {}",
                        id, state
                    )))
                }
                None => {
                    return Err(HistoryError::Corrupted(format!(
                        "active set lists unknown mission {}",
                        id
                    )))
                }
            }
        }

        let active_count = self
            .missions
            .values()
            .filter(|state| **state == LifecycleState::Active)
            .count();
        if active_count != self.active.len() {
            return Err(HistoryError::Corrupted(format!(
                "{} active missions but {} in the active set",
                active_count,
                self.active.len()
            )));
        }

        Ok(())
    }

    /// Encode as a digest-protected JSON document.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.snapshot();
        let envelope = SnapshotEnvelope {
            digest: snapshot.digest()?,
            snapshot,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Decode a document produced by [`Self::to_json`].
    pub fn from_json(content: &str) -> Result<Self> {
        let envelope: SnapshotEnvelope = serde_json::from_str(content)?;
        let actual = envelope.snapshot.digest()?;
        if actual != envelope.digest {
            return Err(HistoryError::DigestMismatch {
                expected: envelope.digest,
                actual,
            });
        }
        Self::from_snapshot(envelope.snapshot)
    }

    /// Assemble a ledger from stored parts and run the consistency check.
    pub(crate) fn from_parts(
        missions: impl IntoIterator<Item = (MissionId, LifecycleState)>,
        objectives: impl IntoIterator<Item = (ObjectiveId, LifecycleState)>,
        active_missions: Vec<MissionId>,
    ) -> Result<Self> {
        let mut history = Self {
            missions: missions.into_iter().collect(),
            objectives: objectives.into_iter().collect(),
            ..Self::default()
        };

        for id in active_missions {
            if history.active.contains_key(&id) {
                return Err(HistoryError::Corrupted(format!(
                    "active set lists mission {} twice",
                    id
                )));
            }
            history.push_active(id);
        }

        history.check_consistency()?;
        Ok(history)
    }

    fn push_active(&mut self, id: MissionId) {
        self.active.insert(id, self.next_sequence);
        self.next_sequence += 1;
    }
}
