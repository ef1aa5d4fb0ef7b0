//! Mission and objective definitions.
//!
//! Definitions are authored outside the runtime and are read-only once loaded into a
//! [`MissionCatalog`]. Runtime missions hold them behind `Arc` so a definition outlives
//! every runtime instance created from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[cfg(feature = "toml")]
use std::path::Path;

use crate::identity::{MissionId, ObjectiveId};

/// Key of an action constructor registered with the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(String);

/// Key of an objective behavior constructor registered with the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorType(String);

macro_rules! type_key {
    ($name:ident) => {
        impl $name {
            /// Create a key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Key text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// An empty key is a null reference.
            pub fn is_valid(&self) -> bool {
                !self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self::new(key)
            }
        }
    };
}

type_key!(ActionType);
type_key!(BehaviorType);

fn enabled_by_default() -> bool {
    true
}

/// One step of a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveDefinition {
    /// Stable identity
    pub id: ObjectiveId,
    /// Display name, used in logs
    #[serde(default)]
    pub name: String,
    /// Behavior run once the start actions finished; `None` waits for external completion
    #[serde(default)]
    pub behavior: Option<BehaviorType>,
    /// Actions run before the behavior
    #[serde(default)]
    pub start_actions: Vec<ActionType>,
    /// Actions run once the objective ended
    #[serde(default)]
    pub end_actions: Vec<ActionType>,
    /// Free-form tags consumed by skip predicates
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Run the end actions when the objective is cancelled
    #[serde(default)]
    pub run_end_actions_on_cancel: bool,
}

impl ObjectiveDefinition {
    /// Create an objective definition with no actions and no behavior.
    pub fn new(id: ObjectiveId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            behavior: None,
            start_actions: Vec::new(),
            end_actions: Vec::new(),
            tags: BTreeSet::new(),
            run_end_actions_on_cancel: false,
        }
    }

    /// Set the behavior.
    pub fn with_behavior(mut self, behavior: impl Into<BehaviorType>) -> Self {
        self.behavior = Some(behavior.into());
        self
    }

    /// Append a start action.
    pub fn with_start_action(mut self, action: impl Into<ActionType>) -> Self {
        self.start_actions.push(action.into());
        self
    }

    /// Append an end action.
    pub fn with_end_action(mut self, action: impl Into<ActionType>) -> Self {
        self.end_actions.push(action.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Run end actions on cancellation.
    pub fn run_end_actions_on_cancel(mut self, value: bool) -> Self {
        self.run_end_actions_on_cancel = value;
        self
    }
}

/// An objective as declared inside a mission, with its enable flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSlot {
    /// The objective
    #[serde(flatten)]
    pub objective: Arc<ObjectiveDefinition>,
    /// Disabled slots are never dispatched
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// A mission: ordered objectives wrapped by start and end actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionDefinition {
    /// Stable identity
    pub id: MissionId,
    /// Display name, used in logs
    #[serde(default)]
    pub name: String,
    /// Objectives in declaration order
    #[serde(default)]
    pub objectives: Vec<ObjectiveSlot>,
    /// Actions run before the first objective
    #[serde(default)]
    pub start_actions: Vec<ActionType>,
    /// Actions run once every objective completed
    #[serde(default)]
    pub end_actions: Vec<ActionType>,
    /// Missions started when this one ends
    #[serde(default)]
    pub next_missions: Vec<MissionId>,
    /// Active missions cancelled when this one starts
    #[serde(default)]
    pub missions_to_cancel: Vec<MissionId>,
    /// Disabled missions are never instantiated and forward to their next missions
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Run the end actions when the mission is cancelled
    #[serde(default)]
    pub run_end_actions_on_cancel: bool,
    /// Start the next missions even when the mission was cancelled
    #[serde(default)]
    pub chain_next_on_cancel: bool,
}

impl MissionDefinition {
    /// Create an enabled mission definition with nothing in it.
    pub fn new(id: MissionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            objectives: Vec::new(),
            start_actions: Vec::new(),
            end_actions: Vec::new(),
            next_missions: Vec::new(),
            missions_to_cancel: Vec::new(),
            enabled: true,
            run_end_actions_on_cancel: false,
            chain_next_on_cancel: false,
        }
    }

    /// Append an enabled objective.
    pub fn with_objective(self, objective: ObjectiveDefinition) -> Self {
        self.with_objective_slot(objective, true)
    }

    /// Append an objective with an explicit enable flag.
    pub fn with_objective_slot(mut self, objective: ObjectiveDefinition, enabled: bool) -> Self {
        self.objectives.push(ObjectiveSlot {
            objective: Arc::new(objective),
            enabled,
        });
        self
    }

    /// Append a start action.
    pub fn with_start_action(mut self, action: impl Into<ActionType>) -> Self {
        self.start_actions.push(action.into());
        self
    }

    /// Append an end action.
    pub fn with_end_action(mut self, action: impl Into<ActionType>) -> Self {
        self.end_actions.push(action.into());
        self
    }

    /// Append a next mission.
    pub fn with_next_mission(mut self, mission: MissionId) -> Self {
        self.next_missions.push(mission);
        self
    }

    /// Append a mission to cancel on start.
    pub fn with_mission_to_cancel(mut self, mission: MissionId) -> Self {
        self.missions_to_cancel.push(mission);
        self
    }

    /// Set the enabled flag.
    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Run end actions on cancellation.
    pub fn run_end_actions_on_cancel(mut self, value: bool) -> Self {
        self.run_end_actions_on_cancel = value;
        self
    }

    /// Chain next missions on cancellation.
    pub fn chain_next_on_cancel(mut self, value: bool) -> Self {
        self.chain_next_on_cancel = value;
        self
    }

    /// Name for logs, falling back to the identity.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Enabled objectives in declaration order.
    pub fn enabled_objectives(&self) -> impl Iterator<Item = &Arc<ObjectiveDefinition>> {
        self.objectives
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| &slot.objective)
    }
}

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition carries a nil identity
    #[error("Mission definition '{name}' has an invalid identity")]
    InvalidIdentity {
        /// Display name of the offending definition
        name: String,
    },

    /// Two definitions share an identity
    #[error("Duplicate mission identity: {id}")]
    DuplicateIdentity {
        /// The shared identity
        id: MissionId,
    },

    /// Catalog text could not be parsed
    #[cfg(feature = "toml")]
    #[error("Catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal problem found while validating a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionIssue {
    /// A next mission is not in the catalog
    DanglingNextMission {
        /// Declaring mission
        mission: MissionId,
        /// Missing target
        target: MissionId,
    },
    /// A mission to cancel is not in the catalog
    DanglingCancelTarget {
        /// Declaring mission
        mission: MissionId,
        /// Missing target
        target: MissionId,
    },
    /// An action list contains an empty key
    NullAction {
        /// Declaring mission
        mission: MissionId,
        /// Objective owning the list, if any
        objective: Option<ObjectiveId>,
    },
    /// An objective carries a nil identity
    InvalidObjectiveIdentity {
        /// Declaring mission
        mission: MissionId,
        /// Position in the declaration
        index: usize,
    },
}

impl fmt::Display for DefinitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionIssue::DanglingNextMission { mission, target } => {
                write!(f, "mission {} chains to unknown mission {}", mission, target)
            }
            DefinitionIssue::DanglingCancelTarget { mission, target } => {
                write!(f, "mission {} cancels unknown mission {}", mission, target)
            }
            DefinitionIssue::NullAction { mission, objective } => match objective {
                Some(objective) => write!(
                    f,
                    "objective {} of mission {} has a null action",
                    objective, mission
                ),
                None => write!(f, "mission {} has a null action", mission),
            },
            DefinitionIssue::InvalidObjectiveIdentity { mission, index } => write!(
                f,
                "objective #{} of mission {} has an invalid identity",
                index, mission
            ),
        }
    }
}

#[cfg(feature = "toml")]
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    missions: Vec<MissionDefinition>,
}

/// Read-only set of mission definitions, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct MissionCatalog {
    missions: HashMap<MissionId, Arc<MissionDefinition>>,
}

impl MissionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition, rejecting invalid and duplicate identities.
    pub fn insert(&mut self, definition: MissionDefinition) -> Result<Arc<MissionDefinition>, DefinitionError> {
        if !definition.id.is_valid() {
            return Err(DefinitionError::InvalidIdentity {
                name: definition.name.clone(),
            });
        }

        if self.missions.contains_key(&definition.id) {
            return Err(DefinitionError::DuplicateIdentity { id: definition.id });
        }

        let definition = Arc::new(definition);
        self.missions.insert(definition.id, Arc::clone(&definition));
        Ok(definition)
    }

    /// Build a catalog from definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = MissionDefinition>,
    ) -> Result<Self, DefinitionError> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    /// Parse a catalog from TOML (`[[missions]]` tables).
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let file: CatalogFile = toml::from_str(content)?;
        tracing::debug!(count = file.missions.len(), "Parsed mission catalog");
        Self::from_definitions(file.missions)
    }

    /// Load a catalog from a TOML file.
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Look up a definition. Unknown identities yield `None`.
    pub fn get(&self, id: &MissionId) -> Option<&Arc<MissionDefinition>> {
        self.missions.get(id)
    }

    /// Whether the catalog holds this identity.
    pub fn contains(&self, id: &MissionId) -> bool {
        self.missions.contains_key(id)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.missions.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// All definitions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MissionDefinition>> {
        self.missions.values()
    }

    /// Report configuration problems. Never fails; callers decide whether to log or refuse.
    pub fn validate(&self) -> Vec<DefinitionIssue> {
        let mut issues = Vec::new();

        let mut ids: Vec<&MissionId> = self.missions.keys().collect();
        ids.sort();

        for id in ids {
            let mission = &self.missions[id];

            for target in &mission.next_missions {
                if !self.contains(target) {
                    issues.push(DefinitionIssue::DanglingNextMission {
                        mission: mission.id,
                        target: *target,
                    });
                }
            }

            for target in &mission.missions_to_cancel {
                if !self.contains(target) {
                    issues.push(DefinitionIssue::DanglingCancelTarget {
                        mission: mission.id,
                        target: *target,
                    });
                }
            }

            if mission
                .start_actions
                .iter()
                .chain(&mission.end_actions)
                .any(|action| !action.is_valid())
            {
                issues.push(DefinitionIssue::NullAction {
                    mission: mission.id,
                    objective: None,
                });
            }

            for (index, slot) in mission.objectives.iter().enumerate() {
                let objective = &slot.objective;
                if !objective.id.is_valid() {
                    issues.push(DefinitionIssue::InvalidObjectiveIdentity {
                        mission: mission.id,
                        index,
                    });
                }

                if objective
                    .start_actions
                    .iter()
                    .chain(&objective.end_actions)
                    .any(|action| !action.is_valid())
                {
                    issues.push(DefinitionIssue::NullAction {
                        mission: mission.id,
                        objective: Some(objective.id),
                    });
                }
            }
        }

        for issue in &issues {
            warn!(issue = %issue, "Mission catalog issue");
        }

        issues
    }
}
