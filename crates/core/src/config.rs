//! Configuration management for Questline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::identity::MissionId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlineConfig {
    pub orchestrator: OrchestratorConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Resume the missions left active in the ledger when booting
    pub resume_from_history: bool,
    /// Mission started on boot when there is nothing to resume
    pub first_mission: Option<MissionId>,
    /// Objectives carrying a tag that contains one of these are skipped
    pub ignored_objective_tags: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            resume_from_history: true,
            first_mission: None,
            ignored_objective_tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// SQLite file holding the ledger; `None` keeps the ledger in memory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl QuestlineConfig {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but cannot be honored.
    pub fn validate(&self) -> Result<(), CoreError> {
        // An empty tag is contained in every tag and would skip every objective.
        if self
            .orchestrator
            .ignored_objective_tags
            .iter()
            .any(|tag| tag.trim().is_empty())
        {
            return Err(CoreError::Config(
                "ignored_objective_tags must not contain empty entries".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(CoreError::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Ledger location, if persistence is configured.
    pub fn history_path(&self) -> Option<&Path> {
        self.history.path.as_deref()
    }
}
