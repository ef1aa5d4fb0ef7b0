//! Core error types

use thiserror::Error;

/// Core error type for Questline
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Definition error
    #[error("Definition error: {0}")]
    Definition(#[from] crate::definition::DefinitionError),

    /// History error
    #[error("History error: {0}")]
    History(#[from] crate::history::HistoryError),

    /// TOML error
    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
