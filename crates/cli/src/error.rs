//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected after CLI overrides
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Trip could not be started
    #[error("Failed to start trip: {0}")]
    TripStart(#[from] session::SessionError),

    /// Recorder or store failure
    #[error("Trip storage failed: {0}")]
    Storage(#[from] storage::StorageError),

    /// Recording directory could not be loaded
    #[error("Failed to load recording: {0}")]
    Replay(#[from] ingestion::IngestionError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
