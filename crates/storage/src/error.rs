//! Storage error types

use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Store creation error
    #[error("failed to create store '{name}': {message}")]
    StoreCreation { name: String, message: String },

    /// Recorder queue full - trip not accepted
    #[error("recorder queue full for store '{store_name}'")]
    QueueFull { store_name: String },

    /// Recorder worker gone before answering
    #[error("recorder for store '{store_name}' is closed")]
    RecorderClosed { store_name: String },

    /// Store error (from contract)
    #[error("store error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn store_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn recorder_closed(store_name: impl Into<String>) -> Self {
        Self::RecorderClosed {
            store_name: store_name.into(),
        }
    }
}
