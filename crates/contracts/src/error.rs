//! Layered error definitions
//!
//! Categorized by source: config / sensor / trip / store

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sensor Errors =====
    /// Sensor missing or not permitted
    #[error("sensor '{sensor}' unavailable: {message}")]
    SensorUnavailable { sensor: String, message: String },

    /// A single read from a sensor failed
    #[error("sensor '{sensor}' read error: {message}")]
    SensorRead { sensor: String, message: String },

    // ===== Trip Errors =====
    /// Finalized trip rejected before persistence
    #[error("trip validation error: {message}")]
    TripValidation { message: String },

    // ===== Store Errors =====
    /// Store write error
    #[error("store '{store_name}' write error: {message}")]
    StoreWrite { store_name: String, message: String },

    /// Requested trip does not exist in the store
    #[error("trip {trip_id} not found in store '{store_name}'")]
    TripNotFound { store_name: String, trip_id: u64 },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sensor unavailable error
    pub fn sensor_unavailable(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create sensor read error
    pub fn sensor_read(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorRead {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create trip validation error
    pub fn trip_validation(message: impl Into<String>) -> Self {
        Self::TripValidation {
            message: message.into(),
        }
    }

    /// Create store write error
    pub fn store_write(store_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            store_name: store_name.into(),
            message: message.into(),
        }
    }
}
