//! Session error types

use thiserror::Error;

/// Why a trip could not be started
#[derive(Debug, Error)]
pub enum SessionError {
    /// A trip is already running
    #[error("a trip is already active")]
    AlreadyActive,

    /// No accelerometer attached
    #[error("motion sensor not available")]
    MotionSensorUnavailable,

    /// Error from contract layer
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
