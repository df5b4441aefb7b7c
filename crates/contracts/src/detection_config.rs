//! Detection configuration contracts shared across crates.
//!
//! Every detection component receives its section at construction; nothing
//! reads global constants. Tests substitute small windows.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Full detection configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DetectionConfig {
    #[validate(nested)]
    pub motion: MotionConfig,

    #[validate(nested)]
    pub speed: SpeedConfig,

    #[validate(nested)]
    pub noise: NoiseConfig,

    #[validate(nested)]
    pub classifier: ClassifierConfig,

    #[validate(nested)]
    pub session: SessionConfig,
}

/// Accelerometer filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MotionConfig {
    /// Ticks closer than this to the previous accepted tick are dropped
    pub min_sample_interval_ms: u64,
    /// Exponential smoothing factor
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub smoothing_alpha: f64,
    /// Samples averaged into the rest offset
    #[validate(range(min = 1))]
    pub calibration_samples: u32,
    /// Samples per emitted moving average
    #[validate(range(min = 1))]
    pub average_window: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_sample_interval_ms: 100,
            smoothing_alpha: 0.2,
            calibration_samples: 50,
            average_window: 10,
        }
    }
}

/// GPS speed estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SpeedConfig {
    pub min_fix_interval_ms: u64,
    /// Fixes with a larger accuracy radius are ignored (m)
    #[validate(range(exclusive_min = 0.0))]
    pub max_accuracy_m: f64,
    /// 120 km/h
    #[validate(range(exclusive_min = 0.0))]
    pub max_plausible_speed_mps: f64,
    #[validate(range(min = 1))]
    pub history_size: usize,
    /// Motion violations are suppressed below this speed
    #[validate(range(min = 0.0))]
    pub min_detection_speed_mps: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            min_fix_interval_ms: 500,
            max_accuracy_m: 20.0,
            max_plausible_speed_mps: 33.33,
            history_size: 3,
            min_detection_speed_mps: 1.0,
        }
    }
}

/// Cabin noise analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NoiseConfig {
    /// Immediate violation above this level (dB)
    pub violation_db: f64,
    /// Sustained-exposure lower bound (dB)
    pub warning_db: f64,
    pub sustained_ms: u64,
    /// Noise has its own cooldown clock
    pub cooldown_ms: u64,
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
    #[validate(range(min = 1))]
    pub buffer_samples: usize,
    /// Consecutive read failures before the capture loop gives up
    #[validate(range(min = 1))]
    pub max_consecutive_failures: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            violation_db: 80.0,
            warning_db: 75.0,
            sustained_ms: 3_000,
            cooldown_ms: 3_000,
            poll_interval_ms: 500,
            buffer_samples: 4_096,
            max_consecutive_failures: 3,
        }
    }
}

/// Motion/speed violation thresholds (before sensitivity scaling)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Longitudinal threshold for hard acceleration (negative, m/s²)
    pub acceleration_threshold: f64,
    /// Longitudinal threshold for hard braking (positive, m/s²)
    pub brake_threshold: f64,
    /// Lateral magnitude threshold for sharp turns (m/s²)
    pub turn_threshold: f64,
    /// Shared by motion and speeding violations
    pub cooldown_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            acceleration_threshold: -3.5,
            brake_threshold: 4.5,
            turn_threshold: 3.0,
            cooldown_ms: 3_000,
        }
    }
}

/// Trip lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    pub route_point_interval_ms: u64,
    /// Shorter trips are discarded
    pub min_trip_ms: u64,
    pub max_trip_ms: u64,
    /// Upper bound on waiting for the audio thread at stop
    pub audio_join_timeout_ms: u64,
    /// Motion/location event queue capacity
    #[validate(range(min = 1))]
    pub event_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            route_point_interval_ms: 2_000,
            min_trip_ms: 30_000,
            max_trip_ms: 24 * 60 * 60 * 1_000,
            audio_join_timeout_ms: 1_000,
            event_queue_capacity: 256,
        }
    }
}
