//! AppConfig - Config Loader output
//!
//! Describes a complete DriveSafer setup: trip defaults, detection tuning,
//! trip store routing and an optional scripted drive for simulation.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{DetectionConfig, GeoPoint, MountPosition};

/// Accepted sensitivity multipliers
pub const SENSITIVITY_RANGE: RangeInclusive<f64> = 0.5..=1.5;

/// Accepted speed limits (km/h)
pub const SPEED_LIMIT_RANGE_KMH: RangeInclusive<u32> = 30..=120;

/// Clamp a sensitivity multiplier into [`SENSITIVITY_RANGE`]
pub fn clamp_sensitivity(sensitivity: f64) -> f64 {
    if sensitivity.is_nan() {
        return 1.0;
    }
    sensitivity.clamp(*SENSITIVITY_RANGE.start(), *SENSITIVITY_RANGE.end())
}

/// Clamp a speed limit into [`SPEED_LIMIT_RANGE_KMH`]
pub fn clamp_speed_limit_kmh(kmh: u32) -> u32 {
    kmh.clamp(*SPEED_LIMIT_RANGE_KMH.start(), *SPEED_LIMIT_RANGE_KMH.end())
}

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Defaults applied when a trip starts
    #[serde(default)]
    #[validate(nested)]
    pub trip: TripDefaults,

    /// Detection tuning
    #[serde(default)]
    #[validate(nested)]
    pub detection: DetectionConfig,

    /// Where finalized trips go
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scripted drive used by the mock sources
    #[serde(default)]
    pub simulation: Option<DriveScript>,
}

/// Trip start parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TripDefaults {
    pub mount: MountPosition,

    #[validate(range(min = 0.5, max = 1.5))]
    pub sensitivity: f64,

    #[validate(range(min = 30, max = 120))]
    pub speed_limit_kmh: u32,
}

impl Default for TripDefaults {
    fn default() -> Self {
        Self {
            mount: MountPosition::FlatDashboard,
            sensitivity: 1.0,
            speed_limit_kmh: 50,
        }
    }
}

/// Trip store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store name
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Store type
    #[serde(default)]
    pub store_type: StoreType,

    /// Recorder queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            store_type: StoreType::default(),
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

fn default_store_name() -> String {
    "trips".to_string()
}

fn default_queue_capacity() -> usize {
    16
}

/// Store type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Log every insert
    #[default]
    Log,
    /// One directory per trip with JSON files
    File,
    /// In-process map, lost on exit
    Memory,
}

/// A scripted drive replayed by the mock sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveScript {
    /// Accelerometer rate (Hz)
    #[serde(default = "default_motion_hz")]
    pub motion_hz: f64,

    /// Location fix rate (Hz)
    #[serde(default = "default_location_hz")]
    pub location_hz: f64,

    /// Starting point of the drive
    pub origin: GeoPoint,

    /// Heading in degrees clockwise from north
    #[serde(default)]
    pub heading_deg: f64,

    /// Steady cruising speed (m/s)
    #[serde(default = "default_cruise_speed")]
    pub cruise_speed_mps: f64,

    /// Accuracy radius reported on every fix (m)
    #[serde(default = "default_fix_accuracy")]
    pub fix_accuracy_m: f64,

    /// Cabin level between maneuvers (dB)
    #[serde(default = "default_ambient_db")]
    pub ambient_db: f64,

    /// Gravity-like bias present on the raw accelerometer axes (phone frame)
    #[serde(default)]
    pub rest_bias: [f64; 3],

    /// Maneuvers, offsets relative to the start of the drive
    #[serde(default)]
    pub maneuvers: Vec<Maneuver>,
}

impl Default for DriveScript {
    /// About a minute of cruising with one of each maneuver
    fn default() -> Self {
        Self {
            motion_hz: default_motion_hz(),
            location_hz: default_location_hz(),
            origin: GeoPoint {
                latitude: 51.5007,
                longitude: -0.1246,
            },
            heading_deg: 0.0,
            cruise_speed_mps: default_cruise_speed(),
            fix_accuracy_m: default_fix_accuracy(),
            ambient_db: default_ambient_db(),
            rest_bias: [0.0, 0.0, 9.81],
            maneuvers: vec![
                Maneuver {
                    kind: ManeuverKind::HardAcceleration,
                    start_ms: 12_000,
                    duration_ms: 2_000,
                    intensity: 5.0,
                },
                Maneuver {
                    kind: ManeuverKind::HardBrake,
                    start_ms: 20_000,
                    duration_ms: 2_000,
                    intensity: 6.0,
                },
                Maneuver {
                    kind: ManeuverKind::SharpTurn,
                    start_ms: 28_000,
                    duration_ms: 2_000,
                    intensity: 4.5,
                },
                Maneuver {
                    kind: ManeuverKind::LoudCabin,
                    start_ms: 34_000,
                    duration_ms: 4_000,
                    intensity: 78.0,
                },
                Maneuver {
                    kind: ManeuverKind::Speeding,
                    start_ms: 40_000,
                    duration_ms: 8_000,
                    intensity: 17.0,
                },
            ],
        }
    }
}

fn default_motion_hz() -> f64 {
    20.0
}

fn default_location_hz() -> f64 {
    1.0
}

fn default_cruise_speed() -> f64 {
    11.0
}

fn default_fix_accuracy() -> f64 {
    5.0
}

fn default_ambient_db() -> f64 {
    60.0
}

/// One scripted maneuver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub kind: ManeuverKind,
    /// Offset from drive start (ms)
    pub start_ms: u64,
    pub duration_ms: u64,
    /// Peak vehicle-frame acceleration (m/s²), speed (m/s) or level (dB)
    pub intensity: f64,
}

impl Maneuver {
    pub fn is_active(&self, offset_ms: u64) -> bool {
        offset_ms >= self.start_ms && offset_ms < self.start_ms + self.duration_ms
    }
}

/// Scripted maneuver kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    HardAcceleration,
    HardBrake,
    SharpTurn,
    Speeding,
    LoudCabin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_sensitivity() {
        assert_eq!(clamp_sensitivity(0.1), 0.5);
        assert_eq!(clamp_sensitivity(2.0), 1.5);
        assert_eq!(clamp_sensitivity(1.2), 1.2);
        assert_eq!(clamp_sensitivity(f64::NAN), 1.0);
    }

    #[test]
    fn test_clamp_speed_limit() {
        assert_eq!(clamp_speed_limit_kmh(10), 30);
        assert_eq!(clamp_speed_limit_kmh(200), 120);
        assert_eq!(clamp_speed_limit_kmh(80), 80);
    }

    #[test]
    fn test_trip_defaults_range_validation() {
        let defaults = TripDefaults {
            sensitivity: 3.0,
            ..Default::default()
        };
        assert!(defaults.validate().is_err());
        assert!(TripDefaults::default().validate().is_ok());
    }

    #[test]
    fn test_maneuver_window() {
        let maneuver = Maneuver {
            kind: ManeuverKind::HardBrake,
            start_ms: 1_000,
            duration_ms: 500,
            intensity: 6.0,
        };
        assert!(!maneuver.is_active(999));
        assert!(maneuver.is_active(1_000));
        assert!(maneuver.is_active(1_499));
        assert!(!maneuver.is_active(1_500));
    }

    #[test]
    fn test_default_script_has_every_maneuver() {
        let script = DriveScript::default();
        for kind in [
            ManeuverKind::HardAcceleration,
            ManeuverKind::HardBrake,
            ManeuverKind::SharpTurn,
            ManeuverKind::Speeding,
            ManeuverKind::LoudCabin,
        ] {
            assert!(script.maneuvers.iter().any(|m| m.kind == kind));
        }
    }

    #[test]
    fn test_app_config_minimal_json() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.trip.speed_limit_kmh, 50);
        assert_eq!(config.storage.store_type, StoreType::Log);
        assert!(config.simulation.is_none());
    }
}
