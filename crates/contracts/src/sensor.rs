//! Raw sensor samples delivered by the motion, location and audio sources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One accelerometer tick in the phone frame (m/s²)
///
/// Transient: produced per sensor tick, consumed immediately, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Sensor timestamp (ms)
    pub timestamp_ms: u64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }
}

/// A location fix from the positioning provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// 纬度 (度)
    pub latitude: f64,
    /// 经度 (度)
    pub longitude: f64,
    /// Fix timestamp (ms)
    pub timestamp_ms: u64,
    /// Horizontal accuracy radius (m)
    pub accuracy_m: f64,
    /// Provider-reported speed (m/s), informational only
    #[serde(default)]
    pub speed_mps: Option<f64>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: u64, accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            accuracy_m,
            speed_mps: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Fixed orientation of the phone relative to the vehicle
///
/// Vehicle frame: X = lateral (turns), Y = longitudinal (accel/brake), Z = vertical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountPosition {
    /// Phone lying flat on the dashboard
    #[default]
    FlatDashboard,
    /// Phone upright in a holder, screen facing the driver
    VerticalUpright,
    /// Phone rotated 90° clockwise in a holder
    SidewaysMounted,
}

impl MountPosition {
    pub const ALL: [MountPosition; 3] = [
        MountPosition::FlatDashboard,
        MountPosition::VerticalUpright,
        MountPosition::SidewaysMounted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MountPosition::FlatDashboard => "flat_dashboard",
            MountPosition::VerticalUpright => "vertical_upright",
            MountPosition::SidewaysMounted => "sideways_mounted",
        }
    }
}

impl fmt::Display for MountPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MountPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        MountPosition::ALL
            .into_iter()
            .find(|mount| mount.as_str() == normalized)
            .ok_or_else(|| format!("unknown mount position: {s}"))
    }
}
