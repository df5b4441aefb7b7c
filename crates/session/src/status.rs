//! Observable session state

use std::fmt;

use contracts::{MountPosition, ViolationCounts, ViolationEvent};
use detection::{score_description, ScoreColor, INITIAL_SCORE};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
    /// Stop requested, trip being assembled
    Finalizing,
}

/// Location subsystem status shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocationStatus {
    /// Trip started, no fix yet
    Checking,
    /// Last fix had usable accuracy
    Active,
    /// No location source attached
    Unavailable,
    /// Last fix was outside the accuracy bound
    LowAccuracy,
    /// Trip over
    #[default]
    Stopped,
}

impl LocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationStatus::Checking => "Checking...",
            LocationStatus::Active => "GPS Active",
            LocationStatus::Unavailable => "Location Unavailable",
            LocationStatus::LowAccuracy => "Low GPS Accuracy",
            LocationStatus::Stopped => "GPS Stopped",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings applied to the running (or next) trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripSettings {
    pub mount: MountPosition,
    /// Threshold divisor, always within [0.5, 1.5]
    pub sensitivity: f64,
    /// Always within [30, 120]
    pub speed_limit_kmh: u32,
}

impl TripSettings {
    /// Clamp user input into the supported ranges
    pub fn new(mount: MountPosition, sensitivity: f64, speed_limit_kmh: u32) -> Self {
        Self {
            mount,
            sensitivity: contracts::clamp_sensitivity(sensitivity),
            speed_limit_kmh: contracts::clamp_speed_limit_kmh(speed_limit_kmh),
        }
    }
}

impl Default for TripSettings {
    fn default() -> Self {
        Self::new(MountPosition::default(), 1.0, 50)
    }
}

/// Snapshot published on every observable change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub score: u32,
    pub counts: ViolationCounts,
    pub location_status: LocationStatus,
    /// Smoothed speed (m/s)
    pub speed_mps: f64,
    /// Last measured level, 0 when noise detection is off
    pub noise_db: f64,
    pub noise_active: bool,
    pub calibrated: bool,
    pub settings: TripSettings,
    /// Last user-facing error, cleared by the caller
    pub error: Option<String>,
    /// Most recent violation of the current (or last) trip
    pub last_violation: Option<ViolationEvent>,
    /// Fixes discarded by the speed estimator this trip
    pub rejected_fixes: u64,
}

impl SessionStatus {
    pub fn is_tracking(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn score_description(&self) -> &'static str {
        score_description(self.score)
    }

    pub fn score_color(&self) -> ScoreColor {
        ScoreColor::for_score(self.score)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            score: INITIAL_SCORE,
            counts: ViolationCounts::default(),
            location_status: LocationStatus::default(),
            speed_mps: 0.0,
            noise_db: 0.0,
            noise_active: false,
            calibrated: false,
            settings: TripSettings::default(),
            error: None,
            last_violation: None,
            rejected_fixes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_are_clamped() {
        let settings = TripSettings::new(MountPosition::VerticalUpright, 3.0, 10);
        assert_eq!(settings.sensitivity, 1.5);
        assert_eq!(settings.speed_limit_kmh, 30);

        let settings = TripSettings::new(MountPosition::FlatDashboard, 0.1, 200);
        assert_eq!(settings.sensitivity, 0.5);
        assert_eq!(settings.speed_limit_kmh, 120);
    }

    #[test]
    fn test_location_status_strings() {
        assert_eq!(LocationStatus::Checking.to_string(), "Checking...");
        assert_eq!(LocationStatus::LowAccuracy.as_str(), "Low GPS Accuracy");
        assert_eq!(SessionStatus::default().location_status.as_str(), "GPS Stopped");
    }

    #[test]
    fn test_default_status_is_idle_with_full_score() {
        let status = SessionStatus::default();
        assert!(!status.is_tracking());
        assert_eq!(status.score, 100);
        assert_eq!(status.score_description(), "Excellent");
        assert_eq!(status.score_color(), ScoreColor::Green);
    }
}
