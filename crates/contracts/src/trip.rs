//! Trip records handed from the trip session to the store.

use serde::{Deserialize, Serialize};

use crate::{ViolationCounts, ViolationEvent};

/// Identifier assigned by the store on summary insert
pub type TripId = u64;

/// Maximum length of user notes attached to a trip
pub const MAX_NOTES_LEN: usize = 500;

/// GPS breadcrumb recorded during an active trip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: u64,
    /// Smoothed speed when the point was recorded (m/s)
    pub speed_mps: f64,
    /// Accuracy radius of the underlying fix (m)
    pub accuracy_m: f64,
}

/// Trip summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    /// Assigned by the store, `None` until persisted
    #[serde(default)]
    pub id: Option<TripId>,
    /// Local calendar date of the trip start (YYYY-MM-DD)
    pub date: String,
    /// Local start time (HH:MM:SS)
    pub start_time: String,
    /// Local end time (HH:MM:SS)
    pub end_time: String,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: u64,
    pub final_score: u32,
    pub counts: ViolationCounts,
    #[serde(default)]
    pub notes: String,
}

impl TripSummary {
    /// Duration rendered as `1h 2m 3s`, `2m 3s` or `3s`
    pub fn formatted_duration(&self) -> String {
        let hours = self.duration_ms / 3_600_000;
        let minutes = (self.duration_ms % 3_600_000) / 60_000;
        let seconds = (self.duration_ms % 60_000) / 1_000;

        if hours > 0 {
            format!("{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }

    pub fn with_id(mut self, id: TripId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Summary plus the detail rows buffered during the trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedTrip {
    pub summary: TripSummary,
    pub route_points: Vec<RoutePoint>,
    pub violations: Vec<ViolationEvent>,
}

/// Trim user notes and cap them at [`MAX_NOTES_LEN`] characters
pub fn normalize_notes(notes: &str) -> String {
    notes
        .chars()
        .take(MAX_NOTES_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}
