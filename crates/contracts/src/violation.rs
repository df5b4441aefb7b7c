//! Violation events and per-kind counters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// Kind of unsafe driving event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Acceleration,
    Brake,
    Turn,
    Speeding,
    Noise,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::Acceleration,
        ViolationKind::Brake,
        ViolationKind::Turn,
        ViolationKind::Speeding,
        ViolationKind::Noise,
    ];

    /// Score penalty applied when this violation is recorded
    pub fn penalty(&self) -> u32 {
        match self {
            ViolationKind::Acceleration => 5,
            ViolationKind::Brake => 5,
            ViolationKind::Turn => 3,
            ViolationKind::Speeding => 8,
            ViolationKind::Noise => 4,
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::Acceleration => "Acceleration",
            ViolationKind::Brake => "Brake",
            ViolationKind::Turn => "Turn",
            ViolationKind::Speeding => "Speeding",
            ViolationKind::Noise => "Noise",
        }
    }

    /// Map marker color (ARGB)
    pub fn marker_color(&self) -> u32 {
        match self {
            ViolationKind::Acceleration => 0xFF2196F3,
            ViolationKind::Brake => 0xFFF44336,
            ViolationKind::Turn => 0xFF4CAF50,
            ViolationKind::Speeding => 0xFFFF9800,
            ViolationKind::Noise => 0xFF9C27B0,
        }
    }

    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Acceleration => "acceleration",
            ViolationKind::Brake => "brake",
            ViolationKind::Turn => "turn",
            ViolationKind::Speeding => "speeding",
            ViolationKind::Noise => "noise",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A discrete violation firing
///
/// Immutable once created. Buffered by the trip session until finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    /// Triggering magnitude: |y| for accel/brake, |x| for turn,
    /// speed (m/s) for speeding, dB for noise
    pub severity: f64,
    /// Smoothed speed at the time of the event (m/s)
    pub speed_mps: f64,
    /// Last known location, if any fix arrived yet
    pub location: Option<GeoPoint>,
    pub timestamp_ms: u64,
}

/// Per-kind violation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub acceleration: u32,
    pub brake: u32,
    pub turn: u32,
    pub speeding: u32,
    pub noise: u32,
}

impl ViolationCounts {
    pub fn get(&self, kind: ViolationKind) -> u32 {
        match kind {
            ViolationKind::Acceleration => self.acceleration,
            ViolationKind::Brake => self.brake,
            ViolationKind::Turn => self.turn,
            ViolationKind::Speeding => self.speeding,
            ViolationKind::Noise => self.noise,
        }
    }

    pub fn increment(&mut self, kind: ViolationKind) {
        let slot = match kind {
            ViolationKind::Acceleration => &mut self.acceleration,
            ViolationKind::Brake => &mut self.brake,
            ViolationKind::Turn => &mut self.turn,
            ViolationKind::Speeding => &mut self.speeding,
            ViolationKind::Noise => &mut self.noise,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        ViolationKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalties() {
        let penalties: Vec<u32> = ViolationKind::ALL.iter().map(|k| k.penalty()).collect();
        assert_eq!(penalties, vec![5, 5, 3, 8, 4]);
    }

    #[test]
    fn test_counts_increment_and_total() {
        let mut counts = ViolationCounts::default();
        counts.increment(ViolationKind::Brake);
        counts.increment(ViolationKind::Brake);
        counts.increment(ViolationKind::Noise);

        assert_eq!(counts.get(ViolationKind::Brake), 2);
        assert_eq!(counts.get(ViolationKind::Noise), 1);
        assert_eq!(counts.get(ViolationKind::Turn), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_kind_display_uses_label() {
        assert_eq!(ViolationKind::Speeding.to_string(), "Speeding");
        assert_eq!(ViolationKind::Speeding.as_str(), "speeding");
    }
}
