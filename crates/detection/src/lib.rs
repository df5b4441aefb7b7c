//! # Detection
//!
//! Real-time signal processing and violation detection.
//!
//! 负责：
//! - Accelerometer axis correction, smoothing, calibration and averaging
//! - GPS speed estimation with outlier rejection
//! - Cabin noise level estimation and sustained-exposure tracking
//! - Threshold classification behind a shared cooldown
//! - Bounded safety score bookkeeping
//!
//! Components are synchronous and never read a clock: callers pass `now_ms`.
//!
//! ## 使用示例
//!
//! ```ignore
//! use detection::{MotionFilter, ViolationClassifier};
//!
//! let mut filter = MotionFilter::new(config.motion.clone());
//! let mut classifier =
//!     ViolationClassifier::new(config.classifier.clone(), config.speed.min_detection_speed_mps);
//!
//! if let Some(avg) = filter.ingest(&sample, MountPosition::FlatDashboard) {
//!     if let Some(detection) = classifier.classify(&avg, speed, 1.0, now_ms) {
//!         // record it
//!     }
//! }
//! ```

mod classifier;
mod motion_filter;
mod noise;
mod score;
mod speed;

pub use classifier::{Thresholds, ViolationClassifier};
pub use motion_filter::{mount_transform, MotionFilter, Vec3};
pub use noise::{decibels, describe_noise, NoiseAnalyzer};
pub use score::{score_description, ScoreColor, ScoreTracker, INITIAL_SCORE};
pub use speed::{haversine_distance_m, FixOutcome, FixRejection, SpeedEstimator};

use contracts::{GeoPoint, ViolationEvent, ViolationKind};

/// A classifier or analyzer firing, before it is tagged with trip context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: ViolationKind,
    pub severity: f64,
    pub timestamp_ms: u64,
}

impl Detection {
    /// Attach the speed and last known location at the time of firing
    pub fn into_event(self, speed_mps: f64, location: Option<GeoPoint>) -> ViolationEvent {
        ViolationEvent {
            kind: self.kind,
            severity: self.severity,
            speed_mps,
            location,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Convert m/s to km/h
pub fn speed_kmh(speed_mps: f64) -> f64 {
    speed_mps * 3.6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_into_event() {
        let detection = Detection {
            kind: ViolationKind::Turn,
            severity: 3.4,
            timestamp_ms: 42,
        };
        let location = GeoPoint {
            latitude: -6.2,
            longitude: 106.8,
        };

        let event = detection.into_event(12.0, Some(location));
        assert_eq!(event.kind, ViolationKind::Turn);
        assert_eq!(event.speed_mps, 12.0);
        assert_eq!(event.location, Some(location));
        assert_eq!(event.timestamp_ms, 42);
    }

    #[test]
    fn test_speed_kmh() {
        assert!((speed_kmh(10.0) - 36.0).abs() < 1e-9);
    }
}
