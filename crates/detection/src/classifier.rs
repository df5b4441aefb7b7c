//! Motion and speeding classification behind one shared cooldown.

use contracts::{clamp_sensitivity, ClassifierConfig, ViolationKind};
use tracing::debug;

use crate::{Detection, Vec3};

/// Effective thresholds after sensitivity scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub acceleration: f64,
    pub brake: f64,
    pub turn: f64,
}

/// Threshold classifier for averaged motion vectors and speed
///
/// Motion and speeding violations share `last_violation_ms`.
#[derive(Debug, Clone)]
pub struct ViolationClassifier {
    config: ClassifierConfig,
    min_detection_speed_mps: f64,
    last_violation_ms: Option<u64>,
}

impl ViolationClassifier {
    pub fn new(config: ClassifierConfig, min_detection_speed_mps: f64) -> Self {
        Self {
            config,
            min_detection_speed_mps,
            last_violation_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_violation_ms = None;
    }

    /// Base thresholds divided by the (clamped) sensitivity multiplier
    pub fn thresholds(&self, sensitivity: f64) -> Thresholds {
        let sensitivity = clamp_sensitivity(sensitivity);
        Thresholds {
            acceleration: self.config.acceleration_threshold / sensitivity,
            brake: self.config.brake_threshold / sensitivity,
            turn: self.config.turn_threshold / sensitivity,
        }
    }

    pub fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        match self.last_violation_ms {
            Some(last) => now_ms.saturating_sub(last) > self.config.cooldown_ms,
            None => true,
        }
    }

    pub fn last_violation_ms(&self) -> Option<u64> {
        self.last_violation_ms
    }

    /// Classify one averaged vehicle-frame vector
    ///
    /// Acceleration, then brake, then turn. First match wins.
    pub fn classify(
        &mut self,
        avg: &Vec3,
        speed_mps: f64,
        sensitivity: f64,
        now_ms: u64,
    ) -> Option<Detection> {
        if speed_mps < self.min_detection_speed_mps || !self.cooldown_elapsed(now_ms) {
            return None;
        }

        let t = self.thresholds(sensitivity);
        let (kind, severity) = if avg.y < t.acceleration {
            (ViolationKind::Acceleration, avg.y.abs())
        } else if avg.y > t.brake {
            (ViolationKind::Brake, avg.y.abs())
        } else if avg.x.abs() > t.turn {
            (ViolationKind::Turn, avg.x.abs())
        } else {
            return None;
        };

        Some(self.fire(kind, severity, now_ms))
    }

    /// Speeding check against a limit in km/h
    pub fn check_speed(&mut self, speed_mps: f64, limit_kmh: u32, now_ms: u64) -> Option<Detection> {
        let limit_mps = f64::from(limit_kmh) / 3.6;
        if speed_mps <= limit_mps || !self.cooldown_elapsed(now_ms) {
            return None;
        }
        Some(self.fire(ViolationKind::Speeding, speed_mps, now_ms))
    }

    fn fire(&mut self, kind: ViolationKind, severity: f64, now_ms: u64) -> Detection {
        self.last_violation_ms = Some(now_ms);
        debug!(kind = kind.as_str(), severity, now_ms, "violation classified");
        Detection {
            kind,
            severity,
            timestamp_ms: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ViolationClassifier {
        ViolationClassifier::new(ClassifierConfig::default(), 1.0)
    }

    #[test]
    fn test_hard_acceleration() {
        let mut c = classifier();
        let d = c.classify(&Vec3::new(0.0, -4.0, 0.0), 10.0, 1.0, 0).unwrap();
        assert_eq!(d.kind, ViolationKind::Acceleration);
        assert_eq!(d.severity, 4.0);
    }

    #[test]
    fn test_brake_wins_over_turn() {
        let mut c = classifier();
        let d = c.classify(&Vec3::new(5.0, 5.0, 0.0), 10.0, 1.0, 0).unwrap();
        assert_eq!(d.kind, ViolationKind::Brake);
    }

    #[test]
    fn test_turn_uses_lateral_magnitude() {
        let mut c = classifier();
        let d = c.classify(&Vec3::new(-3.2, 0.0, 0.0), 10.0, 1.0, 0).unwrap();
        assert_eq!(d.kind, ViolationKind::Turn);
        assert!((d.severity - 3.2).abs() < 1e-12);
    }

    #[test]
    fn test_suppressed_while_stationary() {
        let mut c = classifier();
        assert!(c.classify(&Vec3::new(0.0, -6.0, 0.0), 0.5, 1.0, 0).is_none());
        assert!(c.last_violation_ms().is_none());
    }

    #[test]
    fn test_shared_cooldown() {
        let accel = Vec3::new(0.0, -4.0, 0.0);

        let mut c = classifier();
        assert!(c.classify(&accel, 10.0, 1.0, 10_000).is_some());
        assert!(c.classify(&accel, 10.0, 1.0, 11_000).is_none());

        let mut c = classifier();
        assert!(c.classify(&accel, 10.0, 1.0, 10_000).is_some());
        assert!(c.classify(&accel, 10.0, 1.0, 13_500).is_some());
    }

    #[test]
    fn test_speeding_shares_motion_cooldown() {
        let mut c = classifier();
        assert!(c.classify(&Vec3::new(0.0, 5.0, 0.0), 20.0, 1.0, 0).is_some());
        assert!(c.check_speed(20.0, 50, 1_000).is_none());

        let d = c.check_speed(20.0, 50, 3_001).unwrap();
        assert_eq!(d.kind, ViolationKind::Speeding);
        assert_eq!(d.severity, 20.0);
    }

    #[test]
    fn test_speed_at_limit_is_not_speeding() {
        let mut c = classifier();
        assert!(c.check_speed(50.0 / 3.6, 50, 0).is_none());
    }

    #[test]
    fn test_sensitivity_scales_thresholds() {
        let c = classifier();
        let strict = c.thresholds(1.5);
        assert!((strict.turn - 2.0).abs() < 1e-12);

        let lenient = c.thresholds(0.5);
        assert!((lenient.brake - 9.0).abs() < 1e-12);

        // Out of range values are clamped
        assert_eq!(c.thresholds(5.0), strict);
    }
}
