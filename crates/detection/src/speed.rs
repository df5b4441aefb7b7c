//! GPS speed estimation from successive fixes.

use contracts::{LocationFix, SpeedConfig};
use ringbuf::{traits::*, HeapRb};
use tracing::trace;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two fixes (m)
pub fn haversine_distance_m(a: &LocationFix, b: &LocationFix) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Why a fix did not produce a speed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixRejection {
    /// Arrived before the minimum fix interval elapsed
    TooSoon,
    /// Either fix exceeded the accuracy radius
    LowAccuracy,
    /// Implied speed negative, non-finite or above the plausible maximum
    Implausible,
}

impl FixRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixRejection::TooSoon => "too_soon",
            FixRejection::LowAccuracy => "low_accuracy",
            FixRejection::Implausible => "implausible",
        }
    }
}

/// Result of feeding one fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// First fix of the trip, nothing to compare against
    Initial,
    /// New smoothed speed (m/s)
    Accepted { speed_mps: f64 },
    Rejected(FixRejection),
}

impl FixOutcome {
    /// Smoothed speed when accepted
    pub fn speed(&self) -> Option<f64> {
        match self {
            FixOutcome::Accepted { speed_mps } => Some(*speed_mps),
            _ => None,
        }
    }
}

/// Smoothed speed over the last few accepted fixes
pub struct SpeedEstimator {
    config: SpeedConfig,
    last_fix: Option<LocationFix>,
    history: HeapRb<f64>,
    current_mps: f64,
}

impl SpeedEstimator {
    pub fn new(config: SpeedConfig) -> Self {
        let history = HeapRb::new(config.history_size.max(1));
        Self {
            config,
            last_fix: None,
            history,
            current_mps: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.last_fix = None;
        self.history.pop_iter().for_each(drop);
        self.current_mps = 0.0;
    }

    /// Feed one fix
    ///
    /// The reference fix advances on every call, accepted or not.
    pub fn ingest(&mut self, fix: &LocationFix) -> FixOutcome {
        let Some(previous) = self.last_fix.replace(*fix) else {
            return FixOutcome::Initial;
        };

        let outcome = self.evaluate(&previous, fix);
        trace!(
            timestamp_ms = fix.timestamp_ms,
            accuracy_m = fix.accuracy_m,
            outcome = ?outcome,
            "location fix evaluated"
        );
        outcome
    }

    fn evaluate(&mut self, previous: &LocationFix, fix: &LocationFix) -> FixOutcome {
        let elapsed_ms = fix.timestamp_ms.saturating_sub(previous.timestamp_ms);
        if elapsed_ms < self.config.min_fix_interval_ms || elapsed_ms == 0 {
            return FixOutcome::Rejected(FixRejection::TooSoon);
        }

        if previous.accuracy_m > self.config.max_accuracy_m
            || fix.accuracy_m > self.config.max_accuracy_m
        {
            return FixOutcome::Rejected(FixRejection::LowAccuracy);
        }

        let speed = haversine_distance_m(previous, fix) / (elapsed_ms as f64 / 1000.0);
        if !speed.is_finite() || speed < 0.0 || speed > self.config.max_plausible_speed_mps {
            return FixOutcome::Rejected(FixRejection::Implausible);
        }

        self.history.push_overwrite(speed);
        let count = self.history.occupied_len();
        self.current_mps = self.history.iter().sum::<f64>() / count as f64;

        FixOutcome::Accepted {
            speed_mps: self.current_mps,
        }
    }

    /// Smoothed speed, 0 until the first accepted fix
    pub fn current_speed(&self) -> f64 {
        self.current_mps
    }

    pub fn last_fix(&self) -> Option<&LocationFix> {
        self.last_fix.as_ref()
    }
}
