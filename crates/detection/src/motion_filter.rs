//! Accelerometer pipeline: throttle, axis remap, smoothing, calibration, averaging.

use contracts::{MotionConfig, MotionSample, MountPosition};
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, instrument};

/// Vehicle-frame vector (X lateral, Y longitudinal, Z vertical)
pub type Vec3 = Vector3<f64>;

/// Linear map from phone axes to vehicle axes for a mount position
pub fn mount_transform(mount: MountPosition) -> Matrix3<f64> {
    match mount {
        MountPosition::FlatDashboard => Matrix3::identity(),
        // (x, -z, y)
        MountPosition::VerticalUpright => {
            Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0)
        }
        // (y, -x, z)
        MountPosition::SidewaysMounted => {
            Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0)
        }
    }
}

/// Per-trip accelerometer filter state
///
/// Emits nothing until calibration completes, then one averaged vector per
/// `average_window` accepted samples.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    config: MotionConfig,
    last_accepted_ms: Option<u64>,
    throttled: u64,
    /// Exponential filter state, seeded by the first accepted sample
    filtered: Option<Vec3>,
    calibration_sum: Vec3,
    calibration_count: u32,
    offset: Option<Vec3>,
    window_sum: Vec3,
    window_count: u32,
    last_calibrated: Option<Vec3>,
}

impl MotionFilter {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            last_accepted_ms: None,
            throttled: 0,
            filtered: None,
            calibration_sum: Vec3::zeros(),
            calibration_count: 0,
            offset: None,
            window_sum: Vec3::zeros(),
            window_count: 0,
            last_calibrated: None,
        }
    }

    /// Forget calibration and all accumulated state (trip start)
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Push one raw tick
    ///
    /// Returns `Some(average)` when a moving-average window completes.
    #[instrument(
        level = "trace",
        name = "motion_filter_ingest",
        skip(self, sample),
        fields(timestamp_ms = sample.timestamp_ms)
    )]
    pub fn ingest(&mut self, sample: &MotionSample, mount: MountPosition) -> Option<Vec3> {
        if let Some(last) = self.last_accepted_ms {
            if sample.timestamp_ms.saturating_sub(last) < self.config.min_sample_interval_ms {
                self.throttled += 1;
                return None;
            }
        }
        self.last_accepted_ms = Some(sample.timestamp_ms);

        let raw = mount_transform(mount) * Vec3::new(sample.x, sample.y, sample.z);
        let filtered = match self.filtered {
            Some(previous) => previous + (raw - previous) * self.config.smoothing_alpha,
            None => raw,
        };
        self.filtered = Some(filtered);

        let Some(offset) = self.offset else {
            self.accumulate_calibration(filtered);
            return None;
        };

        let calibrated = filtered - offset;
        self.last_calibrated = Some(calibrated);
        self.window_sum += calibrated;
        self.window_count += 1;

        if self.window_count < self.config.average_window {
            return None;
        }

        let average = self.window_sum / f64::from(self.window_count);
        self.window_sum = Vec3::zeros();
        self.window_count = 0;
        Some(average)
    }

    fn accumulate_calibration(&mut self, filtered: Vec3) {
        self.calibration_sum += filtered;
        self.calibration_count += 1;

        if self.calibration_count >= self.config.calibration_samples {
            let offset = self.calibration_sum / f64::from(self.calibration_count);
            self.offset = Some(offset);
            debug!(
                samples = self.calibration_count,
                offset_x = offset.x,
                offset_y = offset.y,
                offset_z = offset.z,
                "motion calibration complete"
            );
        }
    }

    /// Ticks dropped by the rate limit since the last reset
    pub fn throttled_count(&self) -> u64 {
        self.throttled
    }

    pub fn is_calibrated(&self) -> bool {
        self.offset.is_some()
    }

    /// Rest offsets, once calibrated
    pub fn offset(&self) -> Option<Vec3> {
        self.offset
    }

    /// Most recent calibrated (offset-corrected) sample
    pub fn last_calibrated(&self) -> Option<Vec3> {
        self.last_calibrated
    }

    /// (collected, required) calibration samples
    pub fn calibration_progress(&self) -> (u32, u32) {
        (
            self.calibration_count.min(self.config.calibration_samples),
            self.config.calibration_samples,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, z: f64, timestamp_ms: u64) -> MotionSample {
        MotionSample::new(x, y, z, timestamp_ms)
    }

    fn small_config(calibration_samples: u32, average_window: u32) -> MotionConfig {
        MotionConfig {
            calibration_samples,
            average_window,
            ..Default::default()
        }
    }

    #[test]
    fn test_sideways_transform() {
        let out = mount_transform(MountPosition::SidewaysMounted) * Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(out, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_vertical_transform() {
        let out = mount_transform(MountPosition::VerticalUpright) * Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(out, Vec3::new(1.0, -3.0, 2.0));
    }

    #[test]
    fn test_flat_transform_is_identity() {
        let v = Vec3::new(0.5, -1.5, 9.8);
        assert_eq!(mount_transform(MountPosition::FlatDashboard) * v, v);
    }

    #[test]
    fn test_calibration_constant_samples() {
        let mut filter = MotionFilter::new(MotionConfig {
            average_window: 1,
            ..Default::default()
        });

        for i in 0..50 {
            let out = filter.ingest(&sample(1.0, 2.0, 3.0, i * 100), MountPosition::FlatDashboard);
            assert!(out.is_none(), "no output while calibrating");
        }

        assert!(filter.is_calibrated());
        let offset = filter.offset().unwrap();
        assert!((offset - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-12);

        let out = filter
            .ingest(&sample(1.0, 2.0, 3.0, 5_000), MountPosition::FlatDashboard)
            .unwrap();
        assert!(out.norm() < 1e-12);
        assert!(filter.last_calibrated().unwrap().norm() < 1e-12);
    }

    #[test]
    fn test_throttle_drops_fast_ticks() {
        let mut filter = MotionFilter::new(small_config(3, 1));

        filter.ingest(&sample(0.0, 0.0, 0.0, 0), MountPosition::FlatDashboard);
        filter.ingest(&sample(0.0, 0.0, 0.0, 50), MountPosition::FlatDashboard);
        filter.ingest(&sample(0.0, 0.0, 0.0, 99), MountPosition::FlatDashboard);
        assert_eq!(filter.calibration_progress(), (1, 3));
        assert_eq!(filter.throttled_count(), 2);

        filter.ingest(&sample(0.0, 0.0, 0.0, 100), MountPosition::FlatDashboard);
        assert_eq!(filter.calibration_progress(), (2, 3));
    }

    #[test]
    fn test_smoothing_applies_alpha() {
        let mut filter = MotionFilter::new(small_config(1, 1));

        // Seeds the filter at zero and completes calibration with offset zero
        filter.ingest(&sample(0.0, 0.0, 0.0, 0), MountPosition::FlatDashboard);

        let out = filter
            .ingest(&sample(0.0, 10.0, 0.0, 100), MountPosition::FlatDashboard)
            .unwrap();
        assert!((out.y - 2.0).abs() < 1e-12);

        let out = filter
            .ingest(&sample(0.0, 10.0, 0.0, 200), MountPosition::FlatDashboard)
            .unwrap();
        assert!((out.y - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_emits_once_per_window() {
        let mut filter = MotionFilter::new(MotionConfig {
            smoothing_alpha: 1.0,
            calibration_samples: 1,
            average_window: 4,
            ..Default::default()
        });
        filter.ingest(&sample(0.0, 0.0, 0.0, 0), MountPosition::FlatDashboard);

        let mut outputs = Vec::new();
        for (i, y) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0].iter().enumerate() {
            if let Some(avg) = filter.ingest(
                &sample(0.0, *y, 0.0, (i as u64 + 1) * 100),
                MountPosition::FlatDashboard,
            ) {
                outputs.push(avg.y);
            }
        }

        assert_eq!(outputs.len(), 2);
        assert!((outputs[0] - 2.5).abs() < 1e-12);
        assert!((outputs[1] - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_calibration() {
        let mut filter = MotionFilter::new(small_config(1, 1));
        filter.ingest(&sample(1.0, 1.0, 1.0, 0), MountPosition::FlatDashboard);
        assert!(filter.is_calibrated());

        filter.reset();
        assert!(!filter.is_calibrated());
        assert!(filter.last_calibrated().is_none());
        assert_eq!(filter.calibration_progress(), (0, 1));
    }
}
