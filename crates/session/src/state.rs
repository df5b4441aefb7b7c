//! Detection state shared by the sensor dispatcher and the audio worker
//!
//! One mutex guards the classifier cooldown, the score and the trip buffers.
//! Nothing blocking runs while it is held.

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    DetectionConfig, GeoPoint, LocationFix, MotionSample, RoutePoint, ViolationCounts,
    ViolationEvent,
};
use detection::{
    Detection, FixOutcome, MotionFilter, ScoreTracker, SpeedEstimator, ViolationClassifier,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::status::{LocationStatus, SessionPhase, SessionStatus, TripSettings};

/// Buffers handed over when a trip stops
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedTrip {
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub score: u32,
    pub counts: ViolationCounts,
    pub route_points: Vec<RoutePoint>,
    pub violations: Vec<ViolationEvent>,
}

impl FinishedTrip {
    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Per-trip detection pipeline plus everything observable about it
pub struct DetectionState {
    filter: MotionFilter,
    speed: SpeedEstimator,
    classifier: ViolationClassifier,
    score: ScoreTracker,
    route_point_interval_ms: u64,
    max_accuracy_m: f64,

    settings: TripSettings,
    phase: SessionPhase,
    location_status: LocationStatus,
    noise_db: f64,
    noise_active: bool,
    error: Option<String>,
    last_violation: Option<ViolationEvent>,
    rejected_fixes: u64,

    started_at_ms: Option<u64>,
    route_points: Vec<RoutePoint>,
    violations: Vec<ViolationEvent>,
    last_route_point_ms: Option<u64>,
}

impl DetectionState {
    pub fn new(config: &DetectionConfig, settings: TripSettings) -> Self {
        Self {
            filter: MotionFilter::new(config.motion.clone()),
            speed: SpeedEstimator::new(config.speed.clone()),
            classifier: ViolationClassifier::new(
                config.classifier.clone(),
                config.speed.min_detection_speed_mps,
            ),
            score: ScoreTracker::new(),
            route_point_interval_ms: config.session.route_point_interval_ms,
            max_accuracy_m: config.speed.max_accuracy_m,
            settings,
            phase: SessionPhase::Idle,
            location_status: LocationStatus::Stopped,
            noise_db: 0.0,
            noise_active: false,
            error: None,
            last_violation: None,
            rejected_fixes: 0,
            started_at_ms: None,
            route_points: Vec::new(),
            violations: Vec::new(),
            last_route_point_ms: None,
        }
    }

    /// Idle -> Active: reset every detector and clear the buffers
    pub fn begin_trip(&mut self, settings: TripSettings, now_ms: u64, has_location: bool) {
        self.filter.reset();
        self.speed.reset();
        self.classifier.reset();
        self.score.reset();

        self.settings = settings;
        self.phase = SessionPhase::Active;
        self.location_status = if has_location {
            LocationStatus::Checking
        } else {
            LocationStatus::Unavailable
        };
        self.noise_db = 0.0;
        self.noise_active = false;
        self.error = None;
        self.last_violation = None;
        self.rejected_fixes = 0;

        self.started_at_ms = Some(now_ms);
        self.route_points.clear();
        self.violations.clear();
        self.last_route_point_ms = None;
    }

    /// Active -> Finalizing: take the buffers
    ///
    /// Score and counts stay readable until the next trip starts.
    pub fn finish(&mut self, now_ms: u64) -> Option<FinishedTrip> {
        let started_at_ms = self.started_at_ms.take()?;
        self.phase = SessionPhase::Finalizing;
        self.location_status = LocationStatus::Stopped;
        self.noise_active = false;
        self.last_route_point_ms = None;

        Some(FinishedTrip {
            started_at_ms,
            ended_at_ms: now_ms.max(started_at_ms),
            score: self.score.score(),
            counts: self.score.counts(),
            route_points: std::mem::take(&mut self.route_points),
            violations: std::mem::take(&mut self.violations),
        })
    }

    /// Finalizing -> Idle
    pub fn end_trip(&mut self, error: Option<String>) {
        self.phase = SessionPhase::Idle;
        if error.is_some() {
            self.error = error;
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Filter one motion tick and classify completed windows
    pub fn on_motion(&mut self, sample: &MotionSample, now_ms: u64) -> Option<ViolationEvent> {
        if !self.is_active() {
            return None;
        }

        let average = self.filter.ingest(sample, self.settings.mount)?;
        let detection = self.classifier.classify(
            &average,
            self.speed.current_speed(),
            self.settings.sensitivity,
            now_ms,
        )?;
        Some(self.record(detection))
    }

    /// Update speed, route and speeding state from one fix
    pub fn on_location(
        &mut self,
        fix: &LocationFix,
        now_ms: u64,
    ) -> Option<(FixOutcome, Option<ViolationEvent>)> {
        if !self.is_active() {
            return None;
        }

        self.location_status = if fix.accuracy_m > self.max_accuracy_m {
            LocationStatus::LowAccuracy
        } else {
            LocationStatus::Active
        };

        let outcome = self.speed.ingest(fix);
        if matches!(outcome, FixOutcome::Rejected(_)) {
            self.rejected_fixes += 1;
        }
        let mut violation = None;
        if let Some(speed_mps) = outcome.speed() {
            if let Some(detection) =
                self.classifier
                    .check_speed(speed_mps, self.settings.speed_limit_kmh, now_ms)
            {
                violation = Some(self.record(detection));
            }
        }

        let due = self
            .last_route_point_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.route_point_interval_ms);
        if due {
            self.route_points.push(RoutePoint {
                latitude: fix.latitude,
                longitude: fix.longitude,
                timestamp_ms: now_ms,
                speed_mps: self.speed.current_speed(),
                accuracy_m: fix.accuracy_m,
            });
            self.last_route_point_ms = Some(now_ms);
        }

        Some((outcome, violation))
    }

    /// Store the latest level and record a noise firing, if any
    pub fn on_noise(&mut self, db: f64, detection: Option<Detection>) -> Option<ViolationEvent> {
        if !self.is_active() {
            return None;
        }
        self.noise_db = db;
        detection.map(|detection| self.record(detection))
    }

    fn record(&mut self, detection: Detection) -> ViolationEvent {
        let event = detection.into_event(self.speed.current_speed(), self.last_location());
        let score = self.score.record(event.kind);
        info!(
            kind = %event.kind,
            severity = event.severity,
            speed_mps = event.speed_mps,
            score,
            "Violation recorded"
        );
        self.violations.push(event.clone());
        self.last_violation = Some(event.clone());
        event
    }

    pub fn last_location(&self) -> Option<GeoPoint> {
        self.speed.last_fix().map(LocationFix::point)
    }

    pub fn set_settings(&mut self, settings: TripSettings) {
        debug!(?settings, "Trip settings updated");
        self.settings = settings;
    }

    pub fn settings(&self) -> TripSettings {
        self.settings
    }

    pub fn set_noise_active(&mut self, active: bool) {
        self.noise_active = active;
        if !active {
            self.noise_db = 0.0;
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Back to a full score outside of a trip
    pub fn reset_score(&mut self) {
        self.score.reset();
        self.last_violation = None;
    }

    pub fn throttled_samples(&self) -> u64 {
        self.filter.throttled_count()
    }

    pub fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            score: self.score.score(),
            counts: self.score.counts(),
            location_status: self.location_status,
            speed_mps: self.speed.current_speed(),
            noise_db: self.noise_db,
            noise_active: self.noise_active,
            calibrated: self.filter.is_calibrated(),
            settings: self.settings,
            error: self.error.clone(),
            last_violation: self.last_violation.clone(),
            rejected_fixes: self.rejected_fixes,
        }
    }
}

/// State plus the channel publishing its snapshots
pub(crate) struct Shared {
    state: Mutex<DetectionState>,
    status: watch::Sender<SessionStatus>,
}

impl Shared {
    pub fn new(state: DetectionState) -> Self {
        let (status, _) = watch::channel(state.snapshot());
        Self {
            state: Mutex::new(state),
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DetectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state and publish a snapshot if anything observable changed
    pub fn update<R>(&self, f: impl FnOnce(&mut DetectionState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        let snapshot = state.snapshot();

        // Published under the lock so snapshots never go backwards
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MotionConfig, MountPosition, ViolationKind};

    /// Calibrates on one tick and averages single ticks
    fn fast_config() -> DetectionConfig {
        DetectionConfig {
            motion: MotionConfig {
                smoothing_alpha: 1.0,
                calibration_samples: 1,
                average_window: 1,
                ..MotionConfig::default()
            },
            ..DetectionConfig::default()
        }
    }

    fn active_state() -> DetectionState {
        let mut state = DetectionState::new(&fast_config(), TripSettings::default());
        state.begin_trip(TripSettings::default(), 0, true);
        state
    }

    /// ~5 m/s northwards per second
    fn fix(step: u64, accuracy_m: f64) -> LocationFix {
        LocationFix::new(52.0 + step as f64 * 4.4966e-5, 13.0, step * 1_000, accuracy_m)
    }

    fn rest(timestamp_ms: u64) -> MotionSample {
        MotionSample::new(0.0, 0.0, 9.81, timestamp_ms)
    }

    #[test]
    fn test_idle_state_ignores_input() {
        let mut state = DetectionState::new(&fast_config(), TripSettings::default());
        assert!(state.on_motion(&rest(0), 0).is_none());
        assert!(state.on_location(&fix(0, 5.0), 0).is_none());
        assert!(state.on_noise(90.0, None).is_none());
        assert_eq!(state.snapshot().location_status, LocationStatus::Stopped);
    }

    #[test]
    fn test_hard_acceleration_needs_speed() {
        let mut state = active_state();
        state.on_motion(&rest(0), 0);
        assert!(state.snapshot().calibrated);

        // Stationary: suppressed
        let launch = MotionSample::new(0.0, -6.0, 9.81, 200);
        assert!(state.on_motion(&launch, 200).is_none());

        state.on_location(&fix(0, 5.0), 0);
        let (outcome, _) = state.on_location(&fix(1, 5.0), 1_000).unwrap();
        assert!(outcome.speed().unwrap() > 4.0);

        let launch = MotionSample::new(0.0, -6.0, 9.81, 400);
        let event = state.on_motion(&launch, 1_200).unwrap();
        assert_eq!(event.kind, ViolationKind::Acceleration);
        assert!((event.severity - 6.0).abs() < 1e-9);
        assert!(event.location.is_some());
        assert_eq!(state.snapshot().score, 95);
    }

    #[test]
    fn test_route_points_throttled() {
        let mut state = active_state();
        for step in 0..6 {
            state.on_location(&fix(step, 5.0), step * 1_000);
        }
        let finished = state.finish(6_000).unwrap();
        let times: Vec<_> = finished.route_points.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(times, vec![0, 2_000, 4_000]);
    }

    #[test]
    fn test_low_accuracy_status() {
        let mut state = active_state();
        assert_eq!(state.snapshot().location_status, LocationStatus::Checking);

        state.on_location(&fix(0, 50.0), 0);
        assert_eq!(state.snapshot().location_status, LocationStatus::LowAccuracy);

        state.on_location(&fix(1, 5.0), 1_000);
        assert_eq!(state.snapshot().location_status, LocationStatus::Active);
    }

    #[test]
    fn test_speeding_shares_motion_cooldown() {
        let mut state = active_state();
        state.set_settings(TripSettings::new(MountPosition::FlatDashboard, 1.0, 30));
        state.on_motion(&rest(0), 0);

        // 20 m/s northwards, limit 30 km/h
        let far = |step: u64| LocationFix::new(52.0 + step as f64 * 1.7986e-4, 13.0, step * 1_000, 5.0);
        state.on_location(&far(0), 0);
        let (_, speeding) = state.on_location(&far(1), 1_000).unwrap();
        assert_eq!(speeding.unwrap().kind, ViolationKind::Speeding);

        // Brake inside the shared cooldown is swallowed
        let brake = MotionSample::new(0.0, 8.0, 9.81, 2_000);
        assert!(state.on_motion(&brake, 2_000).is_none());

        let brake = MotionSample::new(0.0, 8.0, 9.81, 4_500);
        assert_eq!(state.on_motion(&brake, 4_500).unwrap().kind, ViolationKind::Brake);
        assert_eq!(state.snapshot().score, 100 - 8 - 5);
    }

    #[test]
    fn test_finish_hands_over_buffers() {
        let mut state = active_state();
        state.on_noise(
            82.0,
            Some(Detection {
                kind: ViolationKind::Noise,
                severity: 82.0,
                timestamp_ms: 500,
            }),
        );

        let finished = state.finish(31_000).unwrap();
        assert_eq!(finished.duration_ms(), 31_000);
        assert_eq!(finished.score, 96);
        assert_eq!(finished.counts.noise, 1);
        assert_eq!(finished.violations.len(), 1);
        assert_eq!(state.snapshot().phase, SessionPhase::Finalizing);
        assert!(state.finish(32_000).is_none());

        state.end_trip(Some("Trip too short (minimum 30 seconds)".into()));
        let status = state.snapshot();
        assert_eq!(status.phase, SessionPhase::Idle);
        assert_eq!(status.score, 96);
        assert!(status.error.is_some());
    }

    #[test]
    fn test_shared_publishes_only_changes() {
        let shared = Shared::new(DetectionState::new(&fast_config(), TripSettings::default()));
        let mut rx = shared.subscribe();
        rx.mark_unchanged();

        shared.update(|_| ());
        assert!(!rx.has_changed().unwrap());

        shared.update(|s| s.set_error("Noise detection stopped"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().error.as_deref(),
            Some("Noise detection stopped")
        );
    }
}
