//! TripSession - Idle -> Active -> Finalizing -> Idle
//!
//! Motion and location ticks are drained by one dispatcher thread; audio is
//! sampled on its own thread. Both feed the same mutex-guarded state.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{Local, TimeZone};
use contracts::{
    AudioSource, Clock, ContractError, DetectionConfig, FinalizedTrip, LocationSource,
    MotionSource, MountPosition, SessionConfig, TripSummary,
};
use ingestion::{IngestionMetrics, QueueConfig, SensorEvent, SensorQueue};
use observability::TripOutcome;
use storage::{PersistTicket, RecorderHandle};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::audio::AudioWorker;
use crate::error::{Result, SessionError};
use crate::state::{DetectionState, FinishedTrip, Shared};
use crate::status::{SessionStatus, TripSettings};

pub const TRIP_TOO_SHORT_MESSAGE: &str = "Trip too short (minimum 30 seconds)";
pub const TRIP_TOO_LONG_MESSAGE: &str = "Trip too long (maximum 24 hours)";
pub const MOTION_UNAVAILABLE_MESSAGE: &str = "Motion sensor not available";
pub const MICROPHONE_UNAVAILABLE_MESSAGE: &str = "Microphone permission required for noise detection";
pub const NOISE_INIT_FAILED_MESSAGE: &str = "Failed to initialize noise detection";

/// Sensors wired into a session
#[derive(Default)]
pub struct SessionSources {
    pub motion: Option<Arc<dyn MotionSource>>,
    pub location: Option<Arc<dyn LocationSource>>,
    pub audio: Option<Box<dyn AudioSource>>,
}

/// Everything that only exists while a trip is active
struct RunningTrip {
    queue: SensorQueue,
    dispatcher: JoinHandle<()>,
    audio: Option<AudioWorker>,
}

/// Trip lifecycle orchestrator
pub struct TripSession {
    config: DetectionConfig,
    clock: Arc<dyn Clock>,
    recorder: RecorderHandle,
    shared: Arc<Shared>,
    ingestion_metrics: Arc<IngestionMetrics>,
    motion: Option<Arc<dyn MotionSource>>,
    location: Option<Arc<dyn LocationSource>>,
    /// Parked here between trips; owned by the audio thread during one
    audio: Option<Box<dyn AudioSource>>,
    running: Option<RunningTrip>,
    persist_ticket: Option<PersistTicket>,
}

impl TripSession {
    pub fn new(
        config: DetectionConfig,
        sources: SessionSources,
        recorder: RecorderHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = DetectionState::new(&config, TripSettings::default());
        Self {
            config,
            clock,
            recorder,
            shared: Arc::new(Shared::new(state)),
            ingestion_metrics: Arc::new(IngestionMetrics::new()),
            motion: sources.motion,
            location: sources.location,
            audio: sources.audio,
            running: None,
            persist_ticket: None,
        }
    }

    /// Idle -> Active
    ///
    /// # Errors
    /// - `AlreadyActive` if a trip is running
    /// - `MotionSensorUnavailable` if no motion source is attached
    /// - dispatcher thread spawn failure
    #[instrument(name = "trip_session_start", skip(self))]
    pub fn start(
        &mut self,
        mount: MountPosition,
        sensitivity: f64,
        speed_limit_kmh: u32,
    ) -> Result<()> {
        if self.running.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        let Some(motion) = self.motion.clone() else {
            self.shared
                .update(|state| state.set_error(MOTION_UNAVAILABLE_MESSAGE));
            return Err(SessionError::MotionSensorUnavailable);
        };

        let settings = TripSettings::new(mount, sensitivity, speed_limit_kmh);

        let mut queue = SensorQueue::with_metrics(
            QueueConfig::new(self.config.session.event_queue_capacity),
            Arc::clone(&self.ingestion_metrics),
        );
        queue.attach_motion(motion);
        if let Some(location) = &self.location {
            queue.attach_location(Arc::clone(location));
        }

        let dispatcher = queue
            .spawn_dispatcher(event_handler(Arc::clone(&self.shared), Arc::clone(&self.clock)))
            .map_err(ContractError::from)?;

        let now = self.clock.now_ms();
        let has_location = self.location.is_some();
        self.shared
            .update(|state| state.begin_trip(settings, now, has_location));

        queue.start_all();
        let audio = self.start_audio();

        info!(
            mount = ?settings.mount,
            sensitivity = settings.sensitivity,
            speed_limit_kmh = settings.speed_limit_kmh,
            location = has_location,
            noise = audio.is_some(),
            "Trip started"
        );

        self.running = Some(RunningTrip {
            queue,
            dispatcher,
            audio,
        });
        Ok(())
    }

    /// Open the microphone and start sampling; degraded mode on failure
    fn start_audio(&mut self) -> Option<AudioWorker> {
        let mut source = self.audio.take()?;

        if let Err(e) = source.open() {
            warn!(source_id = %source.source_id(), error = %e, "Noise detection unavailable");
            self.audio = Some(source);
            self.shared
                .update(|state| state.set_error(MICROPHONE_UNAVAILABLE_MESSAGE));
            return None;
        }

        match AudioWorker::spawn(
            source,
            self.config.noise.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&self.shared),
        ) {
            Ok(worker) => {
                self.shared.update(|state| state.set_noise_active(true));
                Some(worker)
            }
            Err(e) => {
                // The source moved into the failed closure and is gone
                error!(error = %e, "Failed to spawn noise sampler");
                self.shared
                    .update(|state| state.set_error(NOISE_INIT_FAILED_MESSAGE));
                None
            }
        }
    }

    /// Active -> Finalizing -> Idle
    ///
    /// Returns the summary handed to the recorder, or `None` when no trip was
    /// active or the trip was rejected (too short, failed validation).
    #[instrument(name = "trip_session_stop", skip(self))]
    pub fn stop(&mut self) -> Option<TripSummary> {
        let running = self.running.take()?;

        // Listeners first, then the audio loop, then drain what was queued
        running.queue.stop_all();
        if let Some(worker) = running.audio {
            let timeout = Duration::from_millis(self.config.session.audio_join_timeout_ms);
            if let Some(source) = worker.stop(timeout) {
                self.audio = Some(source);
            }
        }
        if running.dispatcher.join().is_err() {
            error!("Sensor dispatcher panicked");
        }

        let now = self.clock.now_ms();
        let finished = self.shared.update(|state| state.finish(now))?;
        let (summary, error) = self.finalize(finished);
        self.shared.update(|state| state.end_trip(error));
        summary
    }

    fn finalize(&mut self, finished: FinishedTrip) -> (Option<TripSummary>, Option<String>) {
        let duration_ms = finished.duration_ms();

        if duration_ms < self.config.session.min_trip_ms {
            warn!(duration_ms, "Trip too short, not saved");
            observability::record_trip_finalized(TripOutcome::TooShort);
            return (None, Some(TRIP_TOO_SHORT_MESSAGE.to_string()));
        }

        let summary = build_summary(&finished);
        if let Err(e) = validate_trip(&summary, &self.config.session) {
            warn!(error = %e, "Trip rejected");
            observability::record_trip_finalized(TripOutcome::Rejected);
            return (None, Some(validation_message(e)));
        }

        let trip = FinalizedTrip {
            summary: summary.clone(),
            route_points: finished.route_points,
            violations: finished.violations,
        };
        let route_points = trip.route_points.len();
        let violations = trip.violations.len();

        match self.recorder.submit(trip) {
            Ok(ticket) => {
                info!(
                    duration = %summary.formatted_duration(),
                    score = summary.final_score,
                    route_points,
                    violations,
                    "Trip handed to recorder"
                );
                observability::record_trip_finalized(TripOutcome::Submitted);
                self.persist_ticket = Some(ticket);
                (Some(summary), None)
            }
            Err(e) => {
                error!(error = %e, "Failed to save trip");
                observability::record_trip_finalized(TripOutcome::SubmitFailed);
                (
                    Some(summary),
                    Some("Failed to save trip. Please try again.".to_string()),
                )
            }
        }
    }

    /// Ticket for the most recently submitted trip
    pub fn take_persist_ticket(&mut self) -> Option<PersistTicket> {
        self.persist_ticket.take()
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.shared.subscribe()
    }

    pub fn set_mount(&self, mount: MountPosition) {
        self.update_settings(|s| TripSettings::new(mount, s.sensitivity, s.speed_limit_kmh));
    }

    /// Clamped to [0.5, 1.5]
    pub fn set_sensitivity(&self, sensitivity: f64) {
        self.update_settings(|s| TripSettings::new(s.mount, sensitivity, s.speed_limit_kmh));
    }

    /// Clamped to [30, 120] km/h
    pub fn set_speed_limit(&self, speed_limit_kmh: u32) {
        self.update_settings(|s| TripSettings::new(s.mount, s.sensitivity, speed_limit_kmh));
    }

    fn update_settings(&self, f: impl FnOnce(TripSettings) -> TripSettings) {
        self.shared.update(|state| {
            let settings = f(state.settings());
            state.set_settings(settings);
        });
    }

    pub fn clear_error(&self) {
        self.shared.update(DetectionState::clear_error);
    }

    /// Full score and zero counts; ignored while a trip is active
    pub fn reset_score(&self) {
        if self.is_active() {
            debug!("Score reset ignored during an active trip");
            return;
        }
        self.shared.update(DetectionState::reset_score);
    }

    pub fn ingestion_metrics(&self) -> &Arc<IngestionMetrics> {
        &self.ingestion_metrics
    }

    pub fn recorder(&self) -> &RecorderHandle {
        &self.recorder
    }
}

impl Drop for TripSession {
    fn drop(&mut self) {
        if self.running.is_some() {
            warn!("TripSession dropped while active, stopping trip");
            self.stop();
        }
    }
}

/// Dispatcher-side handler: classify under the lock, record metrics after
fn event_handler(
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
) -> impl FnMut(SensorEvent) + Send + 'static {
    let mut throttled_seen = 0u64;

    move |event| match event {
        SensorEvent::Motion(sample) => {
            let now = clock.now_ms();
            let (violation, throttled) = shared.update(|state| {
                (state.on_motion(&sample, now), state.throttled_samples())
            });

            for _ in throttled_seen..throttled {
                observability::record_sample_dropped("motion_throttle");
            }
            throttled_seen = throttled;

            if let Some(event) = violation {
                observability::record_violation(event.kind);
                observability::record_score(shared.status().score);
            }
        }
        SensorEvent::Location(fix) => {
            let now = clock.now_ms();
            let Some((outcome, violation)) = shared.update(|state| state.on_location(&fix, now))
            else {
                return;
            };

            match outcome {
                detection::FixOutcome::Accepted { speed_mps } => {
                    observability::record_speed(speed_mps)
                }
                detection::FixOutcome::Rejected(reason) => {
                    debug!(reason = reason.as_str(), "Location fix rejected");
                    observability::record_fix_rejected(reason.as_str());
                }
                detection::FixOutcome::Initial => {}
            }

            if let Some(event) = violation {
                observability::record_violation(event.kind);
                observability::record_score(shared.status().score);
            }
        }
    }
}

/// Local date and times of the trip
fn build_summary(finished: &FinishedTrip) -> TripSummary {
    let (date, start_time) = local_date_time(finished.started_at_ms);
    let (_, end_time) = local_date_time(finished.ended_at_ms);

    TripSummary {
        id: None,
        date,
        start_time,
        end_time,
        started_at_ms: finished.started_at_ms,
        ended_at_ms: finished.ended_at_ms,
        duration_ms: finished.duration_ms(),
        final_score: finished.score,
        counts: finished.counts,
        notes: String::new(),
    }
}

/// (YYYY-MM-DD, HH:MM:SS) in local time
fn local_date_time(timestamp_ms: u64) -> (String, String) {
    let millis = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    match Local.timestamp_millis_opt(millis).earliest() {
        Some(time) => (
            time.format("%Y-%m-%d").to_string(),
            time.format("%H:%M:%S").to_string(),
        ),
        None => (String::new(), String::new()),
    }
}

/// Reject trips that must not be persisted
pub fn validate_trip(summary: &TripSummary, config: &SessionConfig) -> std::result::Result<(), ContractError> {
    if summary.duration_ms < config.min_trip_ms {
        return Err(ContractError::trip_validation(TRIP_TOO_SHORT_MESSAGE));
    }
    if summary.duration_ms > config.max_trip_ms {
        return Err(ContractError::trip_validation(TRIP_TOO_LONG_MESSAGE));
    }
    if summary.final_score > detection::INITIAL_SCORE {
        return Err(ContractError::trip_validation("Invalid score"));
    }
    Ok(())
}

fn validation_message(error: ContractError) -> String {
    match error {
        ContractError::TripValidation { message } => message,
        other => other.to_string(),
    }
}
