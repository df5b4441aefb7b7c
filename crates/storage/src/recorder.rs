//! TripRecorder - owns a store behind an isolated queue and worker task
//!
//! The trip session hands a `FinalizedTrip` over and returns immediately;
//! the summary and its detail rows are written on the worker.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{ContractError, FinalizedTrip, TripId, TripStore};

use crate::error::StorageError;
use crate::metrics::RecorderMetrics;

/// Rows written for one finalized trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub trip_id: TripId,
    pub route_points_saved: usize,
    pub route_points_failed: usize,
    pub violations_saved: usize,
    pub violations_failed: usize,
}

impl PersistOutcome {
    fn new(trip_id: TripId) -> Self {
        Self {
            trip_id,
            ..Self::default()
        }
    }

    /// True when every detail row made it into the store
    pub fn is_complete(&self) -> bool {
        self.route_points_failed == 0 && self.violations_failed == 0
    }
}

type PersistReply = oneshot::Sender<Result<PersistOutcome, ContractError>>;

enum Command {
    Persist {
        trip: Box<FinalizedTrip>,
        reply: PersistReply,
    },
    Annotate {
        trip_id: TripId,
        notes: String,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
}

/// Completion notice for one submitted trip
#[derive(Debug)]
pub struct PersistTicket {
    store_name: String,
    rx: oneshot::Receiver<Result<PersistOutcome, ContractError>>,
}

impl PersistTicket {
    /// Wait for the worker to finish writing the trip
    pub async fn wait(self) -> Result<PersistOutcome, StorageError> {
        match self.rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StorageError::recorder_closed(self.store_name)),
        }
    }

    /// Blocking variant for threads outside the runtime
    pub fn blocking_wait(self) -> Result<PersistOutcome, StorageError> {
        match self.rx.blocking_recv() {
            Ok(result) => Ok(result?),
            Err(_) => Err(StorageError::recorder_closed(self.store_name)),
        }
    }
}

/// Cloneable submit side of a recorder
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    name: String,
    tx: mpsc::Sender<Command>,
    metrics: Arc<RecorderMetrics>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Persist { trip, .. } => f
                .debug_struct("Persist")
                .field("started_at_ms", &trip.summary.started_at_ms)
                .finish(),
            Command::Annotate { trip_id, .. } => {
                f.debug_struct("Annotate").field("trip_id", trip_id).finish()
            }
        }
    }
}

impl RecorderHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<RecorderMetrics> {
        &self.metrics
    }

    /// Queue a finalized trip (non-blocking)
    ///
    /// Fails with `QueueFull` instead of waiting when the worker is behind.
    pub fn submit(&self, trip: FinalizedTrip) -> Result<PersistTicket, StorageError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Persist {
            trip: Box::new(trip),
            reply,
        };

        match self.tx.try_send(command) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(PersistTicket {
                    store_name: self.name.clone(),
                    rx,
                })
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                warn!(store = %self.name, "Recorder queue full, trip not accepted");
                Err(StorageError::QueueFull {
                    store_name: self.name.clone(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(store = %self.name, "Recorder worker closed unexpectedly");
                Err(StorageError::recorder_closed(&self.name))
            }
        }
    }

    /// Replace the notes of a persisted trip and wait for the write
    pub async fn annotate(&self, trip_id: TripId, notes: &str) -> Result<(), StorageError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Annotate {
            trip_id,
            notes: contracts::normalize_notes(notes),
            reply,
        };

        self.tx
            .send(command)
            .await
            .map_err(|_| StorageError::recorder_closed(&self.name))?;

        match rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StorageError::recorder_closed(&self.name)),
        }
    }
}

/// Running recorder worker
///
/// The worker exits once this value and every `RecorderHandle` cloned
/// from it are gone.
pub struct TripRecorder {
    handle: RecorderHandle,
    worker_handle: JoinHandle<()>,
}

impl TripRecorder {
    /// Spawn the worker task; must be called inside a tokio runtime
    pub fn spawn<S: TripStore + Send + 'static>(store: S, queue_capacity: usize) -> Self {
        let name = store.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(RecorderMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            recorder_worker(store, rx, worker_metrics, worker_name).await;
        });

        Self {
            handle: RecorderHandle { name, tx, metrics },
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn metrics(&self) -> &Arc<RecorderMetrics> {
        &self.handle.metrics
    }

    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    pub fn submit(&self, trip: FinalizedTrip) -> Result<PersistTicket, StorageError> {
        self.handle.submit(trip)
    }

    pub async fn annotate(&self, trip_id: TripId, notes: &str) -> Result<(), StorageError> {
        self.handle.annotate(trip_id, notes).await
    }

    /// Drain queued work, then flush and close the store
    #[instrument(name = "trip_recorder_shutdown", skip(self), fields(store = %self.handle.name))]
    pub async fn shutdown(self) {
        let name = self.handle.name.clone();
        drop(self.handle);
        if let Err(e) = self.worker_handle.await {
            error!(store = %name, error = ?e, "Worker task panicked");
        }
        debug!(store = %name, "TripRecorder shutdown complete");
    }
}

#[instrument(name = "recorder_worker_loop", skip(store, rx, metrics), fields(store = %name))]
async fn recorder_worker<S: TripStore>(
    mut store: S,
    mut rx: mpsc::Receiver<Command>,
    metrics: Arc<RecorderMetrics>,
    name: String,
) {
    debug!(store = %name, "Recorder worker started");

    while let Some(command) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match command {
            Command::Persist { trip, reply } => {
                let result = persist_trip(&mut store, &trip, &metrics).await;
                match &result {
                    Ok(outcome) => info!(
                        store = %name,
                        trip_id = outcome.trip_id,
                        route_points = outcome.route_points_saved,
                        violations = outcome.violations_saved,
                        complete = outcome.is_complete(),
                        "Trip persisted"
                    ),
                    Err(e) => error!(store = %name, error = %e, "Trip insert failed"),
                }
                // Submitter may have stopped waiting
                let _ = reply.send(result);
            }
            Command::Annotate {
                trip_id,
                notes,
                reply,
            } => {
                let result = store.update_notes(trip_id, &notes).await;
                if let Err(e) = &result {
                    warn!(store = %name, trip_id, error = %e, "Notes update failed");
                }
                let _ = reply.send(result);
            }
        }
    }

    if let Err(e) = store.flush().await {
        error!(store = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = store.close().await {
        error!(store = %name, error = %e, "Close failed on shutdown");
    }

    debug!(store = %name, "Recorder worker stopped");
}

/// Summary first, then best-effort detail rows tagged with the new id
///
/// A failed summary insert aborts the trip. Failed detail rows are counted
/// and skipped; rows already written stay.
async fn persist_trip<S: TripStore>(
    store: &mut S,
    trip: &FinalizedTrip,
    metrics: &RecorderMetrics,
) -> Result<PersistOutcome, ContractError> {
    let trip_id = match store.insert_trip(&trip.summary).await {
        Ok(id) => {
            metrics.inc_trips_saved();
            observability::record_store_write(store.name(), true);
            id
        }
        Err(e) => {
            metrics.inc_trips_failed();
            observability::record_store_write(store.name(), false);
            return Err(e);
        }
    };

    let mut outcome = PersistOutcome::new(trip_id);

    for point in &trip.route_points {
        match store.insert_route_point(trip_id, point).await {
            Ok(()) => outcome.route_points_saved += 1,
            Err(e) => {
                outcome.route_points_failed += 1;
                warn!(trip_id, error = %e, "Route point insert failed");
            }
        }
    }

    for violation in &trip.violations {
        match store.insert_violation(trip_id, violation).await {
            Ok(()) => outcome.violations_saved += 1,
            Err(e) => {
                outcome.violations_failed += 1;
                warn!(trip_id, kind = %violation.kind, error = %e, "Violation insert failed");
            }
        }
    }

    metrics.add_details_saved((outcome.route_points_saved + outcome.violations_saved) as u64);
    metrics.add_details_failed((outcome.route_points_failed + outcome.violations_failed) as u64);

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RoutePoint, TripSummary, ViolationCounts, ViolationEvent, ViolationKind};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock store for testing
    struct MockStore {
        name: String,
        rows: Arc<AtomicU64>,
        fail_summary: bool,
        fail_violations: bool,
        delay_ms: u64,
    }

    impl MockStore {
        fn new(rows: Arc<AtomicU64>) -> Self {
            Self {
                name: "mock".to_string(),
                rows,
                fail_summary: false,
                fail_violations: false,
                delay_ms: 0,
            }
        }
    }

    impl TripStore for MockStore {
        fn name(&self) -> &str {
            &self.name
        }

        async fn insert_trip(&mut self, _summary: &TripSummary) -> Result<TripId, ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_summary {
                return Err(ContractError::store_write(&self.name, "mock failure"));
            }
            Ok(self.rows.fetch_add(1, Ordering::Relaxed) + 1)
        }

        async fn insert_route_point(
            &mut self,
            _trip_id: TripId,
            _point: &RoutePoint,
        ) -> Result<(), ContractError> {
            self.rows.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn insert_violation(
            &mut self,
            _trip_id: TripId,
            _violation: &ViolationEvent,
        ) -> Result<(), ContractError> {
            if self.fail_violations {
                return Err(ContractError::store_write(&self.name, "mock failure"));
            }
            self.rows.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn update_notes(&mut self, trip_id: TripId, _notes: &str) -> Result<(), ContractError> {
            if trip_id == 0 {
                return Err(ContractError::TripNotFound {
                    store_name: self.name.clone(),
                    trip_id,
                });
            }
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn trip(route_points: usize, violations: usize) -> FinalizedTrip {
        FinalizedTrip {
            summary: TripSummary {
                id: None,
                date: "2024-05-01".into(),
                start_time: "08:00:00".into(),
                end_time: "08:10:00".into(),
                started_at_ms: 0,
                ended_at_ms: 600_000,
                duration_ms: 600_000,
                final_score: 92,
                counts: ViolationCounts::default(),
                notes: String::new(),
            },
            route_points: (0..route_points as u64)
                .map(|i| RoutePoint {
                    latitude: 52.0,
                    longitude: 13.0,
                    timestamp_ms: i * 2_000,
                    speed_mps: 10.0,
                    accuracy_m: 5.0,
                })
                .collect(),
            violations: (0..violations as u64)
                .map(|i| ViolationEvent {
                    kind: ViolationKind::Brake,
                    severity: 6.0,
                    speed_mps: 10.0,
                    location: None,
                    timestamp_ms: i * 5_000,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_recorder_persists_summary_and_details() {
        let rows = Arc::new(AtomicU64::new(0));
        let recorder = TripRecorder::spawn(MockStore::new(Arc::clone(&rows)), 4);

        let outcome = recorder.submit(trip(3, 2)).unwrap().wait().await.unwrap();
        assert_eq!(outcome.trip_id, 1);
        assert_eq!(outcome.route_points_saved, 3);
        assert_eq!(outcome.violations_saved, 2);
        assert!(outcome.is_complete());

        let metrics = recorder.metrics().snapshot();
        assert_eq!(metrics.trips_saved, 1);
        assert_eq!(metrics.details_saved, 5);

        recorder.shutdown().await;
        assert_eq!(rows.load(Ordering::Relaxed), 6);
    }

    #[tokio::test]
    async fn test_detail_failures_are_best_effort() {
        let rows = Arc::new(AtomicU64::new(0));
        let mut store = MockStore::new(Arc::clone(&rows));
        store.fail_violations = true;
        let recorder = TripRecorder::spawn(store, 4);

        let outcome = recorder.submit(trip(2, 3)).unwrap().wait().await.unwrap();
        assert_eq!(outcome.route_points_saved, 2);
        assert_eq!(outcome.violations_failed, 3);
        assert!(!outcome.is_complete());
        assert_eq!(recorder.metrics().details_failed(), 3);

        recorder.shutdown().await;
    }

    #[tokio::test]
    async fn test_summary_failure_skips_details() {
        let rows = Arc::new(AtomicU64::new(0));
        let mut store = MockStore::new(Arc::clone(&rows));
        store.fail_summary = true;
        let recorder = TripRecorder::spawn(store, 4);

        let err = recorder.submit(trip(2, 2)).unwrap().wait().await.unwrap_err();
        assert!(err.to_string().contains("mock failure"), "got: {err}");
        assert_eq!(recorder.metrics().trips_failed(), 1);

        recorder.shutdown().await;
        assert_eq!(rows.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_submit() {
        let rows = Arc::new(AtomicU64::new(0));
        let mut store = MockStore::new(Arc::clone(&rows));
        store.delay_ms = 200;
        let recorder = TripRecorder::spawn(store, 1);

        // First is picked up by the worker, second fills the queue
        let first = recorder.submit(trip(0, 0)).unwrap();
        sleep(Duration::from_millis(20)).await;
        let _second = recorder.submit(trip(0, 0)).unwrap();

        let third = recorder.submit(trip(0, 0));
        assert!(matches!(third, Err(StorageError::QueueFull { .. })));
        assert_eq!(recorder.metrics().dropped_count(), 1);

        first.wait().await.unwrap();
        recorder.shutdown().await;
    }

    #[tokio::test]
    async fn test_annotate_unknown_trip_reports_not_found() {
        let rows = Arc::new(AtomicU64::new(0));
        let recorder = TripRecorder::spawn(MockStore::new(rows), 4);

        recorder.annotate(1, "  wet roads ").await.unwrap();
        let err = recorder.annotate(0, "missing").await.unwrap_err();
        assert!(
            matches!(err, StorageError::Contract(ContractError::TripNotFound { trip_id: 0, .. })),
            "got: {err:?}"
        );

        recorder.shutdown().await;
    }

    #[tokio::test]
    async fn test_handle_outlives_recorder_until_dropped() {
        let rows = Arc::new(AtomicU64::new(0));
        let recorder = TripRecorder::spawn(MockStore::new(rows), 4);
        let handle = recorder.handle();
        assert_eq!(handle.name(), "mock");

        let ticket = handle.submit(trip(1, 0)).unwrap();
        drop(handle);
        recorder.shutdown().await;

        // Queued work drains before the worker stops
        assert_eq!(ticket.wait().await.unwrap().route_points_saved, 1);
    }
}
