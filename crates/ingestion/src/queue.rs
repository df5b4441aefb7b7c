//! Sensor event queue
//!
//! Motion and location callbacks push into one bounded queue; a single
//! dispatcher thread drains it, so both handlers run on one context.

use std::sync::Arc;
use std::thread::JoinHandle;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{LocationFix, LocationSource, MotionSample, MotionSource};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{IngestionMetrics, QueueConfig};

/// One tick from a callback-driven source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    Motion(MotionSample),
    Location(LocationFix),
}

impl SensorEvent {
    fn kind(&self) -> &'static str {
        match self {
            SensorEvent::Motion(_) => "motion",
            SensorEvent::Location(_) => "location",
        }
    }
}

/// Bounded queue feeding one dispatcher thread
pub struct SensorQueue {
    tx: Sender<SensorEvent>,
    rx: Receiver<SensorEvent>,
    metrics: Arc<IngestionMetrics>,
    motion: Option<Arc<dyn MotionSource>>,
    location: Option<Arc<dyn LocationSource>>,
}

impl SensorQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_metrics(config, Arc::new(IngestionMetrics::new()))
    }

    pub fn with_metrics(config: QueueConfig, metrics: Arc<IngestionMetrics>) -> Self {
        let (tx, rx) = bounded(config.capacity.max(1));
        Self {
            tx,
            rx,
            metrics,
            motion: None,
            location: None,
        }
    }

    pub fn attach_motion(&mut self, source: Arc<dyn MotionSource>) {
        debug!(source_id = %source.source_id(), "motion source attached");
        self.motion = Some(source);
    }

    pub fn attach_location(&mut self, source: Arc<dyn LocationSource>) {
        debug!(source_id = %source.source_id(), "location source attached");
        self.location = Some(source);
    }

    /// Register callbacks on every attached source
    #[instrument(name = "sensor_queue_start_all", skip(self))]
    pub fn start_all(&self) {
        if let Some(source) = &self.motion {
            let tx = self.tx.clone();
            let metrics = self.metrics.clone();
            let source_id = source.source_id().to_string();
            source.listen(Arc::new(move |sample| {
                if send_event(&tx, SensorEvent::Motion(sample), &metrics, &source_id) {
                    metrics.record_motion();
                }
            }));
        }

        if let Some(source) = &self.location {
            let tx = self.tx.clone();
            let metrics = self.metrics.clone();
            let source_id = source.source_id().to_string();
            source.listen(Arc::new(move |fix| {
                if send_event(&tx, SensorEvent::Location(fix), &metrics, &source_id) {
                    metrics.record_location();
                }
            }));
        }

        info!(
            motion = self.motion.is_some(),
            location = self.location.is_some(),
            capacity = self.tx.capacity().unwrap_or_default(),
            "sensor queue started"
        );
    }

    /// Deregister sources and close the queue
    ///
    /// Non-blocking. Events already queued are still delivered to the dispatcher.
    #[instrument(name = "sensor_queue_stop_all", skip(self))]
    pub fn stop_all(&self) {
        if let Some(source) = &self.motion {
            source.stop();
        }
        if let Some(source) = &self.location {
            source.stop();
        }
        self.tx.close();
        debug!(pending = self.rx.len(), "sensor queue closed");
    }

    /// Drain the queue on a dedicated thread until it is closed and empty
    pub fn spawn_dispatcher<F>(&self, mut handler: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnMut(SensorEvent) + Send + 'static,
    {
        let rx = self.rx.clone();
        let metrics = self.metrics.clone();

        std::thread::Builder::new()
            .name("sensor-dispatch".into())
            .spawn(move || {
                while let Ok(event) = rx.recv_blocking() {
                    metrics.update_queue_len(rx.len());
                    trace!(kind = event.kind(), "dispatching sensor event");
                    handler(event);
                }
                debug!("sensor dispatcher exited");
            })
    }

    pub fn receiver(&self) -> Receiver<SensorEvent> {
        self.rx.clone()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Push one event, dropping it when the queue is full or closed
#[inline]
fn send_event(
    tx: &Sender<SensorEvent>,
    event: SensorEvent,
    metrics: &IngestionMetrics,
    source_id: &str,
) -> bool {
    match tx.try_send(event) {
        Ok(()) => {
            metrics.update_queue_len(tx.len());
            true
        }
        Err(TrySendError::Full(event)) => {
            metrics.record_dropped();
            metrics::counter!("drivesafer_sensor_events_dropped_total", "source" => event.kind())
                .increment(1);
            trace!(source_id = %source_id, "sensor event dropped (queue full)");
            false
        }
        Err(TrySendError::Closed(_)) => {
            metrics.record_dropped();
            warn!(source_id = %source_id, "sensor event after queue closed");
            false
        }
    }
}
