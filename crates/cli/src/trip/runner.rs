//! Trip runner - wires sources, session and recorder for one trip.
//!
//! Sources are either the scripted drive from the configuration or a
//! recorded directory. The trip ends when the duration elapses or the
//! shutdown future resolves; either way it is stopped and persisted.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AppConfig, AudioSource, Clock, LocationSource, MotionSource, SystemClock};
use ingestion::{ReplayDir, ScriptedDrive};
use observability::TripMetricsAggregator;
use session::{SessionSources, SessionStatus, TripSession};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{StatusObserver, TripStats};
use crate::error::CliError;

/// Trip run configuration
#[derive(Debug, Clone)]
pub struct TripRunConfig {
    /// Loaded configuration with CLI overrides applied
    pub app: AppConfig,

    /// Trip length (None = until shutdown)
    pub duration: Option<Duration>,

    /// Recorded drive directory (None = scripted drive)
    pub replay_path: Option<PathBuf>,

    /// Sample the microphone
    pub audio: bool,

    /// Attached once the trip is saved
    pub notes: Option<String>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Runs one monitored trip end to end
pub struct TripRunner {
    config: TripRunConfig,
}

impl TripRunner {
    pub fn new(config: TripRunConfig) -> Self {
        Self { config }
    }

    /// Run the trip to completion
    ///
    /// Needs a multi-threaded runtime: stopping joins the sensor threads.
    pub async fn run<F>(self, shutdown: F) -> Result<TripStats>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let app = &self.config.app;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let recorder = storage::create_recorder(&app.storage).map_err(CliError::from)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sources = self.build_sources(Arc::clone(&clock))?;

        let mut session =
            TripSession::new(app.detection.clone(), sources, recorder.handle(), clock);

        let (done_tx, done_rx) = oneshot::channel();
        let watcher = spawn_status_watcher(session.subscribe(), done_rx);

        session
            .start(app.trip.mount, app.trip.sensitivity, app.trip.speed_limit_kmh)
            .map_err(CliError::from)?;

        wait_for_end(self.config.duration, shutdown).await;

        info!("Stopping trip...");
        let summary = tokio::task::block_in_place(|| session.stop());
        let ticket = session.take_persist_ticket();
        let final_status = session.status();
        let ingestion = session.ingestion_metrics().snapshot();

        // Receiver is gone only if the watcher panicked
        let _ = done_tx.send(());
        let aggregator = match watcher.await {
            Ok(aggregator) => aggregator,
            Err(e) => {
                warn!(error = %e, "Status watcher failed");
                TripMetricsAggregator::new()
            }
        };
        drop(session);

        let mut persisted = None;
        if let Some(ticket) = ticket {
            match ticket.wait().await {
                Ok(outcome) => {
                    if !outcome.is_complete() {
                        warn!(trip_id = outcome.trip_id, ?outcome, "Trip saved without some detail rows");
                    }
                    if let Some(notes) = &self.config.notes {
                        recorder
                            .annotate(outcome.trip_id, notes)
                            .await
                            .context("Failed to attach trip notes")?;
                    }
                    persisted = Some(outcome);
                }
                Err(e) => warn!(error = %e, "Trip was not saved"),
            }
        }

        let store_name = recorder.name().to_string();
        let recorder_metrics = recorder.metrics().snapshot();
        recorder.shutdown().await;

        Ok(TripStats {
            summary,
            persisted,
            store_name,
            final_status,
            ingestion,
            recorder: recorder_metrics,
            aggregator,
            wall_time: started.elapsed(),
        })
    }

    fn build_sources(&self, clock: Arc<dyn Clock>) -> Result<SessionSources> {
        let app = &self.config.app;

        let mut sources = match &self.config.replay_path {
            Some(dir) => {
                info!(path = %dir.display(), "Running in REPLAY mode");
                let replay = ReplayDir::open(dir, clock, None).map_err(CliError::from)?;
                SessionSources {
                    motion: Some(replay.motion as Arc<dyn MotionSource>),
                    location: replay
                        .location
                        .map(|source| source as Arc<dyn LocationSource>),
                    audio: replay
                        .audio
                        .map(|source| Box::new(source) as Box<dyn AudioSource>),
                }
            }
            None => {
                let script = app.simulation.clone().unwrap_or_default();
                info!(
                    maneuvers = script.maneuvers.len(),
                    motion_hz = script.motion_hz,
                    "Running scripted drive"
                );
                let drive = ScriptedDrive::new(script, app.trip.mount, clock);
                SessionSources {
                    motion: Some(drive.motion_source() as Arc<dyn MotionSource>),
                    location: Some(drive.location_source() as Arc<dyn LocationSource>),
                    audio: Some(Box::new(drive.audio_source()) as Box<dyn AudioSource>),
                }
            }
        };

        if !self.config.audio {
            info!("Noise detection disabled");
            sources.audio = None;
        }
        Ok(sources)
    }
}

/// Fold status updates until the trip is over
fn spawn_status_watcher(
    mut status: watch::Receiver<SessionStatus>,
    mut done: oneshot::Receiver<()>,
) -> JoinHandle<TripMetricsAggregator> {
    tokio::spawn(async move {
        let mut observer = StatusObserver::new();
        loop {
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = status.borrow_and_update().clone();
                    observer.observe(&snapshot);
                }
                _ = &mut done => {
                    let snapshot = status.borrow().clone();
                    observer.observe(&snapshot);
                    break;
                }
            }
        }
        observer.into_aggregator()
    })
}

async fn wait_for_end<F>(duration: Option<Duration>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let timer = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = timer => info!("Trip duration reached"),
        _ = shutdown => warn!("Received shutdown signal, stopping trip..."),
    }
}
