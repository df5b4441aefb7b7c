//! Noise sampling loop on its own thread
//!
//! Reads happen without the state lock; only the measured level and any
//! firing are pushed into the shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{AudioSource, Clock, NoiseConfig};
use detection::NoiseAnalyzer;
use tracing::{debug, info, warn};

use crate::state::Shared;

pub const NOISE_STOPPED_MESSAGE: &str = "Noise detection stopped";

/// Handle to a running sampling loop
pub(crate) struct AudioWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    /// The loop hands the source back once it has closed it
    returned: mpsc::Receiver<Box<dyn AudioSource>>,
}

impl AudioWorker {
    /// Start sampling an already opened source
    pub fn spawn(
        source: Box<dyn AudioSource>,
        config: NoiseConfig,
        clock: Arc<dyn Clock>,
        shared: Arc<Shared>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, returned) = mpsc::sync_channel(1);

        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("noise-sampler".into())
            .spawn(move || {
                let source = sample_loop(source, config, clock, shared, worker_stop);
                // Receiver is gone when stop() already timed out
                let _ = tx.send(source);
            })?;

        Ok(Self {
            stop,
            handle,
            returned,
        })
    }

    /// Signal the loop and wait up to `timeout` for it to release the source
    ///
    /// Returns `None` when the loop did not finish in time; the thread is then
    /// detached and keeps ownership of the source until it exits.
    pub fn stop(self, timeout: Duration) -> Option<Box<dyn AudioSource>> {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.thread().unpark();

        match self.returned.recv_timeout(timeout) {
            Ok(source) => {
                if self.handle.join().is_err() {
                    warn!("Noise sampler panicked after releasing its source");
                }
                debug!("Noise sampler joined");
                Some(source)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Noise sampler did not stop in time, detaching"
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Noise sampler exited without returning its source");
                None
            }
        }
    }
}

fn sample_loop(
    mut source: Box<dyn AudioSource>,
    config: NoiseConfig,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
) -> Box<dyn AudioSource> {
    let poll = Duration::from_millis(config.poll_interval_ms);
    let max_failures = config.max_consecutive_failures.max(1);
    let mut buffer = vec![0i16; config.buffer_samples.max(1)];
    let mut analyzer = NoiseAnalyzer::new(config);
    let mut failures = 0u32;

    info!(source_id = %source.source_id(), "Noise sampler started");

    while !stop.load(Ordering::SeqCst) {
        match source.read(&mut buffer) {
            Ok(0) => {}
            Ok(n) => {
                failures = 0;
                let db = analyzer.ingest(&buffer[..n]);
                let detection = analyzer.check_violation(db, clock.now_ms());
                let event = shared.update(|state| state.on_noise(db, detection));

                observability::record_noise_level(db);
                if let Some(event) = event {
                    observability::record_violation(event.kind);
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "Audio buffer read failed");
                if failures >= max_failures {
                    shared.update(|state| {
                        state.set_noise_active(false);
                        state.set_error(NOISE_STOPPED_MESSAGE);
                    });
                    break;
                }
            }
        }

        // Woken early by stop()
        thread::park_timeout(poll);
    }

    source.close();
    info!(source_id = %source.source_id(), "Noise sampler stopped");
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DetectionState;
    use crate::status::TripSettings;
    use contracts::{ContractError, DetectionConfig, ManualClock};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Constant square wave, optionally failing every read
    struct ToneSource {
        amplitude: i16,
        fail: bool,
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl AudioSource for ToneSource {
        fn source_id(&self) -> &str {
            "tone"
        }

        fn open(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        fn read(&mut self, buffer: &mut [i16]) -> Result<usize, ContractError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ContractError::sensor_read("tone", "device lost"));
            }
            for (i, s) in buffer.iter_mut().enumerate() {
                *s = if i % 2 == 0 { self.amplitude } else { -self.amplitude };
            }
            Ok(buffer.len())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fast_noise() -> NoiseConfig {
        NoiseConfig {
            poll_interval_ms: 5,
            buffer_samples: 64,
            ..NoiseConfig::default()
        }
    }

    fn active_shared() -> Arc<Shared> {
        let config = DetectionConfig::default();
        let mut state = DetectionState::new(&config, TripSettings::default());
        state.begin_trip(TripSettings::default(), 0, false);
        state.set_noise_active(true);
        Arc::new(Shared::new(state))
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_loud_tone_fires_once_within_cooldown() {
        let shared = active_shared();
        let clock = Arc::new(ManualClock::new(10_000));
        let reads = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let source = ToneSource {
            // ~84 dB
            amplitude: 16_000,
            fail: false,
            reads: Arc::clone(&reads),
            closed: Arc::clone(&closed),
        };

        let worker =
            AudioWorker::spawn(Box::new(source), fast_noise(), clock, Arc::clone(&shared)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || reads.load(Ordering::SeqCst) >= 5));

        let returned = worker.stop(Duration::from_millis(1_000));
        assert!(returned.is_some());
        assert!(closed.load(Ordering::SeqCst));

        // Clock never advanced: one firing, the rest inside the cooldown
        let status = shared.status();
        assert_eq!(status.counts.noise, 1);
        assert_eq!(status.score, 96);
        assert!(status.noise_db > 80.0);
    }

    #[test]
    fn test_repeated_read_failures_stop_the_loop() {
        let shared = active_shared();
        let reads = Arc::new(AtomicUsize::new(0));
        let source = ToneSource {
            amplitude: 0,
            fail: true,
            reads: Arc::clone(&reads),
            closed: Arc::new(AtomicBool::new(false)),
        };

        let worker = AudioWorker::spawn(
            Box::new(source),
            fast_noise(),
            Arc::new(ManualClock::new(0)),
            Arc::clone(&shared),
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            shared.status().error.is_some()
        }));
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(shared.status().error.as_deref(), Some(NOISE_STOPPED_MESSAGE));
        assert!(!shared.status().noise_active);

        // Loop already exited, source still comes back
        assert!(worker.stop(Duration::from_millis(1_000)).is_some());
    }
}
