//! Recorded drive replay
//!
//! A recording directory holds:
//! - `motion.jsonl`: one `MotionSample` per line
//! - `location.jsonl`: one `LocationFix` per line (optional)
//! - `audio.pcm`: raw signed 16-bit PCM, little-endian (optional)
//!
//! Ticks are replayed at their recorded pace with timestamps rebased onto the
//! injected clock.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    AudioSource, Clock, ContractError, LocationCallback, LocationFix, LocationSource,
    MotionCallback, MotionSample, MotionSource,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::IngestionMetrics;
use crate::error::{IngestionError, Result};

pub const MOTION_FILE: &str = "motion.jsonl";
pub const LOCATION_FILE: &str = "location.jsonl";
pub const AUDIO_FILE: &str = "audio.pcm";

/// A recorded tick that can be replayed
pub trait Recorded: Copy + Send + Sync + 'static {
    fn timestamp_ms(&self) -> u64;
    fn with_timestamp(self, timestamp_ms: u64) -> Self;
}

impl Recorded for MotionSample {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

impl Recorded for LocationFix {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

/// Parse a JSON-lines recording, skipping blank lines
pub fn load_jsonl<T: DeserializeOwned>(
    path: &Path,
    source_id: &str,
    metrics: Option<&IngestionMetrics>,
) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|source| IngestionError::Io {
        source_id: source_id.to_string(),
        path: path.display().to_string(),
        source,
    })?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| IngestionError::Io {
            source_id: source_id.to_string(),
            path: path.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| {
            if let Some(metrics) = metrics {
                metrics.record_parse_error();
            }
            IngestionError::ParseFailed {
                source_id: source_id.to_string(),
                line: idx + 1,
                message: e.to_string(),
            }
        })?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(IngestionError::EmptyRecording {
            source_id: source_id.to_string(),
        });
    }
    Ok(records)
}

/// Decode little-endian 16-bit PCM; a trailing odd byte is ignored
pub fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le(bytemuck::pod_read_unaligned::<i16>(pair)))
        .collect()
}

/// Replays a recording through a callback at recorded pace
pub struct ReplaySource<T: Recorded> {
    source_id: String,
    records: Arc<Vec<T>>,
    clock: Arc<dyn Clock>,
    listening: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl<T: Recorded> ReplaySource<T> {
    pub fn new(source_id: impl Into<String>, records: Vec<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_id: source_id.into(),
            records: Arc::new(records),
            clock,
            listening: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn start(&self, deliver: Arc<dyn Fn(T) + Send + Sync>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let records = self.records.clone();
        let clock = self.clock.clone();
        let listening = self.listening.clone();
        let current = self.generation.clone();
        let source_id = self.source_id.clone();

        debug!(source_id = %source_id, records = records.len(), "replay started");

        std::thread::spawn(move || {
            let base_ms = clock.now_ms();
            let first_ms = records.first().map(|r| r.timestamp_ms()).unwrap_or_default();
            let mut previous_ms = first_ms;

            for record in records.iter() {
                let still_current = || {
                    listening.load(Ordering::Relaxed)
                        && current.load(Ordering::Relaxed) == generation
                };
                if !still_current() {
                    break;
                }

                let gap = record.timestamp_ms().saturating_sub(previous_ms);
                if gap > 0 {
                    std::thread::sleep(Duration::from_millis(gap));
                    if !still_current() {
                        break;
                    }
                }
                previous_ms = record.timestamp_ms();

                let rebased = base_ms + record.timestamp_ms().saturating_sub(first_ms);
                deliver(record.with_timestamp(rebased));
            }

            if current.load(Ordering::Relaxed) == generation {
                listening.store(false, Ordering::SeqCst);
            }
            debug!(source_id = %source_id, "replay finished");
        });
    }

    fn halt(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

impl MotionSource for ReplaySource<MotionSample> {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: MotionCallback) {
        self.start(callback);
    }

    fn stop(&self) {
        self.halt();
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl LocationSource for ReplaySource<LocationFix> {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: LocationCallback) {
        self.start(callback);
    }

    fn stop(&self) {
        self.halt();
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// Microphone backed by a raw PCM file
///
/// Reads past the end of the recording return zero samples.
pub struct PcmFileAudioSource {
    source_id: String,
    path: PathBuf,
    data: Option<Bytes>,
    cursor: usize,
}

impl PcmFileAudioSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source_id: "replay_audio".to_string(),
            path: path.into(),
            data: None,
            cursor: 0,
        }
    }
}

impl AudioSource for PcmFileAudioSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn open(&mut self) -> std::result::Result<(), ContractError> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            ContractError::sensor_unavailable(
                &self.source_id,
                format!("{}: {e}", self.path.display()),
            )
        })?;
        debug!(source_id = %self.source_id, bytes = raw.len(), "pcm recording opened");
        self.data = Some(Bytes::from(raw));
        self.cursor = 0;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> std::result::Result<usize, ContractError> {
        let Some(data) = &self.data else {
            return Err(ContractError::sensor_read(&self.source_id, "device not open"));
        };

        let remaining = data.slice(self.cursor.min(data.len())..);
        let wanted = (buffer.len() * 2).min(remaining.len() & !1);
        let samples = decode_pcm(&remaining[..wanted]);
        buffer[..samples.len()].copy_from_slice(&samples);
        self.cursor += wanted;
        Ok(samples.len())
    }

    fn close(&mut self) {
        self.data = None;
    }
}

/// Sources found in a recording directory
pub struct ReplayDir {
    pub motion: Arc<ReplaySource<MotionSample>>,
    pub location: Option<Arc<ReplaySource<LocationFix>>>,
    pub audio: Option<PcmFileAudioSource>,
}

impl ReplayDir {
    /// Load a recording directory; `motion.jsonl` is required
    pub fn open(dir: &Path, clock: Arc<dyn Clock>, metrics: Option<&IngestionMetrics>) -> Result<Self> {
        let motion: Vec<MotionSample> = load_jsonl(&dir.join(MOTION_FILE), "replay_motion", metrics)?;

        let location_path = dir.join(LOCATION_FILE);
        let location = if location_path.exists() {
            let fixes: Vec<LocationFix> = load_jsonl(&location_path, "replay_location", metrics)?;
            Some(Arc::new(ReplaySource::new("replay_location", fixes, clock.clone())))
        } else {
            warn!(dir = %dir.display(), "recording has no location track");
            None
        };

        let audio_path = dir.join(AUDIO_FILE);
        let audio = audio_path
            .exists()
            .then(|| PcmFileAudioSource::new(audio_path));

        info!(
            dir = %dir.display(),
            motion_samples = motion.len(),
            has_location = location.is_some(),
            has_audio = audio.is_some(),
            "recording loaded"
        );

        Ok(Self {
            motion: Arc::new(ReplaySource::new("replay_motion", motion, clock)),
            location,
            audio,
        })
    }
}
