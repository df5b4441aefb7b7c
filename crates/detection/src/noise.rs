//! Cabin noise estimation and the noise violation state machine.

use contracts::{NoiseConfig, ViolationKind};
use tracing::debug;

use crate::Detection;

const FULL_SCALE: f64 = 32_767.0;
const DB_REFERENCE_OFFSET: f64 = 90.0;

/// Sound-pressure proxy from signed 16-bit PCM
///
/// `20·log10(rms / 32767) + 90`, floored at 0. Silence and empty buffers give 0.
pub fn decibels(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = samples.iter().map(|s| f64::from(*s).powi(2)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return 0.0;
    }

    (20.0 * (rms / FULL_SCALE).log10() + DB_REFERENCE_OFFSET).max(0.0)
}

/// Short description of a level for status displays
pub fn describe_noise(db: f64) -> &'static str {
    match db {
        d if d < 60.0 => "Quiet",
        d if d < 75.0 => "Normal",
        d if d < 85.0 => "Loud",
        d if d < 95.0 => "Very Loud",
        _ => "Excessive",
    }
}

/// Noise channel state with its own cooldown clock
#[derive(Debug, Clone)]
pub struct NoiseAnalyzer {
    config: NoiseConfig,
    last_db: f64,
    sustained_since_ms: Option<u64>,
    last_violation_ms: Option<u64>,
}

impl NoiseAnalyzer {
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            config,
            last_db: 0.0,
            sustained_since_ms: None,
            last_violation_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_db = 0.0;
        self.sustained_since_ms = None;
        self.last_violation_ms = None;
    }

    /// Estimate the level of one buffer and remember it
    pub fn ingest(&mut self, samples: &[i16]) -> f64 {
        self.last_db = decibels(samples);
        self.last_db
    }

    pub fn last_db(&self) -> f64 {
        self.last_db
    }

    pub fn sustained_since(&self) -> Option<u64> {
        self.sustained_since_ms
    }

    fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        match self.last_violation_ms {
            Some(last) => now_ms.saturating_sub(last) > self.config.cooldown_ms,
            None => true,
        }
    }

    fn fire(&mut self, db: f64, now_ms: u64) -> Detection {
        self.last_violation_ms = Some(now_ms);
        debug!(db, now_ms, "noise violation");
        Detection {
            kind: ViolationKind::Noise,
            severity: db,
            timestamp_ms: now_ms,
        }
    }

    /// Advance the state machine with a level measured at `now_ms`
    pub fn check_violation(&mut self, db: f64, now_ms: u64) -> Option<Detection> {
        if db > self.config.violation_db {
            if self.cooldown_elapsed(now_ms) {
                return Some(self.fire(db, now_ms));
            }
            return None;
        }

        if db > self.config.warning_db {
            let Some(since) = self.sustained_since_ms else {
                self.sustained_since_ms = Some(now_ms);
                return None;
            };

            if now_ms.saturating_sub(since) >= self.config.sustained_ms
                && self.cooldown_elapsed(now_ms)
            {
                self.sustained_since_ms = None;
                return Some(self.fire(db, now_ms));
            }
            return None;
        }

        self.sustained_since_ms = None;
        None
    }
}
