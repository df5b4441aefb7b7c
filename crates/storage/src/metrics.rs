//! Recorder metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for one recorder worker
#[derive(Debug, Default)]
pub struct RecorderMetrics {
    queue_len: AtomicUsize,
    /// Trips whose summary insert succeeded
    trips_saved: AtomicU64,
    /// Trips whose summary insert failed
    trips_failed: AtomicU64,
    /// Route point and violation rows written
    details_saved: AtomicU64,
    /// Route point and violation rows that failed
    details_failed: AtomicU64,
    /// Trips refused because the queue was full
    dropped_count: AtomicU64,
}

impl RecorderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn trips_saved(&self) -> u64 {
        self.trips_saved.load(Ordering::Relaxed)
    }

    pub fn inc_trips_saved(&self) {
        self.trips_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trips_failed(&self) -> u64 {
        self.trips_failed.load(Ordering::Relaxed)
    }

    pub fn inc_trips_failed(&self) {
        self.trips_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn details_saved(&self) -> u64 {
        self.details_saved.load(Ordering::Relaxed)
    }

    pub fn add_details_saved(&self, n: u64) {
        self.details_saved.fetch_add(n, Ordering::Relaxed);
    }

    pub fn details_failed(&self) -> u64 {
        self.details_failed.load(Ordering::Relaxed)
    }

    pub fn add_details_failed(&self, n: u64) {
        self.details_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            trips_saved: self.trips_saved(),
            trips_failed: self.trips_failed(),
            details_saved: self.details_saved(),
            details_failed: self.details_failed(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of recorder metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub trips_saved: u64,
    pub trips_failed: u64,
    pub details_saved: u64,
    pub details_failed: u64,
    pub dropped_count: u64,
}
