//! Event queue configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Event queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Bounded capacity; ticks arriving while full are dropped
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl QueueConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Motion ticks accepted into the queue
    pub motion_received: AtomicU64,

    /// Location fixes accepted into the queue
    pub location_received: AtomicU64,

    /// Events dropped because the queue was full or closed
    pub events_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    /// Recording lines that failed to parse
    pub parse_errors: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_motion(&self) {
        self.motion_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_location(&self) {
        self.location_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            motion_received: self.motion_received.load(Ordering::Relaxed),
            location_received: self.location_received.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub motion_received: u64,
    pub location_received: u64,
    pub events_dropped: u64,
    pub queue_len: usize,
    pub parse_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = IngestionMetrics::new();
        metrics.record_motion();
        metrics.record_motion();
        metrics.record_location();
        metrics.record_dropped();
        metrics.update_queue_len(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.motion_received, 2);
        assert_eq!(snapshot.location_received, 1);
        assert_eq!(snapshot.events_dropped, 1);
        assert_eq!(snapshot.queue_len, 4);
        assert_eq!(snapshot.parse_errors, 0);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        assert_eq!(QueueConfig::new(0).capacity, 1);
    }
}
