//! Trip statistics and metrics.

use std::time::Duration;

use contracts::{TripSummary, ViolationKind};
use detection::{describe_noise, speed_kmh};
use observability::TripMetricsAggregator;
use session::SessionStatus;
use storage::PersistOutcome;

/// Folds published session snapshots into running statistics
///
/// Snapshots can be coalesced by the watch channel, so this samples the
/// stream rather than seeing every tick.
#[derive(Debug, Default)]
pub struct StatusObserver {
    aggregator: TripMetricsAggregator,
    last_speed: f64,
    last_noise: f64,
    last_violation: Option<(u64, ViolationKind)>,
    rejected_seen: u64,
}

impl StatusObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, status: &SessionStatus) {
        if status.speed_mps > 0.0 && status.speed_mps != self.last_speed {
            self.aggregator.push_speed(status.speed_mps);
        }
        self.last_speed = status.speed_mps;

        if status.noise_active && status.noise_db != self.last_noise {
            self.aggregator.push_noise(status.noise_db);
        }
        self.last_noise = status.noise_db;

        if let Some(event) = &status.last_violation {
            let key = (event.timestamp_ms, event.kind);
            if self.last_violation != Some(key) {
                self.aggregator.push_violation(event);
                self.last_violation = Some(key);
            }
        }

        for _ in self.rejected_seen..status.rejected_fixes {
            self.aggregator.inc_fix_rejected();
        }
        self.rejected_seen = self.rejected_seen.max(status.rejected_fixes);
    }

    pub fn into_aggregator(self) -> TripMetricsAggregator {
        self.aggregator
    }
}

/// Everything reported at the end of a CLI trip
#[derive(Debug, Clone)]
pub struct TripStats {
    /// Summary handed to the recorder, `None` when the trip was discarded
    pub summary: Option<TripSummary>,

    /// Rows written, `None` when nothing was persisted
    pub persisted: Option<PersistOutcome>,

    pub store_name: String,

    /// Last published session status
    pub final_status: SessionStatus,

    pub ingestion: ingestion::MetricsSnapshot,

    pub recorder: storage::MetricsSnapshot,

    /// Sampled speed, noise and severity statistics
    pub aggregator: TripMetricsAggregator,

    /// Wall-clock time of the run
    pub wall_time: Duration,
}

impl TripStats {
    pub fn saved(&self) -> bool {
        self.persisted.is_some()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                        Trip Summary                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let status = &self.final_status;
        match &self.summary {
            Some(summary) => {
                println!("🚗 Trip");
                println!("   ├─ Date: {}", summary.date);
                println!("   ├─ Time: {} - {}", summary.start_time, summary.end_time);
                println!("   ├─ Duration: {}", summary.formatted_duration());
                println!(
                    "   └─ Score: {} ({})",
                    summary.final_score,
                    detection::score_description(summary.final_score)
                );
            }
            None => {
                println!("🚗 Trip not saved");
                if let Some(error) = &status.error {
                    println!("   └─ {}", error);
                }
            }
        }

        println!("\n⚠️  Violations");
        for kind in ViolationKind::ALL {
            println!("   ├─ {}: {}", kind.label(), status.counts.get(kind));
        }
        println!("   └─ Total: {}", status.counts.total());

        println!("\n💾 Storage ({})", self.store_name);
        match &self.persisted {
            Some(outcome) => {
                println!("   ├─ Trip id: {}", outcome.trip_id);
                println!(
                    "   ├─ Route points: {} saved, {} failed",
                    outcome.route_points_saved, outcome.route_points_failed
                );
                println!(
                    "   └─ Violations: {} saved, {} failed",
                    outcome.violations_saved, outcome.violations_failed
                );
            }
            None => println!("   └─ Nothing persisted"),
        }

        println!("\n📡 Sensors");
        println!("   ├─ Motion ticks: {}", self.ingestion.motion_received);
        println!("   ├─ Location fixes: {}", self.ingestion.location_received);
        println!("   ├─ Events dropped: {}", self.ingestion.events_dropped);
        println!("   ├─ Location: {}", status.location_status);
        println!(
            "   └─ Last noise: {:.1} dB ({})",
            status.noise_db,
            describe_noise(status.noise_db)
        );

        let summary = self.aggregator.summary();
        if summary.speed_mps.count > 0 {
            println!(
                "\n🏁 Top sampled speed: {:.1} km/h",
                speed_kmh(summary.speed_mps.max)
            );
        }
        println!("\n{}", summary);
        println!("Wall time: {:.2}s", self.wall_time.as_secs_f64());
        println!();
    }
}
