//! 驾驶检测指标收集模块
//!
//! Records violations, scores and sensor health through the `metrics` facade,
//! and aggregates a per-run summary in memory.

use std::collections::BTreeMap;

use contracts::{ViolationCounts, ViolationEvent, ViolationKind};
use metrics::{counter, gauge, histogram};

/// How a stopped trip ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripOutcome {
    /// Handed to the recorder
    Submitted,
    /// Shorter than the minimum duration
    TooShort,
    /// Failed finalization checks
    Rejected,
    /// Recorder did not accept it
    SubmitFailed,
}

impl TripOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripOutcome::Submitted => "submitted",
            TripOutcome::TooShort => "too_short",
            TripOutcome::Rejected => "rejected",
            TripOutcome::SubmitFailed => "submit_failed",
        }
    }
}

/// 记录一次违规
///
/// # Example
///
/// ```ignore
/// if let Some(event) = state.on_motion(&sample, now) {
///     observability::record_violation(event.kind);
/// }
/// ```
pub fn record_violation(kind: ViolationKind) {
    counter!("drivesafer_violations_total", "kind" => kind.as_str()).increment(1);
}

/// 当前分数
pub fn record_score(score: u32) {
    gauge!("drivesafer_score").set(f64::from(score));
}

/// 噪声分贝
pub fn record_noise_level(db: f64) {
    gauge!("drivesafer_noise_db").set(db);
    histogram!("drivesafer_noise_db_hist").record(db);
}

/// 平滑速度 (m/s)
pub fn record_speed(speed_mps: f64) {
    gauge!("drivesafer_speed_mps").set(speed_mps);
}

/// Motion tick dropped by the filter throttle or the queue
pub fn record_sample_dropped(source: &'static str) {
    counter!("drivesafer_samples_dropped_total", "source" => source).increment(1);
}

/// Location fix discarded by the speed estimator
pub fn record_fix_rejected(reason: &'static str) {
    counter!("drivesafer_fixes_rejected_total", "reason" => reason).increment(1);
}

pub fn record_trip_finalized(outcome: TripOutcome) {
    counter!("drivesafer_trips_finalized_total", "outcome" => outcome.as_str()).increment(1);
}

/// 记录存储写入结果
pub fn record_store_write(store_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "drivesafer_store_writes_total",
        "store" => store_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 行程指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct TripMetricsAggregator {
    /// 噪声分贝统计
    pub noise_stats: RunningStats,

    /// 速度统计 (m/s)
    pub speed_stats: RunningStats,

    /// Severity per violation kind
    pub severity_stats: BTreeMap<ViolationKind, RunningStats>,

    pub counts: ViolationCounts,

    pub fixes_rejected: u64,
}

impl TripMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_noise(&mut self, db: f64) {
        self.noise_stats.push(db);
    }

    pub fn push_speed(&mut self, speed_mps: f64) {
        self.speed_stats.push(speed_mps);
    }

    pub fn push_violation(&mut self, event: &ViolationEvent) {
        self.counts.increment(event.kind);
        self.severity_stats
            .entry(event.kind)
            .or_default()
            .push(event.severity);
    }

    pub fn inc_fix_rejected(&mut self) {
        self.fixes_rejected += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_violations: ViolationKind::ALL
                .iter()
                .map(|kind| u64::from(self.counts.get(*kind)))
                .sum(),
            counts: self.counts,
            fixes_rejected: self.fixes_rejected,
            noise_db: StatsSummary::from(&self.noise_stats),
            speed_mps: StatsSummary::from(&self.speed_stats),
            severity: self
                .severity_stats
                .iter()
                .map(|(kind, stats)| (*kind, StatsSummary::from(stats)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_violations: u64,
    pub counts: ViolationCounts,
    pub fixes_rejected: u64,
    pub noise_db: StatsSummary,
    pub speed_mps: StatsSummary,
    pub severity: BTreeMap<ViolationKind, StatsSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Trip Metrics Summary ===")?;
        writeln!(f, "Violations: {}", self.total_violations)?;
        for kind in ViolationKind::ALL {
            let count = self.counts.get(kind);
            if count == 0 {
                continue;
            }
            match self.severity.get(&kind) {
                Some(stats) => writeln!(f, "  {kind}: {count} (severity {stats})")?,
                None => writeln!(f, "  {kind}: {count}")?,
            }
        }
        writeln!(f, "Rejected fixes: {}", self.fixes_rejected)?;
        writeln!(f, "Speed (m/s): {}", self.speed_mps)?;
        writeln!(f, "Noise (dB): {}", self.noise_db)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.2}, max={:.2}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
