//! Blob ingestion metrics
//!
//! Prometheus series are emitted through the `metrics` facade; calls are
//! no-ops until a recorder is installed. `IngestMetricsAggregator` keeps an
//! in-memory summary for end-of-run reporting.

use metrics::{counter, gauge, histogram};

/// Record a blob arriving at the endpoint (before size enforcement)
pub fn record_blob_received(size: usize) {
    counter!("blob_agent_blobs_received_total").increment(1);
    histogram!("blob_agent_blob_size_bytes").record(size as f64);
}

/// Record a blob rejected before fan-out
pub fn record_blob_rejected(reason: &str) {
    counter!(
        "blob_agent_blobs_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record one dispatcher's outcome for one blob
///
/// `status` is one of `accepted`, `failed`, `timed_out`.
pub fn record_blob_dispatched(dispatcher: &str, status: &str) {
    counter!(
        "blob_agent_blobs_dispatched_total",
        "dispatcher" => dispatcher.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record time spent in one dispatcher's `accept`
pub fn record_dispatch_latency_ms(dispatcher: &str, latency_ms: f64) {
    histogram!(
        "blob_agent_dispatch_latency_ms",
        "dispatcher" => dispatcher.to_string()
    )
    .record(latency_ms);
}

/// Record a dispatcher close during shutdown
pub fn record_dispatcher_closed(dispatcher: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "blob_agent_dispatchers_closed_total",
        "dispatcher" => dispatcher.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the number of open client connections
pub fn record_open_connections(count: usize) {
    gauge!("blob_agent_open_connections").set(count as f64);
}

/// In-memory ingestion summary
#[derive(Debug, Clone, Default)]
pub struct IngestMetricsAggregator {
    /// Blobs fanned out
    pub blobs_dispatched: u64,

    /// Blobs rejected before fan-out
    pub blobs_rejected: u64,

    /// Blobs where at least one dispatcher failed
    pub blobs_with_failures: u64,

    /// Accepted blob sizes (bytes)
    pub size_stats: RunningStats,

    /// Whole fan-out latency (ms)
    pub fan_out_stats: RunningStats,
}

impl IngestMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one fanned-out blob
    pub fn record_dispatched(&mut self, size: usize, fan_out_ms: f64, had_failures: bool) {
        self.blobs_dispatched += 1;
        if had_failures {
            self.blobs_with_failures += 1;
        }
        self.size_stats.push(size as f64);
        self.fan_out_stats.push(fan_out_ms);
    }

    /// Account for one rejected blob
    pub fn record_rejected(&mut self) {
        self.blobs_rejected += 1;
    }

    /// Build a summary report
    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            blobs_dispatched: self.blobs_dispatched,
            blobs_rejected: self.blobs_rejected,
            blobs_with_failures: self.blobs_with_failures,
            failure_rate: if self.blobs_dispatched > 0 {
                self.blobs_with_failures as f64 / self.blobs_dispatched as f64 * 100.0
            } else {
                0.0
            },
            blob_size_bytes: StatsSummary::from(&self.size_stats),
            fan_out_ms: StatsSummary::from(&self.fan_out_stats),
        }
    }
}

/// Ingestion summary
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub blobs_dispatched: u64,
    pub blobs_rejected: u64,
    pub blobs_with_failures: u64,
    pub failure_rate: f64,
    pub blob_size_bytes: StatsSummary,
    pub fan_out_ms: StatsSummary,
}

impl std::fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion Summary ===")?;
        writeln!(f, "Blobs dispatched: {}", self.blobs_dispatched)?;
        writeln!(f, "Blobs rejected: {}", self.blobs_rejected)?;
        writeln!(
            f,
            "Blobs with dispatcher failures: {} ({:.2}%)",
            self.blobs_with_failures, self.failure_rate
        )?;
        writeln!(f, "Blob size (bytes): {}", self.blob_size_bytes)?;
        writeln!(f, "Fan-out latency (ms): {}", self.fan_out_ms)
    }
}

/// Summary statistics
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
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
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

    /// Sample variance
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
