//! Per-dispatcher counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single active dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Blobs accepted
    accepted_count: AtomicU64,
    /// Blobs rejected with an error
    failure_count: AtomicU64,
    /// Calls that exceeded the dispatch timeout
    timeout_count: AtomicU64,
    /// Payload bytes accepted
    accepted_bytes: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted_count.load(Ordering::Relaxed)
    }

    /// Record one accepted blob of `bytes` length
    pub fn record_accepted(&self, bytes: usize) {
        self.accepted_count.fetch_add(1, Ordering::Relaxed);
        self.accepted_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    pub fn inc_timeout_count(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted_bytes(&self) -> u64 {
        self.accepted_bytes.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted_count: self.accepted_count(),
            failure_count: self.failure_count(),
            timeout_count: self.timeout_count(),
            accepted_bytes: self.accepted_bytes(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub accepted_bytes: u64,
}
