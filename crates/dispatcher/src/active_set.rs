//! ActiveSet - initialized dispatchers and fan-out

use std::time::Duration;

use tracing::{debug, instrument, warn};

use contracts::BlobRecord;

use crate::handle::{DispatchOutcome, DispatcherHandle};
use crate::metrics::MetricsSnapshot;

/// Aggregated outcomes for one blob, in fan-out order
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    /// True if every dispatcher accepted the blob
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(DispatchOutcome::is_success)
    }

    /// Outcomes that were not accepted
    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Names of dispatchers that failed or timed out
    pub fn failed_dispatchers(&self) -> Vec<String> {
        self.failures().map(|o| o.dispatcher.clone()).collect()
    }
}

/// Ordered, non-empty set of initialized dispatchers
///
/// Read-only once built; shared with request handlers behind an `Arc`.
#[derive(Debug)]
pub struct ActiveSet {
    handles: Vec<DispatcherHandle>,
    dispatch_timeout: Duration,
}

impl ActiveSet {
    pub(crate) fn new(handles: Vec<DispatcherHandle>, dispatch_timeout: Duration) -> Self {
        Self {
            handles,
            dispatch_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Dispatcher names in fan-out order
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(DispatcherHandle::name).collect()
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }

    pub(crate) fn handles(&self) -> &[DispatcherHandle] {
        &self.handles
    }

    /// Get metrics for all dispatchers
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Hand `blob` to every dispatcher in order
    ///
    /// A failure or timeout in one dispatcher is recorded in the report and
    /// the remaining dispatchers are still attempted.
    #[instrument(
        name = "dispatcher_fan_out",
        skip(self, blob),
        fields(sequence = blob.sequence(), size = blob.size())
    )]
    pub async fn fan_out(&self, blob: &BlobRecord) -> DispatchReport {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            outcomes.push(handle.dispatch(blob, self.dispatch_timeout).await);
        }

        let report = DispatchReport { outcomes };
        if report.is_success() {
            debug!(dispatchers = self.handles.len(), "Blob fanned out");
        } else {
            warn!(
                failed = ?report.failed_dispatchers(),
                "Blob fanned out with failures"
            );
        }
        report
    }
}
