//! IngestEndpoint - size enforcement and fan-out for one request

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use contracts::BlobRecord;
use dispatcher::{ActiveSet, DispatchReport};
use observability::{
    record_blob_dispatched, record_blob_received, record_blob_rejected,
    record_dispatch_latency_ms, IngestMetricsAggregator, IngestSummary,
};

use crate::error::{IngestError, Result};
use crate::protocol::DispatchResult;

/// Request handler shared by every connection
#[derive(Debug)]
pub struct IngestEndpoint {
    active: Arc<ActiveSet>,
    max_blob_size_in_bytes: usize,
    sequence: AtomicU64,
    aggregator: Mutex<IngestMetricsAggregator>,
}

impl IngestEndpoint {
    pub fn new(active: Arc<ActiveSet>, max_blob_size_in_bytes: usize) -> Self {
        Self {
            active,
            max_blob_size_in_bytes,
            sequence: AtomicU64::new(1),
            aggregator: Mutex::new(IngestMetricsAggregator::new()),
        }
    }

    pub fn max_blob_size_in_bytes(&self) -> usize {
        self.max_blob_size_in_bytes
    }

    pub fn active_set(&self) -> &Arc<ActiveSet> {
        &self.active
    }

    /// Enforce the size limit, then fan the payload out
    ///
    /// # Errors
    /// `BlobTooLarge` when `payload.len()` exceeds the limit. No dispatcher
    /// is invoked in that case.
    #[instrument(name = "ingest_dispatch", skip(self, payload), fields(size = payload.len()))]
    pub async fn dispatch(&self, payload: Bytes) -> Result<DispatchReport> {
        let size = payload.len();
        self.admit(size)?;

        let blob = BlobRecord::new(self.sequence.fetch_add(1, Ordering::Relaxed), payload);
        let started = Instant::now();
        let report = self.active.fan_out(&blob).await;
        let fan_out_ms = started.elapsed().as_secs_f64() * 1000.0;

        for outcome in &report.outcomes {
            record_blob_dispatched(&outcome.dispatcher, outcome.status.label());
            record_dispatch_latency_ms(&outcome.dispatcher, outcome.elapsed.as_secs_f64() * 1000.0);
        }
        self.with_aggregator(|agg| agg.record_dispatched(size, fan_out_ms, !report.is_success()));

        debug!(
            sequence = blob.sequence(),
            failed = ?report.failed_dispatchers(),
            fan_out_ms,
            "Blob dispatched"
        );
        Ok(report)
    }

    /// Count an incoming blob of `size` bytes and check it against the limit
    ///
    /// The server calls this directly for frames too large to buffer, so the
    /// client gets the same `size_limit_exceeded` answer either way.
    pub fn admit(&self, size: usize) -> Result<()> {
        record_blob_received(size);
        if size > self.max_blob_size_in_bytes {
            warn!(size, limit = self.max_blob_size_in_bytes, "Blob over size limit");
            record_blob_rejected("size_limit_exceeded");
            self.with_aggregator(|agg| agg.record_rejected());
            return Err(IngestError::BlobTooLarge {
                size,
                limit: self.max_blob_size_in_bytes,
            });
        }
        Ok(())
    }

    /// `dispatch`, mapped onto the wire result
    pub async fn handle(&self, payload: Bytes) -> DispatchResult {
        match self.dispatch(payload).await {
            Ok(report) => DispatchResult::from_report(&report),
            Err(e @ IngestError::BlobTooLarge { .. }) => DispatchResult::size_limit_exceeded(e.to_string()),
        }
    }

    /// Totals since startup
    pub fn summary(&self) -> IngestSummary {
        self.with_aggregator(|agg| agg.summary())
    }

    fn with_aggregator<T>(&self, f: impl FnOnce(&mut IngestMetricsAggregator) -> T) -> T {
        let mut guard = self
            .aggregator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use contracts::{BlobDispatcher, DispatcherConfig, DispatcherParams};
    use dispatcher::{activate, DispatcherLifecycle, DispatcherRegistry, MockDispatcher, MockProbe};

    use crate::protocol::ResultCode;

    async fn endpoint(
        mocks: Vec<MockDispatcher>,
        limit: usize,
    ) -> (IngestEndpoint, DispatcherLifecycle, Vec<MockProbe>) {
        let probes: Vec<MockProbe> = mocks.iter().map(MockDispatcher::probe).collect();
        let mut registry = DispatcherRegistry::new();
        let mut configs = Vec::new();
        for mock in mocks {
            configs.push(DispatcherConfig::new(mock.name(), DispatcherParams::new()));
            registry.register(Box::new(mock)).unwrap();
        }
        let lifecycle = activate(registry, &configs, Duration::from_millis(200))
            .await
            .unwrap();
        let endpoint = IngestEndpoint::new(lifecycle.active_set(), limit);
        (endpoint, lifecycle, probes)
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let (endpoint, _lifecycle, probes) = endpoint(vec![MockDispatcher::new("a")], 1024).await;

        let report = endpoint.dispatch(Bytes::from(vec![0u8; 1024])).await.unwrap();
        assert!(report.is_success());
        assert_eq!(probes[0].accept_count(), 1);

        let err = endpoint.dispatch(Bytes::from(vec![0u8; 1025])).await.unwrap_err();
        assert!(matches!(err, IngestError::BlobTooLarge { size: 1025, limit: 1024 }));
        assert_eq!(probes[0].accept_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_dispatcher_is_reported() {
        let (endpoint, _lifecycle, probes) = endpoint(
            vec![
                MockDispatcher::new("first"),
                MockDispatcher::new("broken").failing_accept(),
                MockDispatcher::new("last"),
            ],
            64,
        )
        .await;

        let result = endpoint.handle(Bytes::from_static(b"payload")).await;

        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(result.failed_dispatchers, vec!["broken".to_string()]);
        assert!(result.error_message.unwrap().contains("broken"));
        assert_eq!(probes[0].accept_count(), 1);
        assert_eq!(probes[2].accept_count(), 1);
    }

    #[tokio::test]
    async fn test_oversized_maps_to_size_limit_exceeded() {
        let (endpoint, _lifecycle, probes) = endpoint(vec![MockDispatcher::new("a")], 10).await;

        let result = endpoint.handle(Bytes::from(vec![1u8; 11])).await;

        assert_eq!(result.code, ResultCode::SizeLimitExceeded);
        assert_eq!(probes[0].accept_count(), 0);
        let summary = endpoint.summary();
        assert_eq!(summary.blobs_rejected, 1);
        assert_eq!(summary.blobs_dispatched, 0);
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase() {
        let (endpoint, _lifecycle, _) = endpoint(vec![MockDispatcher::new("a")], 10).await;

        endpoint.dispatch(Bytes::from_static(b"1")).await.unwrap();
        endpoint.dispatch(Bytes::from_static(b"2")).await.unwrap();

        assert_eq!(endpoint.sequence.load(Ordering::Relaxed), 3);
        assert_eq!(endpoint.summary().blobs_dispatched, 2);
    }

    #[tokio::test]
    async fn test_admit_rejects_without_payload() {
        let (endpoint, _lifecycle, probes) = endpoint(vec![MockDispatcher::new("a")], 10).await;

        assert!(endpoint.admit(10).is_ok());
        assert!(matches!(
            endpoint.admit(5 * 1024 * 1024),
            Err(IngestError::BlobTooLarge { limit: 10, .. })
        ));
        assert_eq!(probes[0].accept_count(), 0);
        assert_eq!(endpoint.summary().blobs_rejected, 1);
    }
}
