//! DispatcherHandle - an initialized dispatcher with its own failure domain

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, error, warn};

use contracts::{BlobDispatcher, BlobRecord};

use crate::metrics::DispatcherMetrics;

/// Result of handing one blob to one dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// `accept` returned Ok
    Accepted,
    /// `accept` returned an error
    Failed(String),
    /// `accept` did not finish within the dispatch timeout
    TimedOut(Duration),
}

impl DispatchStatus {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Per-dispatcher outcome for one blob
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Dispatcher name
    pub dispatcher: String,
    pub status: DispatchStatus,
    /// Time spent in `accept`
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Accepted
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            DispatchStatus::Accepted => write!(f, "{}: accepted", self.dispatcher),
            DispatchStatus::Failed(message) => write!(f, "{}: {}", self.dispatcher, message),
            DispatchStatus::TimedOut(limit) => {
                write!(f, "{}: timed out after {}ms", self.dispatcher, limit.as_millis())
            }
        }
    }
}

/// Handle to an initialized dispatcher
pub struct DispatcherHandle {
    /// Dispatcher name (cached from `BlobDispatcher::name`)
    name: String,
    dispatcher: Box<dyn BlobDispatcher>,
    /// Shared metrics
    metrics: Arc<DispatcherMetrics>,
}

impl DispatcherHandle {
    /// Wrap an already-initialized dispatcher
    pub fn new(dispatcher: Box<dyn BlobDispatcher>) -> Self {
        Self {
            name: dispatcher.name().to_string(),
            dispatcher,
            metrics: Arc::new(DispatcherMetrics::new()),
        }
    }

    /// Get dispatcher name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    /// Hand a blob to the dispatcher, bounded by `limit`
    ///
    /// Never fails: errors and timeouts become the returned outcome.
    pub async fn dispatch(&self, blob: &BlobRecord, limit: Duration) -> DispatchOutcome {
        let started = Instant::now();
        let status = match timeout(limit, self.dispatcher.accept(blob)).await {
            Ok(Ok(())) => {
                self.metrics.record_accepted(blob.size());
                debug!(
                    dispatcher = %self.name,
                    sequence = blob.sequence(),
                    size = blob.size(),
                    "Blob accepted"
                );
                DispatchStatus::Accepted
            }
            Ok(Err(e)) => {
                self.metrics.inc_failure_count();
                error!(
                    dispatcher = %self.name,
                    sequence = blob.sequence(),
                    error = %e,
                    "Dispatch failed"
                );
                DispatchStatus::Failed(e.to_string())
            }
            Err(_) => {
                self.metrics.inc_timeout_count();
                warn!(
                    dispatcher = %self.name,
                    sequence = blob.sequence(),
                    timeout_ms = limit.as_millis() as u64,
                    "Dispatch timed out"
                );
                DispatchStatus::TimedOut(limit)
            }
        };

        DispatchOutcome {
            dispatcher: self.name.clone(),
            status,
            elapsed: started.elapsed(),
        }
    }

    /// Close the dispatcher, bounded by `limit`
    ///
    /// Returns the failure message instead of propagating it.
    pub async fn close(&self, limit: Duration) -> Result<(), String> {
        match timeout(limit, self.dispatcher.close()).await {
            Ok(Ok(())) => {
                debug!(dispatcher = %self.name, "Dispatcher closed");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(dispatcher = %self.name, error = %e, "Close failed on shutdown");
                Err(e.to_string())
            }
            Err(_) => {
                error!(
                    dispatcher = %self.name,
                    timeout_ms = limit.as_millis() as u64,
                    "Close timed out on shutdown"
                );
                Err(format!("close timed out after {}ms", limit.as_millis()))
            }
        }
    }
}

impl fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("name", &self.name)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
