//! DispatcherLifecycle - initialization and shutdown of the active set

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use contracts::DispatcherConfig;

use crate::active_set::ActiveSet;
use crate::error::DispatcherError;
use crate::handle::DispatcherHandle;
use crate::registry::DispatcherRegistry;
use crate::selector::{select, Selection};

/// Result of closing one dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub dispatcher: String,
    /// Failure message, if `close` failed or timed out
    pub error: Option<String>,
}

/// Per-dispatcher close results, in active-set order
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub closed: Vec<CloseOutcome>,
}

impl ShutdownReport {
    /// True if every dispatcher closed cleanly
    pub fn is_clean(&self) -> bool {
        self.closed.iter().all(|c| c.error.is_none())
    }

    /// Dispatchers whose close failed
    pub fn failures(&self) -> impl Iterator<Item = &CloseOutcome> {
        self.closed.iter().filter(|c| c.error.is_some())
    }
}

/// Owner of the active set
///
/// Request handlers only ever see the `Arc<ActiveSet>` returned by
/// [`DispatcherLifecycle::active_set`]; closing consumes the lifecycle, so it
/// can happen exactly once.
#[derive(Debug)]
pub struct DispatcherLifecycle {
    active: Arc<ActiveSet>,
}

impl DispatcherLifecycle {
    /// Initialize every selected dispatcher, in order
    ///
    /// Any failure aborts startup. Dispatchers initialized before the failing
    /// one are closed before the error is returned.
    #[instrument(
        name = "dispatcher_initialize_all",
        skip(selection),
        fields(dispatchers = ?selection.active_names())
    )]
    pub async fn initialize_all(
        selection: Selection,
        dispatch_timeout: Duration,
    ) -> Result<Self, DispatcherError> {
        let matches = selection.into_matches();
        let mut handles: Vec<DispatcherHandle> = Vec::with_capacity(matches.len());

        for (mut dispatcher, config) in matches {
            if let Err(e) = dispatcher.initialize(&config).await {
                let name = dispatcher.name().to_string();
                error!(dispatcher = %name, error = %e, "Dispatcher initialization failed");
                Self::close_handles(&handles, dispatch_timeout).await;
                return Err(DispatcherError::initialization(name, e));
            }
            info!(dispatcher = %dispatcher.name(), "Dispatcher initialized");
            handles.push(DispatcherHandle::new(dispatcher));
        }

        if handles.is_empty() {
            return Err(DispatcherError::NoDispatchersConfigured);
        }

        Ok(Self {
            active: Arc::new(ActiveSet::new(handles, dispatch_timeout)),
        })
    }

    /// Shared read-only handle for request handlers
    pub fn active_set(&self) -> Arc<ActiveSet> {
        Arc::clone(&self.active)
    }

    /// Close every dispatcher, isolating failures
    ///
    /// Each dispatcher gets exactly one `close` call, bounded by the dispatch
    /// timeout; a failure is logged and recorded, never propagated.
    #[instrument(name = "dispatcher_close_all", skip(self))]
    pub async fn close_all(self) -> ShutdownReport {
        let report = Self::close_handles(self.active.handles(), self.active.dispatch_timeout()).await;
        for (name, snapshot) in self.active.metrics() {
            info!(
                dispatcher = %name,
                accepted = snapshot.accepted_count,
                failed = snapshot.failure_count,
                timed_out = snapshot.timeout_count,
                bytes = snapshot.accepted_bytes,
                "Dispatcher totals"
            );
        }
        info!(clean = report.is_clean(), "Dispatchers closed");
        report
    }

    async fn close_handles(handles: &[DispatcherHandle], limit: Duration) -> ShutdownReport {
        let mut closed = Vec::with_capacity(handles.len());
        for handle in handles {
            let error = handle.close(limit).await.err();
            closed.push(CloseOutcome {
                dispatcher: handle.name().to_string(),
                error,
            });
        }
        ShutdownReport { closed }
    }
}

/// Select and initialize dispatchers in one step
///
/// # Errors
/// See [`select`] and [`DispatcherLifecycle::initialize_all`].
pub async fn activate(
    registry: DispatcherRegistry,
    configs: &[DispatcherConfig],
    dispatch_timeout: Duration,
) -> Result<DispatcherLifecycle, DispatcherError> {
    let selection = select(registry, configs)?;
    DispatcherLifecycle::initialize_all(selection, dispatch_timeout).await
}
