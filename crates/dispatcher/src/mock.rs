//! MockDispatcher - scriptable dispatcher for tests and dry runs
//!
//! Every call is recorded in a shared `MockProbe`, so a test can keep the
//! probe after the dispatcher itself has been moved into a registry.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;

use contracts::{BlobDispatcher, BlobRecord, ContractError, DispatcherConfig};

/// Calls observed by a mock dispatcher
#[derive(Debug, Default)]
struct MockLog {
    initialized: Vec<DispatcherConfig>,
    accepted: Vec<Bytes>,
    close_calls: usize,
}

/// Shared view of what a `MockDispatcher` has been asked to do
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    log: Arc<Mutex<MockLog>>,
}

impl MockProbe {
    fn lock(&self) -> MutexGuard<'_, MockLog> {
        // A panicking test thread must not hide the recorded calls
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of `initialize` calls
    pub fn init_count(&self) -> usize {
        self.lock().initialized.len()
    }

    /// Configuration passed to the last `initialize` call
    pub fn initialized_config(&self) -> Option<DispatcherConfig> {
        self.lock().initialized.last().cloned()
    }

    /// Payloads accepted so far, in call order
    pub fn accepted(&self) -> Vec<Bytes> {
        self.lock().accepted.clone()
    }

    pub fn accept_count(&self) -> usize {
        self.lock().accepted.len()
    }

    pub fn close_count(&self) -> usize {
        self.lock().close_calls
    }
}

/// Dispatcher with scripted behavior
#[derive(Debug)]
pub struct MockDispatcher {
    name: String,
    probe: MockProbe,
    fail_initialize: bool,
    fail_accept: bool,
    fail_close: bool,
    accept_delay: Option<Duration>,
}

impl MockDispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe: MockProbe::default(),
            fail_initialize: false,
            fail_accept: false,
            fail_close: false,
            accept_delay: None,
        }
    }

    /// Probe sharing this dispatcher's call log
    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_accept(mut self) -> Self {
        self.fail_accept = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Sleep before recording each accepted blob
    pub fn with_accept_delay(mut self, delay: Duration) -> Self {
        self.accept_delay = Some(delay);
        self
    }
}

#[async_trait]
impl BlobDispatcher for MockDispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, config: &DispatcherConfig) -> Result<(), ContractError> {
        self.probe.lock().initialized.push(config.clone());
        if self.fail_initialize {
            return Err(ContractError::dispatcher_init(&self.name, "mock failure"));
        }
        Ok(())
    }

    async fn accept(&self, blob: &BlobRecord) -> Result<(), ContractError> {
        if let Some(delay) = self.accept_delay {
            sleep(delay).await;
        }
        if self.fail_accept {
            return Err(ContractError::dispatch(&self.name, "mock failure"));
        }
        self.probe.lock().accepted.push(blob.payload().clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        self.probe.lock().close_calls += 1;
        if self.fail_close {
            return Err(ContractError::Other(format!("{}: mock close failure", self.name)));
        }
        Ok(())
    }
}
