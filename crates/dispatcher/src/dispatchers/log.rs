//! LogDispatcher - logs blob summaries via tracing

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use contracts::{BlobDispatcher, BlobRecord, ContractError, DispatcherConfig};

/// Level used for per-blob summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SummaryLevel {
    #[default]
    Info,
    Debug,
}

/// Dispatcher that logs a summary of every blob, for debugging
#[derive(Debug, Default)]
pub struct LogDispatcher {
    level: SummaryLevel,
    open: AtomicBool,
    blob_count: AtomicU64,
}

impl LogDispatcher {
    pub const NAME: &'static str = "log";

    pub fn new() -> Self {
        Self::default()
    }

    /// Blobs logged so far
    pub fn blob_count(&self) -> u64 {
        self.blob_count.load(Ordering::Relaxed)
    }

    fn log_blob_summary(&self, blob: &BlobRecord) {
        let head: Vec<u8> = blob.payload().iter().take(8).copied().collect();
        match self.level {
            SummaryLevel::Info => info!(
                dispatcher = Self::NAME,
                sequence = blob.sequence(),
                size = blob.size(),
                received_at = %blob.received_at(),
                head = ?head,
                "Blob received"
            ),
            SummaryLevel::Debug => debug!(
                dispatcher = Self::NAME,
                sequence = blob.sequence(),
                size = blob.size(),
                received_at = %blob.received_at(),
                head = ?head,
                "Blob received"
            ),
        }
    }
}

#[async_trait]
impl BlobDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn initialize(&mut self, config: &DispatcherConfig) -> Result<(), ContractError> {
        self.level = match config.get_str("level")? {
            None | Some("info") => SummaryLevel::Info,
            Some("debug") => SummaryLevel::Debug,
            Some(other) => {
                return Err(ContractError::config_validation(
                    format!("dispatchers.{}.level", config.name()),
                    format!("unknown level '{other}', expected 'info' or 'debug'"),
                ))
            }
        };
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    #[instrument(
        name = "log_dispatcher_accept",
        skip(self, blob),
        fields(sequence = blob.sequence())
    )]
    async fn accept(&self, blob: &BlobRecord) -> Result<(), ContractError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(ContractError::not_open(Self::NAME));
        }
        self.log_blob_summary(blob);
        self.blob_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[instrument(name = "log_dispatcher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.open.store(false, Ordering::Release);
        info!(dispatcher = Self::NAME, blobs = self.blob_count(), "LogDispatcher closed");
        Ok(())
    }
}
