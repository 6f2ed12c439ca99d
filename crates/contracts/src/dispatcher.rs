//! BlobDispatcher trait - destination plugin interface
//!
//! Defines the abstract interface for dispatchers.

use async_trait::async_trait;

use crate::{BlobRecord, ContractError, DispatcherConfig};

/// Destination handler for ingested blobs.
///
/// All dispatcher implementations must implement this trait. Instances are
/// shared across request tasks once initialized, so `accept` and `close` take
/// `&self` and implementations use interior mutability for their state.
#[async_trait]
pub trait BlobDispatcher: Send + Sync {
    /// Dispatcher name (matched case-insensitively against configuration keys)
    ///
    /// Must not change for the lifetime of the process.
    fn name(&self) -> &str;

    /// Prepare the dispatcher with its configuration block
    ///
    /// Called exactly once, before any `accept`.
    ///
    /// # Errors
    /// Returns an error if required configuration is missing or invalid, or
    /// the destination cannot be reached.
    async fn initialize(&mut self, config: &DispatcherConfig) -> Result<(), ContractError>;

    /// Hand one blob to the destination
    ///
    /// May be called concurrently from several tasks. The payload must not be
    /// borrowed beyond the call; cloning the `Bytes` handle is allowed.
    ///
    /// The caller may stop waiting on this future when the dispatch timeout
    /// expires. Work handed off elsewhere (blocking pool, spawned tasks) keeps
    /// running, so `close` must wait for it before returning.
    async fn accept(&self, blob: &BlobRecord) -> Result<(), ContractError>;

    /// Release all resources held by the dispatcher
    ///
    /// Called at most once per instance by the lifecycle manager.
    async fn close(&self) -> Result<(), ContractError>;
}
