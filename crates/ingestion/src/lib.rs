//! # Ingestion
//!
//! Network side of the blob agent.
//!
//! Responsibilities:
//! - Frame codec for the length-prefixed TCP protocol
//! - Per-request size enforcement and fan-out (`IngestEndpoint`)
//! - Accept loop with graceful drain (`IngestServer`)
//! - Agent supervisor: startup order and shutdown (`BlobAgent`)
//!
//! ## Usage
//!
//! ```ignore
//! use dispatcher::DispatcherRegistry;
//! use ingestion::BlobAgent;
//!
//! let agent = BlobAgent::new(config, DispatcherRegistry::builtin())
//!     .start()
//!     .await?;
//! let report = agent.run_until(shutdown_signal()).await;
//! ```

mod agent;
mod client;
pub mod codec;
mod endpoint;
mod error;
mod protocol;
mod server;

// Re-exports
pub use agent::{BlobAgent, RunningAgent};
pub use client::BlobClient;
pub use codec::{TransportLimits, DEFAULT_MAX_FRAME_SIZE};
pub use endpoint::IngestEndpoint;
pub use error::{AgentError, CodecError, IngestError, Result};
pub use protocol::{DispatchResult, ResultCode};
pub use server::{DrainReport, IngestServer};
