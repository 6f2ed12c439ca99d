//! # Dispatcher
//!
//! Dispatcher discovery, selection, lifecycle and fan-out.
//!
//! Responsibilities:
//! - Keep the explicit registry of dispatcher implementations
//! - Select the active set from operator configuration (case-insensitive)
//! - Initialize the active set and close it on shutdown, isolating failures
//! - Fan each blob out to every active dispatcher with a per-call timeout
//!
//! ## Usage
//!
//! ```ignore
//! use dispatcher::{activate, DispatcherRegistry};
//!
//! let lifecycle = activate(DispatcherRegistry::builtin(), &configs, timeout).await?;
//! let active = lifecycle.active_set();
//! let report = active.fan_out(&blob).await;
//! // ...
//! let shutdown = lifecycle.close_all().await;
//! ```

pub mod active_set;
pub mod dispatchers;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod metrics;
pub mod mock;
pub mod registry;
pub mod selector;

pub use active_set::{ActiveSet, DispatchReport};
pub use contracts::{BlobDispatcher, BlobRecord};
pub use dispatchers::{FileDispatcher, LogDispatcher, NetworkDispatcher};
pub use error::DispatcherError;
pub use handle::{DispatchOutcome, DispatchStatus, DispatcherHandle};
pub use lifecycle::{activate, CloseOutcome, DispatcherLifecycle, ShutdownReport};
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use mock::{MockDispatcher, MockProbe};
pub use registry::DispatcherRegistry;
pub use selector::{select, Selection};
