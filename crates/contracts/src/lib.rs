//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the blob agent.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Contents
//! - `BlobRecord`: one ingested payload
//! - `BlobDispatcher`: the plugin contract every destination implements
//! - `DispatcherConfig`: opaque per-dispatcher configuration block
//! - `AgentsConfig` / `BlobAgentConfig`: operator configuration surface

mod agent_config;
mod blob;
mod dispatcher;
mod dispatcher_config;
mod error;

pub use agent_config::*;
pub use blob::BlobRecord;
pub use dispatcher::BlobDispatcher;
pub use dispatcher_config::{DispatcherConfig, DispatcherParams};
pub use error::*;
