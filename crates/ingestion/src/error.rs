//! Ingestion error types

use std::io;

use thiserror::Error;

use contracts::ContractError;
use dispatcher::DispatcherError;

/// Request-level errors raised by the endpoint
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload is over the configured blob limit
    #[error("blob of {size} bytes exceeds the {limit} byte limit")]
    BlobTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },
}

/// Wire-level errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Announced payload is larger than the transport allows
    #[error("frame payload of {len} bytes exceeds the {max} byte transport limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    #[error("unexpected frame type 0x{0:02x}")]
    UnexpectedFrame(u8),

    #[error("malformed result payload: {0}")]
    InvalidResult(#[from] serde_json::Error),

    /// Peer closed the connection before replying
    #[error("connection closed by peer")]
    ConnectionClosed,
}

/// Startup errors of the agent supervisor
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent section has `enabled = false`
    #[error("agent '{0}' is disabled")]
    Disabled(String),

    /// No section for the agent in the configuration
    #[error("no configuration section for agent '{0}'")]
    MissingSection(String),

    #[error(transparent)]
    Config(#[from] ContractError),

    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestError>;
