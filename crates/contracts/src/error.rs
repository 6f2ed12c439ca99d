//! Layered error definitions
//!
//! Categorized by source: config / dispatcher / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Dispatcher Errors =====
    /// Dispatcher failed to initialize
    #[error("dispatcher '{dispatcher}' initialization error: {message}")]
    DispatcherInit { dispatcher: String, message: String },

    /// Dispatcher rejected or failed to forward a blob
    #[error("dispatcher '{dispatcher}' dispatch error: {message}")]
    Dispatch { dispatcher: String, message: String },

    /// Dispatcher connection error
    #[error("dispatcher '{dispatcher}' connection error: {message}")]
    DispatcherConnection { dispatcher: String, message: String },

    /// Dispatcher used before `initialize` or after `close`
    #[error("dispatcher '{dispatcher}' is not open")]
    DispatcherNotOpen { dispatcher: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create dispatcher initialization error
    pub fn dispatcher_init(dispatcher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DispatcherInit {
            dispatcher: dispatcher.into(),
            message: message.into(),
        }
    }

    /// Create dispatch error
    pub fn dispatch(dispatcher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            dispatcher: dispatcher.into(),
            message: message.into(),
        }
    }

    /// Create dispatcher not-open error
    pub fn not_open(dispatcher: impl Into<String>) -> Self {
        Self::DispatcherNotOpen {
            dispatcher: dispatcher.into(),
        }
    }
}
