//! Dispatcher error types

use thiserror::Error;

use contracts::ContractError;

/// Errors raised while discovering, selecting or initializing dispatchers
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Two registered dispatchers share a name (ignoring case)
    #[error("dispatcher '{name}' is already registered")]
    DuplicateDispatcher { name: String },

    /// Several configuration keys match the same dispatcher (ignoring case)
    #[error("dispatcher '{dispatcher}' is configured more than once: {keys:?}")]
    AmbiguousConfiguration { dispatcher: String, keys: Vec<String> },

    /// Configuration matched no registered dispatcher
    #[error("no dispatchers configured")]
    NoDispatchersConfigured,

    /// A configured dispatcher failed to initialize
    #[error("failed to initialize dispatcher '{dispatcher}': {source}")]
    Initialization {
        dispatcher: String,
        #[source]
        source: ContractError,
    },
}

impl DispatcherError {
    /// Create an initialization error
    pub fn initialization(dispatcher: impl Into<String>, source: ContractError) -> Self {
        Self::Initialization {
            dispatcher: dispatcher.into(),
            source,
        }
    }
}
