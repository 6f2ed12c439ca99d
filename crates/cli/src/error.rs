//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration has no section for the agent
    #[error("Configuration has no [agents.{agent}] section")]
    MissingAgentSection { agent: String },

    /// Agent failed to start; nothing was served
    #[error("Agent failed to start: {0}")]
    Startup(#[from] ingestion::AgentError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn missing_agent_section(agent: impl Into<String>) -> Self {
        Self::MissingAgentSection {
            agent: agent.into(),
        }
    }
}
