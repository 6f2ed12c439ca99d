//! Configuration validation
//!
//! Rules:
//! - max_blob_size_in_kb > 0 and the byte limit fits a frame length (u32)
//! - port != 0
//! - dispatch_timeout_ms > 0
//! - dispatcher keys are non-empty and unique ignoring case

use std::collections::HashSet;

use contracts::{AgentsConfig, BlobAgentConfig, ContractError};

/// Largest KiB value whose byte count still fits in a u32 frame length
pub const MAX_BLOB_SIZE_IN_KB: u32 = u32::MAX / 1024;

/// Validate every agent section
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &AgentsConfig) -> Result<(), ContractError> {
    for (name, agent) in &config.agents {
        validate_agent(name, agent)?;
    }
    Ok(())
}

/// Validate one agent section
pub fn validate_agent(name: &str, agent: &BlobAgentConfig) -> Result<(), ContractError> {
    validate_blob_size(name, agent)?;
    validate_port(name, agent)?;
    validate_timeouts(name, agent)?;
    validate_dispatcher_keys(name, agent)?;
    Ok(())
}

fn validate_blob_size(name: &str, agent: &BlobAgentConfig) -> Result<(), ContractError> {
    if agent.max_blob_size_in_kb == 0 {
        return Err(ContractError::config_validation(
            format!("agents.{name}.max_blob_size_in_kb"),
            "max blob size must be > 0",
        ));
    }
    if agent.max_blob_size_in_kb > MAX_BLOB_SIZE_IN_KB {
        return Err(ContractError::config_validation(
            format!("agents.{name}.max_blob_size_in_kb"),
            format!(
                "max blob size {} KB exceeds the transport ceiling of {} KB",
                agent.max_blob_size_in_kb, MAX_BLOB_SIZE_IN_KB
            ),
        ));
    }
    Ok(())
}

fn validate_port(name: &str, agent: &BlobAgentConfig) -> Result<(), ContractError> {
    if agent.port == 0 {
        return Err(ContractError::config_validation(
            format!("agents.{name}.port"),
            "port must be > 0",
        ));
    }
    Ok(())
}

fn validate_timeouts(name: &str, agent: &BlobAgentConfig) -> Result<(), ContractError> {
    if agent.dispatch_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            format!("agents.{name}.dispatch_timeout_ms"),
            "dispatch timeout must be > 0",
        ));
    }
    Ok(())
}

/// Dispatcher keys are matched case-insensitively, so `file` and `FILE` collide
fn validate_dispatcher_keys(name: &str, agent: &BlobAgentConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for key in agent.dispatchers.keys() {
        if key.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("agents.{name}.dispatchers"),
                "dispatcher name cannot be empty",
            ));
        }
        if !seen.insert(key.to_lowercase()) {
            return Err(ContractError::config_validation(
                format!("agents.{name}.dispatchers.{key}"),
                "duplicate dispatcher name (names are case-insensitive)",
            ));
        }
    }
    Ok(())
}
