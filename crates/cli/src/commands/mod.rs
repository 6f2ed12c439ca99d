//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_agent;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};

use contracts::{BlobAgentConfig, BLOB_AGENT_NAME};

use crate::error::CliError;

/// Load + validate a configuration file and extract the `blobs` section
pub(crate) fn load_agent_config(path: &Path) -> Result<BlobAgentConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let agent = config
        .blobs()
        .cloned()
        .ok_or_else(|| CliError::missing_agent_section(BLOB_AGENT_NAME))?;

    Ok(agent)
}
