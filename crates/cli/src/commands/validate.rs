//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::BlobAgentConfig;
use dispatcher::{select, DispatcherRegistry};

use crate::cli::ValidateArgs;
use crate::commands::load_agent_config;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    bind_addr: String,
    max_blob_size_in_kb: u32,
    dispatch_timeout_ms: u64,
    shutdown_grace_period_ms: u64,
    /// Built-in dispatchers that would be activated, in fan-out order
    active_dispatchers: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    let agent = match load_agent_config(&args.config) {
        Ok(agent) => agent,
        Err(e) => return invalid(config_path, format!("{e:#}")),
    };

    // Preview selection against the built-ins without initializing anything
    let selection = match select(DispatcherRegistry::builtin(), &agent.dispatcher_configs()) {
        Ok(selection) => selection,
        Err(e) => return invalid(config_path, e.to_string()),
    };

    let mut warnings = collect_warnings(&agent);
    for key in selection.unknown_keys() {
        warnings.push(format!(
            "Dispatcher '{}' is not a built-in and will be ignored",
            key
        ));
    }

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            bind_addr: agent.bind_addr(),
            max_blob_size_in_kb: agent.max_blob_size_in_kb,
            dispatch_timeout_ms: agent.dispatch_timeout_ms,
            shutdown_grace_period_ms: agent.shutdown_grace_period_ms,
            active_dispatchers: selection
                .active_names()
                .into_iter()
                .map(String::from)
                .collect(),
        }),
    }
}

fn invalid(config_path: String, error: String) -> ValidationResult {
    ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(agent: &BlobAgentConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !agent.enabled {
        warnings.push("Agent is disabled - `run` will refuse to start".to_string());
    }

    if agent.dispatch_timeout_ms > agent.shutdown_grace_period_ms {
        warnings.push(
            "dispatch_timeout_ms exceeds shutdown_grace_period_ms - slow requests may be aborted on shutdown"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Bind: {}", summary.bind_addr);
            println!("  Max blob size: {} KB", summary.max_blob_size_in_kb);
            println!("  Dispatch timeout: {} ms", summary.dispatch_timeout_ms);
            println!("  Shutdown grace: {} ms", summary.shutdown_grace_period_ms);
            println!("  Dispatchers: {}", summary.active_dispatchers.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(file: &NamedTempFile) -> ValidateArgs {
        ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        }
    }

    #[test]
    fn test_valid_config_previews_active_set() {
        let file = config_file(
            r#"
[agents.blobs]
port = 35001
maxBlobSizeInKB = 1

[agents.blobs.dispatchers.FILE]
base_path = "/tmp/blobs"

[agents.blobs.dispatchers.remote]
url = "http://example"
"#,
        );

        let result = validate_config(&args(&file));

        assert!(result.valid, "error: {:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.active_dispatchers, vec!["file".to_string()]);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("remote")));
    }

    #[test]
    fn test_no_matching_dispatcher_is_invalid() {
        let file = config_file(
            r#"
[agents.blobs]
port = 35001
max_blob_size_in_kb = 1
"#,
        );

        let result = validate_config(&args(&file));

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("no dispatchers configured"));
    }

    #[test]
    fn test_missing_section_is_invalid() {
        let file = config_file("[agents]\n");
        let result = validate_config(&args(&file));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("agents.blobs"));
    }
}
