//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use contracts::{BlobAgentConfig, BLOB_AGENT_NAME};
use dispatcher::DispatcherRegistry;
use ingestion::{BlobAgent, TransportLimits};

use crate::cli::RunArgs;
use crate::commands::load_agent_config;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_agent(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut agent_config = load_agent_config(&args.config)?;
    apply_overrides(&mut agent_config, args);
    config_loader::validate_agent(BLOB_AGENT_NAME, &agent_config)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        host = %agent_config.host,
        port = agent_config.port,
        max_blob_size_in_kb = agent_config.max_blob_size_in_kb,
        max_frame_size = TransportLimits::for_blob_limit(agent_config.max_blob_size_in_bytes()).max_frame_size,
        dispatchers = ?agent_config.dispatchers.keys().collect::<Vec<_>>(),
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let agent = BlobAgent::new(agent_config, DispatcherRegistry::builtin())
        .start()
        .await
        .map_err(CliError::from)?;

    info!(addr = %agent.local_addr(), "Serving, press Ctrl+C to stop");
    let report = agent.run_until(shutdown_signal()).await;

    for failure in report.failures() {
        warn!(
            dispatcher = %failure.dispatcher,
            error = failure.error.as_deref().unwrap_or_default(),
            "Dispatcher did not close cleanly"
        );
    }

    info!(
        closed = report.closed.len(),
        clean = report.is_clean(),
        "Blob agent finished"
    );
    Ok(())
}

/// CLI flags (and their `BLOB_AGENT_*` env vars) win over file values
fn apply_overrides(config: &mut BlobAgentConfig, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding host from CLI");
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding port from CLI");
        config.port = port;
    }
    if let Some(kb) = args.max_blob_size_kb {
        info!(max_blob_size_in_kb = kb, "Overriding blob size limit from CLI");
        config.max_blob_size_in_kb = kb;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
