//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{BlobAgentConfig, BLOB_AGENT_NAME};
use dispatcher::{DispatcherRegistry, FileDispatcher, LogDispatcher, NetworkDispatcher};
use ingestion::DEFAULT_MAX_FRAME_SIZE;

use crate::cli::InfoArgs;

/// Agent info for JSON output
#[derive(Serialize)]
struct AgentInfo {
    agent: String,
    dispatchers: Vec<DispatcherInfo>,
    transport: TransportInfo,
}

#[derive(Serialize)]
struct DispatcherInfo {
    name: String,
    options: Vec<OptionInfo>,
}

#[derive(Serialize)]
struct OptionInfo {
    key: &'static str,
    required: bool,
    description: &'static str,
}

#[derive(Serialize)]
struct TransportInfo {
    default_host: String,
    default_max_frame_size: usize,
    max_blob_size_in_kb_ceiling: u32,
    default_dispatch_timeout_ms: u64,
    default_shutdown_grace_period_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!("Collecting agent info");

    let info = build_agent_info();

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize agent info")?;
        println!("{}", json);
    } else {
        print_agent_info(&info);
    }

    Ok(())
}

fn build_agent_info() -> AgentInfo {
    let registry = DispatcherRegistry::builtin();
    let dispatchers = registry
        .names()
        .into_iter()
        .map(|name| DispatcherInfo {
            name: name.to_string(),
            options: options_for(name),
        })
        .collect();

    // Defaults of every optional field
    let defaults = BlobAgentConfig::new(0, 1);

    AgentInfo {
        agent: BLOB_AGENT_NAME.to_string(),
        dispatchers,
        transport: TransportInfo {
            default_host: defaults.host,
            default_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_blob_size_in_kb_ceiling: config_loader::MAX_BLOB_SIZE_IN_KB,
            default_dispatch_timeout_ms: defaults.dispatch_timeout_ms,
            default_shutdown_grace_period_ms: defaults.shutdown_grace_period_ms,
        },
    }
}

fn option(key: &'static str, required: bool, description: &'static str) -> OptionInfo {
    OptionInfo {
        key,
        required,
        description,
    }
}

fn options_for(name: &str) -> Vec<OptionInfo> {
    match name {
        LogDispatcher::NAME => vec![option("level", false, "info | debug (default info)")],
        FileDispatcher::NAME => vec![
            option("base_path", true, "output directory"),
            option("create_dirs", false, "create base_path if missing (default true)"),
        ],
        NetworkDispatcher::NAME => vec![
            option("addr", true, "UDP target host:port"),
            option("max_packet_size", false, "largest forwarded blob (default 65000)"),
        ],
        _ => Vec::new(),
    }
}

fn print_agent_info(info: &AgentInfo) {
    println!("\n=== Blob Agent ===\n");
    println!("Config section: [agents.{}]", info.agent);

    println!("\nBuilt-in dispatchers ({}):", info.dispatchers.len());
    for dispatcher in &info.dispatchers {
        println!("  - {}", dispatcher.name);
        for option in &dispatcher.options {
            let marker = if option.required { " (required)" } else { "" };
            println!("      {}{}: {}", option.key, marker, option.description);
        }
    }

    let t = &info.transport;
    println!("\nTransport defaults:");
    println!("  Host: {}", t.default_host);
    println!("  Max frame size: {} bytes", t.default_max_frame_size);
    println!("  Max blob size ceiling: {} KB", t.max_blob_size_in_kb_ceiling);
    println!("  Dispatch timeout: {} ms", t.default_dispatch_timeout_ms);
    println!("  Shutdown grace period: {} ms", t.default_shutdown_grace_period_ms);
    println!();
}
