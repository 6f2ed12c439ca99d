//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Blob Agent - receives opaque blobs over TCP and fans them out to dispatchers
#[derive(Parser, Debug)]
#[command(
    name = "blob-agent",
    author,
    version,
    about = "Blob ingestion agent",
    long_about = "Receives opaque binary blobs over a length-prefixed TCP protocol, \n\
                  enforces a size limit and hands every blob to each configured dispatcher."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BLOB_AGENT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BLOB_AGENT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter level when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the agent and serve until Ctrl+C / SIGTERM
    Run(RunArgs),

    /// Validate a configuration file without binding anything
    Validate(ValidateArgs),

    /// Show built-in dispatchers and transport defaults
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "BLOB_AGENT_CONFIG")]
    pub config: PathBuf,

    /// Override the bind host from configuration
    #[arg(long, env = "BLOB_AGENT_HOST")]
    pub host: Option<String>,

    /// Override the listening port from configuration
    #[arg(long, env = "BLOB_AGENT_PORT")]
    pub port: Option<u16>,

    /// Override the blob size limit (KiB) from configuration
    #[arg(long, env = "BLOB_AGENT_MAX_BLOB_SIZE_KB")]
    pub max_blob_size_kb: Option<u32>,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "9000", env = "BLOB_AGENT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "BLOB_AGENT_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
