//! # CLI Interface
//!
//! Defines the command-line argument structure for `bridgepool-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Bridgepool vault node.
///
/// Hosts one fast-withdraw liquidity vault: serves its operations over
/// JSON-RPC, persists every accepted call, streams its events over
/// WebSocket and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "bridgepool-node",
    about = "Bridgepool fast-withdraw vault node",
    version,
    propagate_version = true
)]
pub struct BridgepoolCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Write a devnet configuration into a data directory.
    Init(InitArgs),
    /// Query the status of a running node via its RPC endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (YAML).
    ///
    /// When omitted, the node looks for `bridgepool.yaml` in the data directory.
    #[arg(long, short = 'c', env = "BRIDGEPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the node data directory holding the configuration and database.
    #[arg(long, short = 'd', env = "BRIDGEPOOL_DATA_DIR", default_value = ".bridgepool")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC and REST API. Overrides the config file.
    #[arg(long, env = "BRIDGEPOOL_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint. Overrides the config file.
    #[arg(long, env = "BRIDGEPOOL_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format: `pretty` or `json`. Overrides the config file.
    #[arg(long, env = "BRIDGEPOOL_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl RunArgs {
    pub fn log_format(&self) -> Option<LogFormat> {
        self.log_format.as_deref().map(LogFormat::from_str_lossy)
    }
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "BRIDGEPOOL_DATA_DIR", default_value = ".bridgepool")]
    pub data_dir: PathBuf,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// RPC endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9841")]
    pub rpc_url: String,
}
