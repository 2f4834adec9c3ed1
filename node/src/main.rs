// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bridgepool Node
//!
//! Entry point for the `bridgepool-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the vault from disk and serves
//! the HTTP/WS API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     : start the node
//! - `init`    : write a devnet configuration
//! - `status`  : query a running node's status endpoint
//! - `version` : print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use bridgepool_vault::config::{EVENT_CHANNEL_CAPACITY, PROTOCOL_VERSION};

use cli::{BridgepoolCli, Commands};
use config::{NodeConfig, CONFIG_FILE_NAME};
use metrics::VaultMetrics;
use store::VaultStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BridgepoolCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: restores or creates the vault, then serves the API and
/// the metrics endpoint until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE_NAME));
    let mut config = NodeConfig::load_from_file(&config_path)?;
    if let Some(port) = args.rpc_port {
        config.server.rpc_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.server.metrics_port = port;
    }
    let log_format = args.log_format().unwrap_or(config.log_format);

    logging::init_logging(logging::DEFAULT_FILTER, log_format)?;

    tracing::info!(
        config = %config_path.display(),
        data_dir = %args.data_dir.display(),
        rpc_port = config.server.rpc_port,
        metrics_port = config.server.metrics_port,
        "starting bridgepool-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = VaultStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Vault ---
    let vault = api::load_or_genesis(&config, &store)?;

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        vault,
        store.clone(),
        Arc::clone(&vault_metrics),
        EVENT_CHANNEL_CAPACITY,
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = SocketAddr::new(config.server.address, config.server.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = SocketAddr::new(config.server.address, config.server.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    // Every commit is flushed; this only settles sled's background state.
    if let Err(e) = store.flush() {
        tracing::warn!("final flush failed: {}", e);
    }
    tracing::info!("bridgepool-node stopped");
    Ok(())
}

/// Writes a devnet configuration into the data directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("bridgepool_node=info", logging::LogFormat::Pretty)?;

    let data_dir = &args.data_dir;
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config = NodeConfig::devnet()?;
    config.save_to_file(&config_path)?;
    tracing::info!(config = %config_path.display(), "devnet configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Vault          : {}", config.vault.address);
    println!("  Asset          : {}", config.vault.asset);
    println!("  Admin          : {}", config.admin);

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let endpoint = Endpoint::parse(&args.rpc_url)?;
    let body = http_get(&endpoint, "/status").await?;
    println!("{}", body);
    Ok(())
}

/// Host and port of a plain `http://` endpoint.
#[derive(Debug, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix("http://").unwrap_or(url);
        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.is_empty() {
            anyhow::bail!("missing host in URL: {url}");
        }
        match authority.rsplit_once(':') {
            Some((host, port)) => Ok(Self {
                host: host.to_string(),
                port: port
                    .parse()
                    .with_context(|| format!("bad port in URL: {url}"))?,
            }),
            None => Ok(Self {
                host: authority.to_string(),
                port: 80,
            }),
        }
    }
}

/// HTTP/1.1 GET over a raw tokio stream. Returns the response body.
async fn http_get(endpoint: &Endpoint, path: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let addr = format!("{}:{}", endpoint.host, endpoint.port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, endpoint.host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());
    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("bridgepool-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol        {}", PROTOCOL_VERSION);
    println!(
        "snapshot        v{}",
        bridgepool_vault::config::SNAPSHOT_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that signal is never awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
