// Copyright (c) 2026 Tessera Labs. MIT License.
// See LICENSE for details.

//! # Tessera Onboarding Node
//!
//! Entry point for the `tessera-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the onboarding ledger, and
//! serves the REST API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the onboarding ledger node
//! - `stats`   — print record counts for a data directory
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use tessera_protocol::{config, Ledger};

use cli::{Commands, TesseraNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// How often the pending-users gauge is refreshed from ledger state.
const GAUGE_REFRESH_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TesseraNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Stats(args) => print_stats(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full onboarding node: ledger, API server, and metrics
/// endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(
        "tessera_node=info,tessera_protocol=info,tower_http=debug",
        format,
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting tessera-node"
    );

    // --- Ledger ---
    let ledger = Arc::new(open_ledger(&args.data_dir)?);

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .pending_users
        .set(ledger.pending_user_count() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            config::PROTOCOL_VERSION,
        ),
        ledger: Arc::clone(&ledger),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Gauge refresh ---
    // The pending-users gauge is also updated inline by the API handlers;
    // this loop keeps it honest across restarts and out-of-band changes.
    let ledger_ref = Arc::clone(&ledger);
    let metrics_ref = Arc::clone(&node_metrics);
    let gauge_loop = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(GAUGE_REFRESH_SECS));
        loop {
            interval.tick().await;
            metrics_ref
                .pending_users
                .set(ledger_ref.pending_user_count() as i64);
        }
    });

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

    gauge_loop.abort();
    tracing::info!("tessera-node stopped");
    Ok(())
}

/// Prints record counts for an existing data directory.
fn print_stats(args: cli::StatsArgs) -> Result<()> {
    let ledger = open_ledger(&args.data_dir)?;

    println!("Ledger statistics");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Users          : {}", ledger.user_count());
    println!("  Pending users  : {}", ledger.pending_user_count());
    println!("  Ork records    : {}", ledger.ork_count());
    println!("  Fragments      : {}", ledger.fragment_count());

    Ok(())
}

/// Opens the ledger under `<data_dir>/db`, creating directories on first
/// use.
fn open_ledger(data_dir: &Path) -> Result<Ledger> {
    let data_dir = expand_home(data_dir);
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let ledger = Ledger::open(&db_path)
        .with_context(|| format!("failed to open ledger at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "ledger opened");
    Ok(ledger)
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

/// Prints version information to stdout.
fn print_version() {
    println!("tessera-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
