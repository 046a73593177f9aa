//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera-node` using
//! `clap` derive. Supports three subcommands: `run`, `stats`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tessera_protocol::config;

/// Tessera onboarding ledger node.
///
/// Hosts the onboarding authority contracts: oracle-node assignment, user
/// lifecycle, and per-oracle fragment custody. Serves the REST API and
/// exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "tessera-node",
    about = "Tessera onboarding ledger node",
    version,
    propagate_version = true
)]
pub struct TesseraNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Tessera node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the onboarding ledger node.
    Run(RunArgs),
    /// Print record counts for an existing data directory and exit.
    Stats(StatsArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where ledger records are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "TESSERA_DATA_DIR", default_value = "~/.tessera")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "TESSERA_API_PORT", default_value_t = config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TESSERA_METRICS_PORT", default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Emit logs as JSON lines instead of pretty-printed text.
    #[arg(long, env = "TESSERA_JSON_LOGS")]
    pub json_logs: bool,
}

/// Arguments for the `stats` subcommand.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Path to the data directory to inspect.
    #[arg(long, short = 'd', env = "TESSERA_DATA_DIR", default_value = "~/.tessera")]
    pub data_dir: PathBuf,
}
