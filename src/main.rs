//! VICI valve server - main entry point

use vici_valve_rust::{
    config::ServerConfig,
    http_server,
    logging::{init_logging, LogConfig},
    registry::ValveRegistry,
    transport::SerialTransportFactory,
    Result,
};

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Fallback config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "VICI_config.csv";

/// Command line arguments
#[derive(Parser)]
#[command(name = "vici-valve-server")]
#[command(about = "HTTP control server for VICI multiposition valves")]
#[command(version)]
struct Cli {
    /// HTTP port to bind to (overrides VALVE_SERVER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Valve table CSV (name,address per line)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::from_env().verbose()
    } else {
        LogConfig::from_env()
    };
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let mut config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    match &cli.config {
        Some(path) => config.load_valve_table(path),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                config.load_valve_table(&fallback);
            }
        }
    }

    info!("establishing valve connections...");
    let registry =
        ValveRegistry::from_config(&config, Arc::new(SerialTransportFactory)).await;
    info!(
        "{} valve(s) registered: {}",
        registry.len(),
        registry.valve_names().join(", ")
    );

    http_server::serve(Arc::new(registry), config.port).await
}
