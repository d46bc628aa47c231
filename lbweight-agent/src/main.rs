//! lbweight Status Agent
//!
//! Reports this endpoint's health and hardware load to the rebalancer.

use clap::Parser;
use lbweight_agent::AgentConfig;
use lbweight_core::{DEFAULT_AGENT_PORT, DEFAULT_HARDWARE_PATH, DEFAULT_HEALTH_PATH};
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "lbweight-agent")]
#[command(about = "Sidecar status agent reporting endpoint health and hardware load")]
#[command(version)]
struct Cli {
    /// HTTP listen port
    #[arg(short, long, default_value_t = DEFAULT_AGENT_PORT, env = "LBWEIGHT_AGENT_PORT")]
    port: u16,

    /// Health check path
    #[arg(long, default_value = DEFAULT_HEALTH_PATH)]
    health_path: String,

    /// Hardware report path
    #[arg(long, default_value = DEFAULT_HARDWARE_PATH)]
    hardware_path: String,

    /// CPU sampling window in milliseconds
    #[arg(long, default_value = "1000")]
    sample_window_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .init();

    info!(port = cli.port, "lbweight status agent starting...");

    let config = AgentConfig {
        port: cli.port,
        health_path: cli.health_path,
        hardware_path: cli.hardware_path,
        sample_window: Duration::from_millis(cli.sample_window_ms),
    };

    lbweight_agent::serve(config).await
}
