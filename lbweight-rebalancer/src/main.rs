//! lbweight Rebalancer
//!
//! Runs rebalancing passes over every EDS cluster of an Envoy configuration:
//! - Probes each endpoint's sidecar agent for health and CPU load
//! - Recomputes `load_balancing_weight` from the cluster's average load
//! - Rewrites the EDS documents in place

use anyhow::Context;
use clap::Parser;
use lbweight_rebalancer::config::DEFAULT_CONFIG_PATH;
use lbweight_rebalancer::{ClusterRebalancer, Driver, HttpProber, Settings};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "lbweight-rebalancer")]
#[command(about = "Adaptive endpoint weight rebalancer for Envoy EDS clusters")]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Envoy cluster document (overrides settings)
    #[arg(short, long)]
    envoy_config: Option<PathBuf>,

    /// Compute and log weights without writing any document
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Repeat the pass every N seconds until interrupted
    #[arg(long)]
    interval: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .init();

    let settings = Settings::load(&cli.config, cli.envoy_config.clone())
        .with_context(|| format!("Failed to load settings from {:?}", cli.config))?;

    info!(
        envoy_config = %settings.envoy_config.display(),
        agent_port = settings.port,
        health_path = %settings.path_health,
        hardware_path = %settings.path_hardware,
        dry_run = cli.dry_run,
        "Starting lbweight rebalancer"
    );

    let prober = HttpProber::new(&settings)?;
    let driver = Driver::new(ClusterRebalancer::new(prober).with_dry_run(cli.dry_run));

    let Some(interval) = cli.interval else {
        driver.run_pass(&settings.envoy_config).await?;
        return Ok(());
    };

    let mut timer = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = timer.tick() => {
                if let Err(e) = driver.run_pass(&settings.envoy_config).await {
                    error!(error = %e, "Rebalancing pass failed");
                    return Err(e.into());
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Rebalancer stopped");
    Ok(())
}
