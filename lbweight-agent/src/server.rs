//! HTTP surface of the agent
//!
//! - `GET <health path>`: 200 while healthy, 503 otherwise
//! - `GET <hardware path>`: JSON hardware report
//! - `POST /up`, `POST /down`: toggle the health state

use crate::config::{AgentConfig, ConfigError};
use crate::hardware::HardwareSampler;
use crate::state::{HealthState, SharedHealth};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use lbweight_core::HardwareReport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// State shared by the handlers
#[derive(Clone)]
pub struct AgentState {
    pub health: SharedHealth,
    pub sampler: Arc<HardwareSampler>,
}

impl AgentState {
    pub fn new(sample_window: Duration) -> Self {
        Self {
            health: HealthState::shared(),
            sampler: Arc::new(HardwareSampler::new(sample_window)),
        }
    }
}

/// Build the agent's routes, rejecting paths the router cannot serve
pub fn router(config: &AgentConfig, state: AgentState) -> Result<Router, ConfigError> {
    config.validate()?;

    Ok(Router::new()
        .route(&config.health_path, get(health))
        .route(&config.hardware_path, get(hardware))
        .route("/up", post(up))
        .route("/down", post(down))
        .with_state(state))
}

async fn health(State(state): State<AgentState>) -> StatusCode {
    if state.health.read().await.is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn hardware(State(state): State<AgentState>) -> Json<HardwareReport> {
    debug!("Hardware report requested");
    Json(state.sampler.sample().await)
}

async fn up(State(state): State<AgentState>) -> Json<&'static str> {
    match state.health.write().await.mark_up() {
        Some(down_for) => info!(down_for = ?down_for, "Endpoint marked up"),
        None => debug!("Endpoint already up"),
    }
    Json("Ok")
}

async fn down(State(state): State<AgentState>) -> Json<&'static str> {
    match state.health.write().await.mark_down() {
        Some(up_for) => info!(up_for = ?up_for, "Endpoint marked down"),
        None => debug!("Endpoint already down"),
    }
    Json("Ok")
}

/// Serve the agent until the listener fails
pub async fn serve(config: AgentConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let state = AgentState::new(config.sample_window);
    let app = router(&config, state)?;

    info!(
        addr = %addr,
        health_path = %config.health_path,
        hardware_path = %config.hardware_path,
        "Starting status agent"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
