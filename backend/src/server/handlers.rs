//! HTTP request handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::deploy::progress::TracingSink;
use crate::errors::AppError;
use crate::models::deployment::DeploymentRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: String,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: format_uptime(state.started_at.elapsed()),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Deploy response
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub success: bool,
}

/// Blocking deploy handler: answers once the whole pipeline has finished
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<DeploymentRequest>, JsonRejection>,
) -> Result<Json<DeployResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;

    // Nobody is listening for progress; only shutdown cancels the run.
    let cancel = state.deployer.cancel_token();
    state
        .deployer
        .deploy(&request, &TracingSink, &cancel)
        .await?;

    Ok(Json(DeployResponse { success: true }))
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
