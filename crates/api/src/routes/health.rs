//! Liveness and database reachability endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

/// Health check endpoint
///
/// Returns the service status and version information
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>> {
    let timestamp = chrono::Utc::now().timestamp();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        timestamp,
    }))
}

/// Database reachability check
///
/// Runs a trivial query; an unreachable database maps to `db_unavailable`.
#[utoipa::path(
    get,
    path = "/dbping",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = crate::error::ErrorResponse),
    )
)]
pub async fn db_ping(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>> {
    state.db.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    }))
}
